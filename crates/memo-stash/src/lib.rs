//! Transparent memoization backed by a persistent store
//!
//! A [`Memo`] wraps one function. Each call derives a key from the bound
//! arguments and the function's code, returns the stored result when one
//! exists, and otherwise runs the computation and stores what it returns.
//!
//! ```no_run
//! use memo_stash::{Args, Code, EntryStore, FunctionDef, Memo, Param, Settings, Signature};
//!
//! let store = EntryStore::open(&Settings::from_env())?;
//! let square: Memo<i64> = Memo::builder(FunctionDef::new(
//!     "square",
//!     Signature::new(vec![Param::new("x")]),
//!     Code::new(vec![0x7c, 0x00, 0x14, 0x00]),
//! ))
//! .build(&store);
//!
//! assert_eq!(square.call(&Args::new().arg(4i64), || 16)?, 16);
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

mod error;
mod memo;

pub use error::{MemoError, Result};
pub use memo::{Memo, MemoBuilder, Recall};

pub use memo_key::{
    Arg, ArgValue, Args, Bytes, CacheKey, Code, FunctionDef, Hasher, HasherRegistry, Json,
    KeyConfig, KeyError, Param, Signature, WatchedGlobal,
};
pub use memo_store::{
    BytesCodec, CacheEntry, Codec, EntryStore, EvictionPolicy, JsonCodec, Mode, Settings,
    StoreError,
};
