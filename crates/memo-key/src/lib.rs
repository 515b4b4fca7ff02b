//! Cache key derivation for memoized function calls
//!
//! Turns a call (function identity, compiled body, watched functions and
//! globals, argument values) into a stable [`CacheKey`]. Arguments are bound
//! against the declared [`Signature`] first, so `f(1, b=2)` and
//! `f(a=1, b=2)` produce the same key; each bound value is then hashed by the
//! [`HasherRegistry`] entry for its type tag.

mod code;
mod deriver;
mod error;
mod hasher;
mod key;
mod signature;
mod value;

pub use code::{Code, FunctionDef};
pub use deriver::{KeyConfig, KeyDeriver, WatchedGlobal};
pub use error::{BindError, KeyError, Result, UnhashableInputError};
pub use hasher::{Hasher, HasherRegistry, PathHasher, ReprHasher};
pub use key::{CacheKey, InvalidKey, KEY_LEN};
pub use signature::{Binding, Param, ParamKind, Signature};
pub use value::{Arg, ArgValue, Args, AsAny, Bytes, Json};
