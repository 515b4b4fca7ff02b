//! Persistent result store with per-name size budgets
//!
//! Stores serialized results as files on disk, with entry metadata in a
//! SQLite table. Each logical name can be given a byte budget; when a new
//! result would push a name over it, that name's entries are evicted in
//! least-recently-used or least-frequently-used order.

mod codec;
mod config;
mod error;
mod records;
mod store;
mod types;

pub use codec::{BytesCodec, Codec, CodecError, JsonCodec};
pub use config::{Mode, Settings};
pub use error::{Result, StoreError};
pub use store::EntryStore;
pub use types::{CacheEntry, EvictionPolicy, NameStats};
