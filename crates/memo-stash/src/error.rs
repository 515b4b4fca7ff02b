//! Error types for memoized calls

use memo_key::KeyError;
use memo_store::StoreError;
use std::convert::Infallible;
use std::fmt;

/// Why a memoized call produced no value.
///
/// `Compute` carries the wrapped function's own error untouched.
#[derive(Debug)]
pub enum MemoError<E = Infallible> {
    Key(KeyError),
    Store(StoreError),
    Compute(E),
}

impl<E: fmt::Display> fmt::Display for MemoError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoError::Key(err) => write!(f, "Key error: {}", err),
            MemoError::Store(err) => write!(f, "Store error: {}", err),
            MemoError::Compute(err) => write!(f, "{}", err),
        }
    }
}

impl<E> std::error::Error for MemoError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MemoError::Key(err) => Some(err),
            MemoError::Store(err) => Some(err),
            MemoError::Compute(err) => err.source(),
        }
    }
}

impl<E> From<KeyError> for MemoError<E> {
    fn from(err: KeyError) -> Self {
        MemoError::Key(err)
    }
}

impl<E> From<StoreError> for MemoError<E> {
    fn from(err: StoreError) -> Self {
        MemoError::Store(err)
    }
}

impl<E> MemoError<E> {
    /// The wrapped function's error, if that is what this is
    pub fn into_compute(self) -> Option<E> {
        match self {
            MemoError::Compute(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = Infallible> = std::result::Result<T, MemoError<E>>;
