//! Error types for the memo CLI

use memo_key::InvalidKey;
use memo_store::StoreError;
use std::fmt;

#[derive(Debug)]
pub enum CliError {
    Store(StoreError),
    InvalidKey(InvalidKey),
    NotFound(String),
    Config(String),
    Output(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Store(err) => write!(f, "Store error: {}", err),
            CliError::InvalidKey(err) => write!(f, "{}", err),
            CliError::NotFound(hash) => write!(f, "No entry with hash {}", hash),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Output(msg) => write!(f, "Output error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Store(err) => Some(err),
            CliError::InvalidKey(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        CliError::Store(err)
    }
}

impl From<InvalidKey> for CliError {
    fn from(err: InvalidKey) -> Self {
        CliError::InvalidKey(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for CliError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Output(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = CliError::NotFound("ab".repeat(32));
        assert_eq!(format!("{}", err), format!("No entry with hash {}", "ab".repeat(32)));
    }

    #[test]
    fn test_invalid_key_converts() {
        let err: CliError = "xyz".parse::<memo_key::CacheKey>().unwrap_err().into();
        assert!(matches!(err, CliError::InvalidKey(_)));
    }
}
