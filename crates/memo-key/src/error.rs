//! Error types for cache key derivation

use std::fmt;

/// A call whose arguments cannot be bound against the declared signature.
///
/// These mirror the errors the wrapped function itself would raise for the
/// same call, so callers can tell a bad call apart from an unhashable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    TooManyPositional { expected: usize, given: usize },
    UnexpectedKeyword(String),
    PositionalOnlyAsKeyword(String),
    MultipleValues(String),
    MissingArgument(String),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyPositional { expected, given } => write!(
                f,
                "takes {expected} positional arguments but {given} were given"
            ),
            Self::UnexpectedKeyword(name) => {
                write!(f, "got an unexpected keyword argument '{name}'")
            }
            Self::PositionalOnlyAsKeyword(name) => write!(
                f,
                "positional-only argument '{name}' passed as keyword argument"
            ),
            Self::MultipleValues(name) => write!(f, "got multiple values for argument '{name}'"),
            Self::MissingArgument(name) => write!(f, "missing required argument '{name}'"),
        }
    }
}

impl std::error::Error for BindError {}

/// A value, or its registered hasher, that could not produce hash bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnhashableInputError {
    /// Argument or global name, or the type tag when the name is not known yet
    pub subject: String,
    pub reason: String,
}

impl UnhashableInputError {
    pub fn new(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Re-label the error with the argument it came from
    pub fn for_subject(self, subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            reason: self.reason,
        }
    }
}

impl fmt::Display for UnhashableInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot hash '{}': {}", self.subject, self.reason)
    }
}

impl std::error::Error for UnhashableInputError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    Bind(BindError),
    Unhashable(UnhashableInputError),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::Bind(err) => write!(f, "Bind error: {}", err),
            KeyError::Unhashable(err) => write!(f, "Unhashable input: {}", err),
        }
    }
}

impl std::error::Error for KeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyError::Bind(err) => Some(err),
            KeyError::Unhashable(err) => Some(err),
        }
    }
}

impl From<BindError> for KeyError {
    fn from(err: BindError) -> Self {
        KeyError::Bind(err)
    }
}

impl From<UnhashableInputError> for KeyError {
    fn from(err: UnhashableInputError) -> Self {
        KeyError::Unhashable(err)
    }
}

pub type Result<T> = std::result::Result<T, KeyError>;
