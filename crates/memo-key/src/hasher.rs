//! Per-type hashers and the registry that dispatches to them

use crate::error::UnhashableInputError;
use crate::value::ArgValue;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Strategy turning one argument value into hash bytes.
///
/// Must be deterministic across runs for equal values.
pub trait Hasher: Send + Sync {
    fn hash(&self, value: &dyn ArgValue) -> Result<Vec<u8>, UnhashableInputError>;
}

impl<F> Hasher for F
where
    F: Fn(&dyn ArgValue) -> Result<Vec<u8>, UnhashableInputError> + Send + Sync,
{
    fn hash(&self, value: &dyn ArgValue) -> Result<Vec<u8>, UnhashableInputError> {
        self(value)
    }
}

/// Digest of the value's canonical representation
#[derive(Debug, Clone, Copy, Default)]
pub struct ReprHasher;

impl Hasher for ReprHasher {
    fn hash(&self, value: &dyn ArgValue) -> Result<Vec<u8>, UnhashableInputError> {
        let bytes = value.canonical_bytes()?;
        Ok(Sha256::digest(&bytes).to_vec())
    }
}

/// Digest of the file a `PathBuf` argument points to, so editing an input
/// file changes the key even though the path is the same
#[derive(Debug, Clone, Copy, Default)]
pub struct PathHasher;

impl Hasher for PathHasher {
    fn hash(&self, value: &dyn ArgValue) -> Result<Vec<u8>, UnhashableInputError> {
        let path = value
            .as_any()
            .downcast_ref::<PathBuf>()
            .ok_or_else(|| UnhashableInputError::new(value.type_tag(), "expected a path value"))?;

        let mut file = File::open(path)
            .map_err(|e| UnhashableInputError::new(path.display().to_string(), e.to_string()))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)
            .map_err(|e| UnhashableInputError::new(path.display().to_string(), e.to_string()))?;
        Ok(hasher.finalize().to_vec())
    }
}

/// Type tag -> hasher table with a single fallback for everything else
#[derive(Clone)]
pub struct HasherRegistry {
    by_tag: HashMap<&'static str, Arc<dyn Hasher>>,
    fallback: Arc<dyn Hasher>,
}

impl HasherRegistry {
    /// Registry with no per-type entries, only the fallback
    pub fn empty() -> Self {
        Self {
            by_tag: HashMap::new(),
            fallback: Arc::new(ReprHasher),
        }
    }

    pub fn register(&mut self, tag: &'static str, hasher: impl Hasher + 'static) -> &mut Self {
        self.by_tag.insert(tag, Arc::new(hasher));
        self
    }

    pub fn set_fallback(&mut self, hasher: impl Hasher + 'static) -> &mut Self {
        self.fallback = Arc::new(hasher);
        self
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    pub fn hasher_for(&self, tag: &str) -> &dyn Hasher {
        self.by_tag
            .get(tag)
            .map(|h| h.as_ref())
            .unwrap_or_else(|| self.fallback.as_ref())
    }

    pub fn hash(&self, value: &dyn ArgValue) -> Result<Vec<u8>, UnhashableInputError> {
        self.hasher_for(value.type_tag()).hash(value)
    }
}

impl Default for HasherRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("path", PathHasher);
        registry
    }
}

impl fmt::Debug for HasherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.by_tag.keys().collect();
        tags.sort();
        f.debug_struct("HasherRegistry")
            .field("tags", &tags)
            .finish_non_exhaustive()
    }
}
