use crate::types::EvictionPolicy;
use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Store configuration, loaded once and passed in explicitly
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Never reuse results, but keep storing them
    pub force: bool,
    /// Neither reuse nor store results
    pub disable: bool,
    /// Directory holding result blobs
    pub cache_location: PathBuf,
    /// SQLite file holding entry records
    pub store_location: PathBuf,
    pub eviction_policy: EvictionPolicy,
    /// Budget in bytes for names without an explicit one
    pub default_budget: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_root(".memo")
    }
}

impl Settings {
    /// Defaults with both locations under `root`
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            force: false,
            disable: false,
            cache_location: root.join("cache"),
            store_location: root.join("stash.db"),
            eviction_policy: EvictionPolicy::default(),
            default_budget: None,
        }
    }

    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let force = env_flag("MEMO_FORCE");
        let disable = env_flag("MEMO_DISABLE");

        let cache_location = env::var("MEMO_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_location);

        let store_location = env::var("MEMO_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_location);

        let eviction_policy = match env::var("MEMO_EVICTION_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|err: String| {
                warn!(error = %err, "Falling back to default eviction policy");
                EvictionPolicy::default()
            }),
            Err(_) => EvictionPolicy::default(),
        };

        let default_budget = match env::var("MEMO_MAX_SIZE") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!(value = %raw, error = %err, "Ignoring unparseable MEMO_MAX_SIZE");
                    None
                }
            },
            Err(_) => None,
        };

        Self {
            force,
            disable,
            cache_location,
            store_location,
            eviction_policy,
            default_budget,
        }
    }

    pub fn mode(&self) -> Mode {
        Mode {
            force: self.force,
            disable: self.disable,
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Bypass switches consulted by lookups and stashes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
    pub force: bool,
    pub disable: bool,
}

impl Mode {
    /// Whether lookups may return a stored result
    pub fn reads(&self) -> bool {
        !self.force && !self.disable
    }

    /// Whether new results are persisted
    pub fn writes(&self) -> bool {
        !self.disable
    }
}
