//! Store types

use chrono::{DateTime, Utc};
use memo_key::CacheKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Metadata for one stored result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: CacheKey,
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub size: u64,
    pub use_count: u64,
    /// Seconds the original computation took
    pub time_s: f64,
}

/// Per-name totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameStats {
    pub name: String,
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    /// Σ use_count × time_s
    pub seconds_saved: f64,
}

/// Which entry goes first when a name is over budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Oldest `used_at`, or `created_at` for entries never hit
    #[default]
    #[serde(rename = "lru")]
    LeastRecentlyUsed,
    /// Lowest `use_count`
    #[serde(rename = "lfu")]
    LeastFrequentlyUsed,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::LeastRecentlyUsed => write!(f, "lru"),
            EvictionPolicy::LeastFrequentlyUsed => write!(f, "lfu"),
        }
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" | "least_recently_used" => Ok(EvictionPolicy::LeastRecentlyUsed),
            "lfu" | "least_frequently_used" => Ok(EvictionPolicy::LeastFrequentlyUsed),
            other => Err(format!("unknown eviction policy '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_serde_uses_short_names() {
        assert_eq!(
            serde_json::to_string(&EvictionPolicy::LeastRecentlyUsed).unwrap(),
            "\"lru\""
        );
        assert_eq!(
            serde_json::from_str::<EvictionPolicy>("\"lfu\"").unwrap(),
            EvictionPolicy::LeastFrequentlyUsed
        );
        assert!(serde_json::from_str::<EvictionPolicy>("\"LeastFrequentlyUsed\"").is_err());
    }

    #[test]
    fn test_policy_parse_and_display() {
        assert_eq!(
            "LRU".parse::<EvictionPolicy>().unwrap(),
            EvictionPolicy::LeastRecentlyUsed
        );
        assert_eq!(
            "lfu".parse::<EvictionPolicy>().unwrap(),
            EvictionPolicy::LeastFrequentlyUsed
        );
        assert!("fifo".parse::<EvictionPolicy>().is_err());
        assert_eq!(EvictionPolicy::LeastFrequentlyUsed.to_string(), "lfu");
    }

    #[test]
    fn test_cache_entry_json_shape() {
        let hash = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        let entry = CacheEntry {
            hash: hash.parse().unwrap(),
            name: "square".to_string(),
            path: PathBuf::from(format!("/cache/square_{hash}")),
            created_at: Utc::now(),
            used_at: None,
            size: 6,
            use_count: 2,
            time_s: 0.25,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["hash"], hash);
        assert!(json["used_at"].is_null());
        assert_eq!(
            serde_json::from_value::<CacheEntry>(json.clone()).unwrap(),
            entry
        );

        let mut bad = json;
        bad["hash"] = serde_json::Value::from("9F86");
        assert!(serde_json::from_value::<CacheEntry>(bad).is_err());
    }
}
