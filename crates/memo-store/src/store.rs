//! Durable key -> blob store with per-name size budgets

use crate::codec::{Codec, CodecError};
use crate::config::{Mode, Settings};
use crate::error::{Result, StoreError};
use crate::records;
use crate::types::{CacheEntry, EvictionPolicy, NameStats};
use chrono::Utc;
use memo_key::CacheKey;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

struct State {
    conn: Connection,
    budgets: HashMap<String, u64>,
}

struct Inner {
    /// Every read-check-write sequence, eviction included, runs under this lock
    state: Mutex<State>,
    cache_dir: PathBuf,
    policy: EvictionPolicy,
    default_budget: Option<u64>,
}

/// Entry store shared by every memoized function in the process.
///
/// Clones share the record table and lock. There is no cross-process
/// locking: two processes writing one store can race on eviction totals.
#[derive(Clone)]
pub struct EntryStore {
    inner: Arc<Inner>,
    mode: Mode,
}

impl EntryStore {
    /// Open (or create) the store described by `settings`
    ///
    /// The cache directory must be valid UTF-8, since blob paths are
    /// recorded as text.
    pub fn open(settings: &Settings) -> Result<Self> {
        if settings.cache_location.to_str().is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cache location is not valid UTF-8: {}",
                    settings.cache_location.display()
                ),
            )
            .into());
        }
        fs::create_dir_all(&settings.cache_location)?;
        if let Some(parent) = settings.store_location.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&settings.store_location)?;
        records::init(&conn)?;

        info!(
            cache_dir = ?settings.cache_location,
            store = ?settings.store_location,
            policy = %settings.eviction_policy,
            "Entry store initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    conn,
                    budgets: HashMap::new(),
                }),
                cache_dir: settings.cache_location.clone(),
                policy: settings.eviction_policy,
                default_budget: settings.default_budget,
            }),
            mode: settings.mode(),
        })
    }

    /// Handle on the same store with different bypass switches
    pub fn with_mode(&self, mode: Mode) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            mode,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.inner.policy
    }

    pub fn cache_dir(&self) -> &Path {
        &self.inner.cache_dir
    }

    /// Cap the total blob size kept for `name`
    pub fn set_budget(&self, name: &str, bytes: u64) {
        self.inner
            .state
            .lock()
            .budgets
            .insert(name.to_string(), bytes);
    }

    pub fn budget(&self, name: &str) -> Option<u64> {
        let state = self.inner.state.lock();
        self.budget_locked(&state, name)
    }

    fn budget_locked(&self, state: &State, name: &str) -> Option<u64> {
        state
            .budgets
            .get(name)
            .copied()
            .or(self.inner.default_budget)
    }

    /// Where the blob for `key` under `name` lives
    pub fn blob_path(&self, name: &str, key: &CacheKey) -> PathBuf {
        self.inner
            .cache_dir
            .join(format!("{}_{}", sanitize(name), key.as_str()))
    }

    /// Whether a stored result may be reused; always false in force or
    /// disabled mode
    pub fn exists(&self, key: &CacheKey) -> Result<bool> {
        if !self.mode.reads() {
            debug!(key = %key, "Forced or disabled, not reusing result");
            return Ok(false);
        }
        let state = self.inner.state.lock();
        Ok(records::exists(&state.conn, key)?)
    }

    /// Load a stored result and record the hit
    pub fn fetch<T, C>(&self, key: &CacheKey, codec: &C) -> Result<T>
    where
        C: Codec<T> + ?Sized,
    {
        let state = self.inner.state.lock();
        match records::get(&state.conn, key)? {
            Some(entry) => self.load_locked(&state, entry, codec),
            None => Err(StoreError::MissingEntry(key.clone())),
        }
    }

    /// `exists` and `fetch` in one critical section: `None` on a miss
    pub fn try_fetch<T, C>(&self, key: &CacheKey, codec: &C) -> Result<Option<T>>
    where
        C: Codec<T> + ?Sized,
    {
        if !self.mode.reads() {
            debug!(key = %key, "Forced or disabled, not reusing result");
            return Ok(None);
        }
        let state = self.inner.state.lock();
        match records::get(&state.conn, key)? {
            Some(entry) => self.load_locked(&state, entry, codec).map(Some),
            None => Ok(None),
        }
    }

    fn load_locked<T, C>(&self, state: &State, entry: CacheEntry, codec: &C) -> Result<T>
    where
        C: Codec<T> + ?Sized,
    {
        debug!(key = %entry.hash, name = %entry.name, "Fetching stored result");
        let value = codec
            .load(&entry.path)
            .map_err(|source| StoreError::CorruptEntry {
                key: entry.hash.clone(),
                path: entry.path.clone(),
                source,
            })?;
        records::touch(&state.conn, &entry.hash, Utc::now())?;
        Ok(value)
    }

    /// Persist a freshly computed result.
    ///
    /// The blob is written and synced before any record exists, so a
    /// concurrent lookup never sees a hit whose write has not completed.
    /// If the write fails nothing is recorded.
    pub fn stash<T, C>(
        &self,
        key: &CacheKey,
        name: &str,
        time_s: f64,
        value: &T,
        codec: &C,
    ) -> Result<()>
    where
        C: Codec<T> + ?Sized,
    {
        if !self.mode.writes() {
            debug!(key = %key, name = %name, "Disabled, not saving");
            return Ok(());
        }

        let state = self.inner.state.lock();
        let path = self.blob_path(name, key);
        let tmp = temp_path(&path);

        let size = match write_blob(codec, value, &tmp) {
            Ok(size) => size,
            Err(source) => {
                let _ = fs::remove_file(&tmp);
                return Err(StoreError::Write { path, source });
            }
        };

        if let Some(budget) = self.budget_locked(&state, name) {
            self.evict_locked(&state, name, key, size, budget);
        }

        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Write {
                path,
                source: CodecError::Io(err),
            });
        }

        let entry = CacheEntry {
            hash: key.clone(),
            name: name.to_string(),
            path: path.clone(),
            created_at: Utc::now(),
            used_at: None,
            size,
            use_count: 0,
            time_s,
        };
        if let Err(err) = records::upsert(&state.conn, &entry) {
            // The rename may have replaced the blob of an earlier record for
            // this key, so that record goes too once the blob is gone.
            match remove_blob(&path) {
                Ok(()) => {
                    if let Err(del) = records::delete(&state.conn, key) {
                        error!(key = %key, error = %del, "Failed to drop record after failed upsert");
                    }
                }
                Err(rm) => {
                    warn!(key = %key, path = ?path, error = %rm, "Failed to delete blob after failed upsert");
                }
            }
            return Err(err.into());
        }

        debug!(key = %key, name = %name, size, "Stored result");
        Ok(())
    }

    /// Drop entries of `name` in policy order until the existing total plus
    /// `incoming` is under `budget`, or nothing is left to drop.
    ///
    /// A blob that cannot be deleted keeps its record and is retried on the
    /// next pass; the record always goes only after its blob.
    fn evict_locked(&self, state: &State, name: &str, key: &CacheKey, incoming: u64, budget: u64) {
        let existing = match records::total_size(&state.conn, name, key) {
            Ok(total) => total,
            Err(err) => {
                error!(name = %name, error = %err, "Failed to read stored size");
                return;
            }
        };
        let mut total = existing + incoming;
        if total < budget {
            return;
        }

        let candidates = match records::eviction_order(&state.conn, name, key, self.inner.policy) {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(name = %name, error = %err, "Failed to list eviction candidates");
                return;
            }
        };

        for victim in candidates {
            if total < budget {
                break;
            }
            debug!(name = %name, total, budget, "Size limit hit, freeing space");

            match fs::remove_file(&victim.path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    warn!(key = %victim.hash, path = ?victim.path, "Evicted blob was already gone");
                }
                Err(err) => {
                    warn!(key = %victim.hash, path = ?victim.path, error = %err, "Failed to delete blob, will retry");
                    continue;
                }
            }

            if let Err(err) = records::delete(&state.conn, &victim.hash) {
                warn!(key = %victim.hash, error = %err, "Failed to delete record, will retry");
                continue;
            }

            total = total.saturating_sub(victim.size);
            info!(key = %victim.hash, name = %name, size = victim.size, "Evicted entry");
        }

        if total >= budget {
            debug!(name = %name, total, budget, "Budget unreachable, storing anyway");
        }
    }

    pub fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let state = self.inner.state.lock();
        Ok(records::get(&state.conn, key)?)
    }

    /// All entries, or only those stored under `name`
    pub fn entries(&self, name: Option<&str>) -> Result<Vec<CacheEntry>> {
        let state = self.inner.state.lock();
        Ok(records::list(&state.conn, name)?)
    }

    pub fn stats(&self) -> Result<Vec<NameStats>> {
        let state = self.inner.state.lock();
        Ok(records::stats(&state.conn)?)
    }

    /// Delete one entry and its blob. Returns whether it existed.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let state = self.inner.state.lock();
        let Some(entry) = records::get(&state.conn, key)? else {
            return Ok(false);
        };
        remove_blob(&entry.path)?;
        records::delete(&state.conn, key)?;
        info!(key = %key, name = %entry.name, "Removed entry");
        Ok(true)
    }

    /// Delete every entry (or every entry of `name`). Entries whose blob
    /// cannot be deleted are kept. Returns the number removed.
    pub fn clear(&self, name: Option<&str>) -> Result<usize> {
        let state = self.inner.state.lock();
        let mut removed = 0;
        for entry in records::list(&state.conn, name)? {
            if let Err(err) = remove_blob(&entry.path) {
                warn!(key = %entry.hash, path = ?entry.path, error = %err, "Failed to delete blob");
                continue;
            }
            records::delete(&state.conn, &entry.hash)?;
            removed += 1;
        }
        info!(name = ?name, removed, "Cleared entries");
        Ok(removed)
    }
}

fn remove_blob(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn write_blob<T, C>(codec: &C, value: &T, path: &Path) -> std::result::Result<u64, CodecError>
where
    C: Codec<T> + ?Sized,
{
    codec.dump(value, path)?;
    File::open(path)?.sync_all()?;
    Ok(fs::metadata(path)?.len())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Keep names usable as a file-name prefix
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
