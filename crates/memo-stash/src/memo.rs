//! Compute-or-fetch wrapper around one function

use crate::error::{MemoError, Result};
use memo_key::{Args, CacheKey, FunctionDef, HasherRegistry, KeyConfig, KeyDeriver};
use memo_store::{Codec, EntryStore, JsonCodec, Mode, StoreError};
use std::marker::PhantomData;
use std::time::Instant;
use tracing::{error, info};

/// Outcome of one memoized call
#[derive(Debug)]
pub struct Recall<T> {
    pub value: T,
    pub key: CacheKey,
    /// Whether `value` came from the store
    pub hit: bool,
    /// Set when the value was computed but could not be stored
    pub stash_error: Option<StoreError>,
}

/// A function whose results are persisted and reused across calls
pub struct Memo<T, C = JsonCodec> {
    deriver: KeyDeriver,
    store: EntryStore,
    codec: C,
    _result: PhantomData<fn() -> T>,
}

pub struct MemoBuilder<T, C = JsonCodec> {
    function: FunctionDef,
    config: KeyConfig,
    registry: Option<HasherRegistry>,
    name: Option<String>,
    codec: C,
    force: Option<bool>,
    disable: Option<bool>,
    max_size: Option<u64>,
    _result: PhantomData<fn() -> T>,
}

impl<T> Memo<T, JsonCodec> {
    pub fn builder(function: FunctionDef) -> MemoBuilder<T, JsonCodec> {
        MemoBuilder {
            function,
            config: KeyConfig::default(),
            registry: None,
            name: None,
            codec: JsonCodec,
            force: None,
            disable: None,
            max_size: None,
            _result: PhantomData,
        }
    }
}

impl<T, C> MemoBuilder<T, C> {
    /// Store results under `name` instead of the function's declared name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn key_config(mut self, config: KeyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: HasherRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn codec<C2>(self, codec: C2) -> MemoBuilder<T, C2> {
        MemoBuilder {
            function: self.function,
            config: self.config,
            registry: self.registry,
            name: self.name,
            codec,
            force: self.force,
            disable: self.disable,
            max_size: self.max_size,
            _result: PhantomData,
        }
    }

    /// Override the store's force switch for this function only
    pub fn force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    /// Override the store's disable switch for this function only
    pub fn disable(mut self, disable: bool) -> Self {
        self.disable = Some(disable);
        self
    }

    /// Byte budget for everything stored under this function's name
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn build(self, store: &EntryStore) -> Memo<T, C> {
        let mut deriver = KeyDeriver::new(self.function, self.config);
        if let Some(name) = self.name {
            deriver = deriver.with_name(name);
        }
        if let Some(registry) = self.registry {
            deriver = deriver.with_registry(registry);
        }

        let base = store.mode();
        let store = store.with_mode(Mode {
            force: self.force.unwrap_or(base.force),
            disable: self.disable.unwrap_or(base.disable),
        });
        if let Some(bytes) = self.max_size {
            store.set_budget(deriver.name(), bytes);
        }

        Memo {
            deriver,
            store,
            codec: self.codec,
            _result: PhantomData,
        }
    }
}

impl<T, C> Memo<T, C>
where
    C: Codec<T>,
{
    pub fn name(&self) -> &str {
        self.deriver.name()
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Key the given arguments map to
    pub fn key(&self, args: &Args) -> memo_key::Result<CacheKey> {
        self.deriver.derive(args)
    }

    /// Return the stored result for `args`, or run `compute` and store it
    pub fn call<F>(&self, args: &Args, compute: F) -> Result<T>
    where
        F: FnOnce() -> T,
    {
        self.try_call(args, || Ok(compute()))
    }

    /// Like [`Memo::call`] for a fallible computation; its error comes back
    /// as [`MemoError::Compute`] and nothing is stored
    pub fn try_call<E, F>(&self, args: &Args, compute: F) -> Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.recall(args, compute).map(|recall| recall.value)
    }

    /// Full outcome of a call: value, key, hit or miss, and any storage
    /// failure that did not stop the value from being returned
    pub fn recall<E, F>(&self, args: &Args, compute: F) -> Result<Recall<T>, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let key = self.deriver.derive(args)?;

        if let Some(value) = self.store.try_fetch(&key, &self.codec)? {
            info!(name = %self.name(), key = %key, "Cache hit");
            return Ok(Recall {
                value,
                key,
                hit: true,
                stash_error: None,
            });
        }

        info!(name = %self.name(), key = %key, "Cache miss");
        let started = Instant::now();
        let value = compute().map_err(MemoError::Compute)?;
        let time_s = started.elapsed().as_secs_f64();

        let stash_error = match self
            .store
            .stash(&key, self.name(), time_s, &value, &self.codec)
        {
            Ok(()) => None,
            Err(err) => {
                error!(name = %self.name(), key = %key, error = %err, "Failed to store result");
                Some(err)
            }
        };

        Ok(Recall {
            value,
            key,
            hit: false,
            stash_error,
        })
    }
}
