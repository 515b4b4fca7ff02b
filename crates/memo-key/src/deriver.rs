//! Combines a call's inputs into one cache key

use crate::code::{Code, FunctionDef};
use crate::error::{Result, UnhashableInputError};
use crate::hasher::{Hasher, HasherRegistry};
use crate::key::CacheKey;
use crate::signature::Binding;
use crate::value::{write_framed, Arg, ArgValue, Args};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// External value read at derivation time, so changing it changes the key
#[derive(Clone)]
pub struct WatchedGlobal {
    pub name: String,
    read: Arc<dyn Fn() -> Arg + Send + Sync>,
}

impl WatchedGlobal {
    pub fn new<F, V>(name: impl Into<String>, read: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: ArgValue + 'static,
    {
        Self {
            name: name.into(),
            read: Arc::new(move || Arc::new(read()) as Arg),
        }
    }

    pub fn current(&self) -> Arg {
        (self.read)()
    }
}

impl fmt::Debug for WatchedGlobal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedGlobal")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// What goes into a key besides the arguments themselves
#[derive(Clone)]
pub struct KeyConfig {
    pub ignore_args: BTreeSet<String>,
    pub hash_code: bool,
    pub watch_functions: Vec<Code>,
    pub watch_globals: Vec<WatchedGlobal>,
    /// Per-argument overrides, checked before the type registry
    pub arg_hashers: HashMap<String, Arc<dyn Hasher>>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            ignore_args: BTreeSet::new(),
            hash_code: true,
            watch_functions: Vec::new(),
            watch_globals: Vec::new(),
            arg_hashers: HashMap::new(),
        }
    }
}

impl KeyConfig {
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignore_args.insert(name.into());
        self
    }

    pub fn hash_code(mut self, enabled: bool) -> Self {
        self.hash_code = enabled;
        self
    }

    pub fn watch_function(mut self, code: Code) -> Self {
        self.watch_functions.push(code);
        self
    }

    pub fn watch_global(mut self, global: WatchedGlobal) -> Self {
        self.watch_globals.push(global);
        self
    }

    pub fn hasher_for_arg(mut self, name: impl Into<String>, hasher: impl Hasher + 'static) -> Self {
        self.arg_hashers.insert(name.into(), Arc::new(hasher));
        self
    }
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyConfig")
            .field("ignore_args", &self.ignore_args)
            .field("hash_code", &self.hash_code)
            .field("watch_functions", &self.watch_functions.len())
            .field("watch_globals", &self.watch_globals)
            .field("arg_hashers", &self.arg_hashers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Derives cache keys for calls to one function
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    name: String,
    function: FunctionDef,
    config: KeyConfig,
    registry: HasherRegistry,
}

impl KeyDeriver {
    pub fn new(function: FunctionDef, config: KeyConfig) -> Self {
        Self {
            name: function.name.clone(),
            function,
            config,
            registry: HasherRegistry::default(),
        }
    }

    /// Identify the function by `name` instead of its declared name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_registry(mut self, registry: HasherRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &FunctionDef {
        &self.function
    }

    /// Key for one call. Binding errors and hasher failures propagate.
    pub fn derive(&self, args: &Args) -> Result<CacheKey> {
        let binding = self.function.signature.bind(args)?;

        let mut parts: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
        parts.insert("name", Sha256::digest(self.name.as_bytes()).to_vec());
        parts.insert("args", self.hash_binding(&binding)?);

        if self.config.hash_code {
            parts.insert("code", self.function.code.fingerprint().to_vec());
        }

        if !self.config.watch_functions.is_empty() {
            let mut buf = Vec::new();
            for code in &self.config.watch_functions {
                write_framed(&mut buf, &code.fingerprint());
            }
            parts.insert("functions", Sha256::digest(&buf).to_vec());
        }

        if !self.config.watch_globals.is_empty() {
            let mut buf = Vec::new();
            for global in &self.config.watch_globals {
                let value = global.current();
                let digest = self.hash_value(&global.name, value.as_ref(), None)?;
                write_framed(&mut buf, global.name.as_bytes());
                write_framed(&mut buf, &digest);
            }
            parts.insert("globals", Sha256::digest(&buf).to_vec());
        }

        let mut hasher = Sha256::new();
        for (label, digest) in &parts {
            hasher.update((label.len() as u64).to_le_bytes());
            hasher.update(label.as_bytes());
            hasher.update(digest);
        }
        let key = CacheKey::from_digest(&hasher.finalize());

        debug!(name = %self.name, key = %key, "Derived cache key");
        Ok(key)
    }

    fn hash_binding(&self, binding: &Binding) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match binding {
            Binding::Named(bound) => {
                buf.extend_from_slice(b"named");
                for (name, value) in bound {
                    if self.config.ignore_args.contains(name) {
                        continue;
                    }
                    let digest = self.hash_argument(name, value.as_ref())?;
                    write_framed(&mut buf, name.as_bytes());
                    write_framed(&mut buf, &digest);
                }
            }
            Binding::Raw {
                positional,
                keyword,
            } => {
                buf.extend_from_slice(b"raw");
                buf.extend_from_slice(&(positional.len() as u64).to_le_bytes());
                for (idx, value) in positional.iter().enumerate() {
                    let digest = self.hash_argument(&idx.to_string(), value.as_ref())?;
                    write_framed(&mut buf, &digest);
                }

                let kept: Vec<_> = keyword
                    .iter()
                    .filter(|(name, _)| !self.config.ignore_args.contains(name))
                    .collect();
                buf.extend_from_slice(&(kept.len() as u64).to_le_bytes());
                for (name, value) in kept {
                    let digest = self.hash_argument(name, value.as_ref())?;
                    write_framed(&mut buf, name.as_bytes());
                    write_framed(&mut buf, &digest);
                }
            }
        }
        Ok(Sha256::digest(&buf).to_vec())
    }

    fn hash_argument(&self, name: &str, value: &dyn ArgValue) -> Result<Vec<u8>> {
        let hasher = self.config.arg_hashers.get(name).map(|h| h.as_ref());
        self.hash_value(name, value, hasher)
    }

    fn hash_value(
        &self,
        name: &str,
        value: &dyn ArgValue,
        hasher: Option<&dyn Hasher>,
    ) -> Result<Vec<u8>> {
        let bytes = match hasher {
            Some(hasher) => hasher.hash(value),
            None => self.registry.hash(value),
        }
        .map_err(|e: UnhashableInputError| e.for_subject(name))?;

        let mut buf = Vec::with_capacity(bytes.len() + 32);
        write_framed(&mut buf, value.type_tag().as_bytes());
        write_framed(&mut buf, &bytes);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BindError, KeyError};
    use crate::signature::{Param, Signature};
    use crate::value::Json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn body(ret: &str) -> Code {
        Code::new(vec![0x97, 0x00, 0x64, 0x01, 0x53, 0x00]).with_constants([ret])
    }

    fn add() -> FunctionDef {
        FunctionDef::new(
            "add",
            Signature::new(vec![Param::new("a"), Param::new("b")]),
            body("a + b"),
        )
    }

    fn deriver(function: FunctionDef) -> KeyDeriver {
        KeyDeriver::new(function, KeyConfig::default())
    }

    #[test]
    fn test_key_is_fixed_length_hex() {
        let key = deriver(add())
            .derive(&Args::new().arg(1i64).arg(2i64))
            .unwrap();
        assert_eq!(key.as_str().len(), crate::key::KEY_LEN);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_equal_hash_maps_give_one_key() {
        let d = deriver(FunctionDef::new(
            "lookup",
            Signature::new(vec![Param::new("table")]),
            body("table"),
        ));
        let keys: std::collections::BTreeSet<CacheKey> = (0..20)
            .map(|_| {
                let table: HashMap<String, i32> =
                    (0..32).map(|i| (format!("k{i}"), i)).collect();
                d.derive(&Args::new().arg(Json(table))).unwrap()
            })
            .collect();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_binding_normalizes_call_forms() {
        let d = deriver(add());
        let a = d.derive(&Args::new().arg(1i64).kwarg("b", 2i64)).unwrap();
        let b = d
            .derive(&Args::new().kwarg("a", 1i64).kwarg("b", 2i64))
            .unwrap();
        let c = d.derive(&Args::new().arg(1i64).arg(2i64)).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_argument_order_matters() {
        let d = deriver(add());
        let a = d.derive(&Args::new().arg(1i64).arg(2i64)).unwrap();
        let b = d.derive(&Args::new().arg(2i64).arg(1i64)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_value_type_matters() {
        let f = FunctionDef::new("f", Signature::new(vec![Param::new("a")]), body("a"));
        let d = deriver(f);
        assert_ne!(
            d.derive(&Args::new().arg(1i64)).unwrap(),
            d.derive(&Args::new().arg("1")).unwrap()
        );
    }

    #[test]
    fn test_variadic_call_forms_do_not_collide() {
        let f = FunctionDef::new("total", Signature::variadic(), body("sum"));
        let d = deriver(f);
        let kw = d.derive(&Args::new().arg(1i64).kwarg("b", 2i64)).unwrap();
        let pos = d.derive(&Args::new().arg(1i64).arg(2i64)).unwrap();
        let all_kw = d
            .derive(&Args::new().kwarg("a", 1i64).kwarg("b", 2i64))
            .unwrap();
        assert_ne!(kw, pos);
        assert_ne!(kw, all_kw);
        assert_ne!(pos, all_kw);
        assert_eq!(
            kw,
            d.derive(&Args::new().arg(1i64).kwarg("b", 2i64)).unwrap()
        );
    }

    #[test]
    fn test_redefined_function_with_same_body_collides() {
        let first = deriver(FunctionDef::new("f", Signature::default(), body("1")));
        let second = deriver(FunctionDef::new("f", Signature::default(), body("1")));
        let changed = deriver(FunctionDef::new("f", Signature::default(), body("2")));
        let args = Args::new();
        assert_eq!(first.derive(&args).unwrap(), second.derive(&args).unwrap());
        assert_ne!(first.derive(&args).unwrap(), changed.derive(&args).unwrap());
    }

    #[test]
    fn test_code_ignored_when_disabled() {
        let config = KeyConfig::default().hash_code(false);
        let first = KeyDeriver::new(
            FunctionDef::new("f", Signature::default(), body("1")),
            config.clone(),
        );
        let second = KeyDeriver::new(FunctionDef::new("f", Signature::default(), body("2")), config);
        assert_eq!(
            first.derive(&Args::new()).unwrap(),
            second.derive(&Args::new()).unwrap()
        );
    }

    #[test]
    fn test_name_is_part_of_identity() {
        let a = deriver(FunctionDef::new("one", Signature::default(), body("1")));
        let b = deriver(FunctionDef::new("two", Signature::default(), body("1")));
        assert_ne!(a.derive(&Args::new()).unwrap(), b.derive(&Args::new()).unwrap());

        let renamed = deriver(FunctionDef::new("two", Signature::default(), body("1"))).with_name("one");
        assert_eq!(
            a.derive(&Args::new()).unwrap(),
            renamed.derive(&Args::new()).unwrap()
        );
    }

    #[test]
    fn test_ignored_arguments_are_excluded() {
        let f = FunctionDef::new(
            "fit",
            Signature::new(vec![Param::new("data"), Param::new("verbose")]),
            body("fit"),
        );
        let d = KeyDeriver::new(f, KeyConfig::default().ignore("verbose"));
        assert_eq!(
            d.derive(&Args::new().arg(1i64).arg(true)).unwrap(),
            d.derive(&Args::new().arg(1i64).arg(false)).unwrap()
        );
    }

    #[test]
    fn test_watched_function_changes_key() {
        let f = FunctionDef::new("f", Signature::default(), body("helper()"));
        let with_v1 = KeyDeriver::new(f.clone(), KeyConfig::default().watch_function(body("v1")));
        let with_v2 = KeyDeriver::new(f, KeyConfig::default().watch_function(body("v2")));
        assert_ne!(
            with_v1.derive(&Args::new()).unwrap(),
            with_v2.derive(&Args::new()).unwrap()
        );
    }

    #[test]
    fn test_watched_global_read_at_call_time() {
        static THRESHOLD: AtomicI64 = AtomicI64::new(1);

        let f = FunctionDef::new("f", Signature::default(), body("THRESHOLD"));
        let d = KeyDeriver::new(
            f,
            KeyConfig::default().watch_global(WatchedGlobal::new("THRESHOLD", || {
                THRESHOLD.load(Ordering::SeqCst)
            })),
        );

        let before = d.derive(&Args::new()).unwrap();
        assert_eq!(before, d.derive(&Args::new()).unwrap());

        THRESHOLD.store(2, Ordering::SeqCst);
        assert_ne!(before, d.derive(&Args::new()).unwrap());
    }

    #[test]
    fn test_argument_hasher_override() {
        let f = FunctionDef::new("f", Signature::new(vec![Param::new("seed")]), body("seed"));
        let d = KeyDeriver::new(
            f,
            KeyConfig::default().hasher_for_arg(
                "seed",
                |_: &dyn ArgValue| -> std::result::Result<Vec<u8>, UnhashableInputError> {
                    Ok(b"constant".to_vec())
                },
            ),
        );
        assert_eq!(
            d.derive(&Args::new().arg(1i64)).unwrap(),
            d.derive(&Args::new().arg(2i64)).unwrap()
        );
    }

    #[test]
    fn test_unhashable_argument_propagates() {
        let f = FunctionDef::new("f", Signature::new(vec![Param::new("table")]), body("table"));
        let mut table = HashMap::new();
        table.insert((1, 2), 3);
        let err = deriver(f).derive(&Args::new().arg(Json(table))).unwrap_err();
        match err {
            KeyError::Unhashable(inner) => assert_eq!(inner.subject, "table"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bind_error_precedes_hashing() {
        let f = FunctionDef::new(
            "f",
            Signature::new(vec![Param::new("a"), Param::keyword_only("b")]),
            body("a + b"),
        );
        let err = deriver(f)
            .derive(&Args::new().arg(1i64).arg(1i64))
            .unwrap_err();
        assert!(matches!(
            err,
            KeyError::Bind(BindError::TooManyPositional { .. })
        ));
    }
}
