//! Argument values and call arguments

use crate::error::UnhashableInputError;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared handle to a type-erased argument value
pub type Arg = Arc<dyn ArgValue>;

/// Upcast to `Any`, so registered hashers can downcast to the concrete type
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A value that can take part in a cache key.
///
/// `type_tag` selects the hasher from the registry and is folded into the
/// argument digest, so `1` and `"1"` never collide. `canonical_bytes` is the
/// representation the fallback hasher digests; it must be deterministic
/// across runs for equal values.
pub trait ArgValue: AsAny + fmt::Debug + Send + Sync {
    fn type_tag(&self) -> &'static str;

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError>;
}

/// Append `bytes` with a little-endian length prefix
pub(crate) fn write_framed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

macro_rules! int_arg {
    ($($ty:ty),*) => {
        $(
            impl ArgValue for $ty {
                fn type_tag(&self) -> &'static str {
                    "int"
                }

                fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
                    Ok(self.to_string().into_bytes())
                }
            }
        )*
    };
}

int_arg!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl ArgValue for f64 {
    fn type_tag(&self) -> &'static str {
        "float"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        let value = if self.is_nan() { f64::NAN } else { *self };
        Ok(value.to_bits().to_le_bytes().to_vec())
    }
}

impl ArgValue for f32 {
    fn type_tag(&self) -> &'static str {
        "float"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        f64::from(*self).canonical_bytes()
    }
}

impl ArgValue for bool {
    fn type_tag(&self) -> &'static str {
        "bool"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        Ok(vec![u8::from(*self)])
    }
}

impl ArgValue for String {
    fn type_tag(&self) -> &'static str {
        "str"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        Ok(self.as_bytes().to_vec())
    }
}

impl ArgValue for &'static str {
    fn type_tag(&self) -> &'static str {
        "str"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        Ok(self.as_bytes().to_vec())
    }
}

impl ArgValue for PathBuf {
    fn type_tag(&self) -> &'static str {
        "path"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        Ok(self.to_string_lossy().into_owned().into_bytes())
    }
}

impl ArgValue for () {
    fn type_tag(&self) -> &'static str {
        "none"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        Ok(Vec::new())
    }
}

impl<T: ArgValue + 'static> ArgValue for Option<T> {
    fn type_tag(&self) -> &'static str {
        match self {
            Some(value) => value.type_tag(),
            None => "none",
        }
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        match self {
            Some(value) => value.canonical_bytes(),
            None => Ok(Vec::new()),
        }
    }
}

impl<T: ArgValue + 'static> ArgValue for Vec<T> {
    fn type_tag(&self) -> &'static str {
        "list"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for item in self {
            write_framed(&mut buf, item.type_tag().as_bytes());
            write_framed(&mut buf, &item.canonical_bytes()?);
        }
        Ok(buf)
    }
}

impl ArgValue for serde_json::Value {
    fn type_tag(&self) -> &'static str {
        "json"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        serde_json::to_vec(self).map_err(|e| UnhashableInputError::new("json", e.to_string()))
    }
}

/// Raw byte buffer argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl ArgValue for Bytes {
    fn type_tag(&self) -> &'static str {
        "bytes"
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        Ok(self.0.clone())
    }
}

/// Any serializable value, hashed through its JSON encoding.
///
/// Serialization errors surface as `UnhashableInputError` instead of falling
/// back to some weaker representation.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T> ArgValue for Json<T>
where
    T: Serialize + fmt::Debug + Send + Sync + 'static,
{
    fn type_tag(&self) -> &'static str {
        "json"
    }

    /// Encoded through `serde_json::Value`, whose maps keep keys sorted, so
    /// hash maps with equal content encode identically.
    fn canonical_bytes(&self) -> Result<Vec<u8>, UnhashableInputError> {
        let value = serde_json::to_value(&self.0)
            .map_err(|e| UnhashableInputError::new("json", e.to_string()))?;
        serde_json::to_vec(&value).map_err(|e| UnhashableInputError::new("json", e.to_string()))
    }
}

/// Positional and keyword arguments of one call
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<Arg>,
    keyword: Vec<(String, Arg)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl ArgValue + 'static) -> Self {
        self.positional.push(Arc::new(value));
        self
    }

    /// Append a keyword argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl ArgValue + 'static) -> Self {
        self.keyword.push((name.into(), Arc::new(value)));
        self
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    pub fn keyword(&self) -> &[(String, Arg)] {
        &self.keyword
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_integer_widths_share_representation() {
        assert_eq!(1i32.type_tag(), 1u64.type_tag());
        assert_eq!(
            1i32.canonical_bytes().unwrap(),
            1u64.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn test_int_and_str_tags_differ() {
        assert_ne!(1i64.type_tag(), "1".type_tag());
        assert_eq!(
            1i64.canonical_bytes().unwrap(),
            "1".canonical_bytes().unwrap()
        );
    }

    #[test]
    fn test_list_framing_is_unambiguous() {
        let a = vec!["ab".to_string(), "c".to_string()];
        let b = vec!["a".to_string(), "bc".to_string()];
        assert_ne!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn test_option_takes_inner_tag() {
        assert_eq!(Some(3i64).type_tag(), "int");
        assert_eq!(None::<i64>.type_tag(), "none");
    }

    #[test]
    fn test_json_non_string_keys_are_unhashable() {
        let mut table = HashMap::new();
        table.insert((1, 2), "x");
        let err = Json(table).canonical_bytes().unwrap_err();
        assert_eq!(err.subject, "json");
    }

    #[test]
    fn test_json_map_encoding_ignores_insertion_order() {
        let forward: HashMap<String, i32> = (0..32).map(|i| (format!("k{i}"), i)).collect();
        let backward: HashMap<String, i32> =
            (0..32).rev().map(|i| (format!("k{i}"), i)).collect();
        let expected = Json(forward).canonical_bytes().unwrap();
        assert_eq!(Json(backward).canonical_bytes().unwrap(), expected);
        assert!(expected.starts_with(b"{\"k0\":0,\"k1\":1,\"k10\":10"));
    }

    #[test]
    fn test_downcast_through_trait_object() {
        let arg: Arg = Arc::new(PathBuf::from("/tmp/data.csv"));
        let value: &dyn ArgValue = arg.as_ref();
        assert!(value.as_any().downcast_ref::<PathBuf>().is_some());
    }

    #[test]
    fn test_args_builder() {
        let args = Args::new().arg(1i64).kwarg("b", 2i64);
        assert_eq!(args.positional().len(), 1);
        assert_eq!(args.keyword()[0].0, "b");
        assert!(!args.is_empty());
        assert!(Args::new().is_empty());
    }
}
