//! Result serialization contract and the stock codecs

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug)]
pub enum CodecError {
    Io(io::Error),
    Encode(String),
    Decode(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Io(err) => write!(f, "IO error: {}", err),
            CodecError::Encode(msg) => write!(f, "Encode error: {}", msg),
            CodecError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        CodecError::Io(err)
    }
}

/// Writes a value to a file and reads it back.
///
/// `load(dump(v))` must equal `v` for every value the codec accepts.
pub trait Codec<T> {
    /// Write `value` to `path`, returning the number of bytes written
    fn dump(&self, value: &T, path: &Path) -> Result<u64, CodecError>;

    fn load(&self, path: &Path) -> Result<T, CodecError>;
}

/// JSON via serde; the fallback for any serializable result
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn dump(&self, value: &T, path: &Path) -> Result<u64, CodecError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value).map_err(|e| {
            if e.is_io() {
                CodecError::Io(io::Error::from(e))
            } else {
                CodecError::Encode(e.to_string())
            }
        })?;
        writer.flush()?;
        Ok(fs::metadata(path)?.len())
    }

    fn load(&self, path: &Path) -> Result<T, CodecError> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            if e.is_io() {
                CodecError::Io(io::Error::from(e))
            } else {
                CodecError::Decode(e.to_string())
            }
        })
    }
}

/// Raw bytes, written as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn dump(&self, value: &Vec<u8>, path: &Path) -> Result<u64, CodecError> {
        fs::write(path, value)?;
        Ok(value.len() as u64)
    }

    fn load(&self, path: &Path) -> Result<Vec<u8>, CodecError> {
        Ok(fs::read(path)?)
    }
}
