//! Compiled code bodies and function definitions

use crate::signature::Signature;
use crate::value::write_framed;
use sha2::{Digest, Sha256};

/// Compiled form of a function body.
///
/// Two bodies are the same code when their instructions, constant pool and
/// referenced names are equal, no matter where or when they were defined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Code {
    pub instructions: Vec<u8>,
    pub constants: Vec<String>,
    pub names: Vec<String>,
}

impl Code {
    pub fn new(instructions: impl Into<Vec<u8>>) -> Self {
        Self {
            instructions: instructions.into(),
            constants: Vec::new(),
            names: Vec::new(),
        }
    }

    pub fn with_constants<I, S>(mut self, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constants = constants.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    /// SHA-256 over the framed instruction stream, constants and names
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut buf = Vec::with_capacity(self.instructions.len() + 64);
        write_framed(&mut buf, &self.instructions);

        buf.extend_from_slice(&(self.constants.len() as u64).to_le_bytes());
        for constant in &self.constants {
            write_framed(&mut buf, constant.as_bytes());
        }

        buf.extend_from_slice(&(self.names.len() as u64).to_le_bytes());
        for name in &self.names {
            write_framed(&mut buf, name.as_bytes());
        }

        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(&buf));
        out
    }
}

/// A memoizable function: stable name, parameter list and compiled body
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub signature: Signature,
    pub code: Code,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, signature: Signature, code: Code) -> Self {
        Self {
            name: name.into(),
            signature,
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_bodies_share_fingerprint() {
        let first = Code::new(vec![0x64, 0x01, 0x53, 0x00]).with_constants(["1"]);
        let second = Code::new(vec![0x64, 0x01, 0x53, 0x00]).with_constants(["1"]);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_changed_constant_changes_fingerprint() {
        let first = Code::new(vec![0x64, 0x01, 0x53, 0x00]).with_constants(["1"]);
        let second = Code::new(vec![0x64, 0x01, 0x53, 0x00]).with_constants(["2"]);
        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_constants_and_names_do_not_alias() {
        let first = Code::new(vec![1]).with_constants(["x"]);
        let second = Code::new(vec![1]).with_names(["x"]);
        assert_ne!(first.fingerprint(), second.fingerprint());
    }
}
