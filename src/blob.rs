// SPDX-License-Identifier: MIT
//! The finished, immutable contract descriptor blob

use crate::reader::{ContractReader, ReadError};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Errors that can occur while publishing a blob
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist blob: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Invalid symbol name: {0:?}")]
    InvalidSymbol(String),
}

/// A fully built blob.
///
/// Only a successful build produces one, so a `ContractBlob` is never partially
/// constructed. The bytes are shared and never mutated; clones are cheap and
/// may be read from any number of threads.
#[derive(Clone, PartialEq, Eq)]
pub struct ContractBlob {
    bytes: Arc<[u8]>,
}

impl ContractBlob {
    pub(crate) fn from_built(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Validate and open the blob for reading
    pub fn reader(&self) -> Result<ContractReader<'_>, ReadError> {
        ContractReader::parse(&self.bytes)
    }

    /// Lowercase hex SHA-256 of the blob bytes
    pub fn digest(&self) -> String {
        digest_hex(&self.bytes)
    }

    /// Write the blob to `path` via a temp file in the same directory and a rename,
    /// so the destination never holds a partial blob.
    pub fn write_atomic<P: AsRef<Path>>(&self, path: P) -> Result<(), BlobError> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(&self.bytes)?;
        file.as_file().sync_all()?;
        file.persist(path)?;

        tracing::debug!(path = %path.display(), bytes = self.bytes.len(), "Blob written");
        Ok(())
    }

    /// Render Rust source declaring the blob as an exported static byte array
    pub fn to_rust_static(&self, symbol: &str) -> Result<String, BlobError> {
        if !is_identifier(symbol) {
            return Err(BlobError::InvalidSymbol(symbol.to_string()));
        }

        let mut source = String::with_capacity(self.bytes.len() * 6 + 256);
        source.push_str("// Generated by contract-blob. Do not edit.\n");
        source.push_str(&format!("// sha256: {}\n", self.digest()));
        source.push_str("#[no_mangle]\n");
        source.push_str(&format!(
            "pub static {}: [u8; {}] = [\n",
            symbol,
            self.bytes.len()
        ));

        for line in self.bytes.chunks(16) {
            source.push_str("   ");
            for byte in line {
                source.push_str(&format!(" 0x{:02x},", byte));
            }
            source.push('\n');
        }

        source.push_str("];\n");
        Ok(source)
    }
}

impl AsRef<[u8]> for ContractBlob {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for ContractBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractBlob")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Lowercase hex SHA-256 of arbitrary bytes, e.g. a blob read back from disk
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Strict and reserved keywords across editions up to 2024
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
    "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do",
    "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

fn is_identifier(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    symbol != "_"
        && !RUST_KEYWORDS.contains(&symbol)
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContractBlob {
        ContractBlob::from_built(b"DACBLOB\0rest".to_vec())
    }

    #[test]
    fn test_digest_is_stable_hex() {
        let blob = sample();
        let digest = blob.digest();

        assert_eq!(digest.len(), 64);
        assert_eq!(digest, sample().digest());
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_clone_shares_bytes() {
        let blob = sample();
        let clone = blob.clone();
        assert_eq!(blob.as_bytes().as_ptr(), clone.as_bytes().as_ptr());
        assert_eq!(blob, clone);
    }

    #[test]
    fn test_rust_static_rendering() {
        let source = sample().to_rust_static("CONTRACT_DESCRIPTOR").unwrap();

        assert!(source.contains("#[no_mangle]"));
        assert!(source.contains("pub static CONTRACT_DESCRIPTOR: [u8; 12] = ["));
        assert!(source.contains(" 0x44, 0x41, 0x43,"));
        assert!(source.trim_end().ends_with("];"));
    }

    #[test]
    fn test_rust_static_rejects_bad_symbols() {
        for bad in ["", "_", "1abc", "has space", "dash-name", "static", "fn", "Self", "async"] {
            assert!(matches!(
                sample().to_rust_static(bad),
                Err(BlobError::InvalidSymbol(_))
            ));
        }
    }

    #[test]
    fn test_rust_static_accepts_keyword_prefixed_names() {
        for good in ["static_data", "Static", "union", "fn_table"] {
            assert!(sample().to_rust_static(good).is_ok(), "{} should be accepted", good);
        }
    }

    #[test]
    fn test_write_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract.bin");

        sample().write_atomic(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"DACBLOB\0rest");

        // Overwrites an existing file in place
        ContractBlob::from_built(b"DACBLOB\0".to_vec())
            .write_atomic(&path)
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"DACBLOB\0");
    }
}
