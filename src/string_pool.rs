// SPDX-License-Identifier: MIT
//! Names pool builder
//!
//! Every name in a blob lives in one contiguous region of NUL-terminated
//! strings. A string's identity is the byte offset of its first character.
//! Byte 0 is reserved so that offset 0 can mean "no string".

use crate::format::checked_offset;

/// Append-only pool of NUL-terminated strings
#[derive(Debug, Clone)]
pub struct StringPool {
    bytes: Vec<u8>,
    strings: usize,
}

impl StringPool {
    /// Create a pool holding only the reserved NUL at offset 0
    pub fn new() -> Self {
        Self {
            bytes: vec![0],
            strings: 0,
        }
    }

    /// Create a pool with room for `capacity` bytes of string data
    pub fn with_capacity(capacity: usize) -> Self {
        let mut bytes = Vec::with_capacity(capacity.saturating_add(1));
        bytes.push(0);
        Self { bytes, strings: 0 }
    }

    /// Append `text` and its terminator, returning the offset of its first byte.
    ///
    /// No deduplication: interning the same text twice yields two offsets.
    /// Offsets already handed out stay valid as the pool grows. Returns `None`,
    /// leaving the pool unchanged, once the next offset no longer fits in 32 bits.
    pub fn intern(&mut self, text: &str) -> Option<u32> {
        let offset = checked_offset(self.bytes.len())?;
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        self.strings += 1;
        Some(offset)
    }

    /// Byte length of the pool, including the reserved byte
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing besides the reserved byte has been interned
    pub fn is_empty(&self) -> bool {
        self.strings == 0
    }

    /// Number of strings interned so far
    pub fn string_count(&self) -> usize {
        self.strings
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}
