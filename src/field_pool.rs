// SPDX-License-Identifier: MIT
//! Field pool builder
//!
//! All field records share one array. Index 0 holds a reserved all-zero
//! record, then each type contributes a run of its fields followed by an
//! all-zero terminator.

use crate::format::{checked_offset, FieldRecord, Record};

#[derive(Debug, Clone)]
pub struct FieldPool {
    records: Vec<FieldRecord>,
}

impl FieldPool {
    /// Create a pool holding only the reserved record at index 0
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a pool with room for `capacity` records after the reserved one
    pub fn with_capacity(capacity: usize) -> Self {
        let mut records = Vec::with_capacity(capacity.saturating_add(1));
        records.push(FieldRecord::TERMINATOR);
        Self { records }
    }

    /// Append one run and its terminator; returns the index of the run's first record.
    ///
    /// A type without fields still gets a run consisting of just the terminator.
    /// Returns `None`, pushing nothing, when the start index does not fit in 32 bits.
    pub fn push_run<I>(&mut self, fields: I) -> Option<u32>
    where
        I: IntoIterator<Item = FieldRecord>,
    {
        let start = checked_offset(self.records.len())?;
        debug_assert!(start > 0, "field run overlaps the reserved record");

        for field in fields {
            debug_assert!(field.name != 0, "field name resolved to the reserved string");
            self.records.push(field);
        }
        self.records.push(FieldRecord::TERMINATOR);

        Some(start)
    }

    /// Number of records, including the reserved record and all terminators
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no run has been pushed yet
    pub fn is_empty(&self) -> bool {
        self.records.len() == 1
    }

    pub fn records(&self) -> &[FieldRecord] {
        &self.records
    }

    /// Serialize every record with the given stride
    pub fn write_to_buffer(&self, buffer: &mut Vec<u8>, stride: usize) {
        buffer.reserve(self.records.len() * stride);
        for record in &self.records {
            record.write_padded(buffer, stride);
        }
    }
}

impl Default for FieldPool {
    fn default() -> Self {
        Self::new()
    }
}
