// SPDX-License-Identifier: MIT
//! Type and global table builders

use crate::format::{GlobalRecord, Record, TypeRecord};

/// One record per declared type, in schema order
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    records: Vec<TypeRecord>,
}

impl TypeTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    /// `fields` is the run's byte offset relative to the field pool
    pub fn push(&mut self, name: u32, fields: u32, size: u16) {
        debug_assert!(fields != 0, "type field run points at the reserved record");
        self.records.push(TypeRecord { name, fields, size });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TypeRecord] {
        &self.records
    }

    pub fn write_to_buffer(&self, buffer: &mut Vec<u8>, stride: usize) {
        buffer.reserve(self.records.len() * stride);
        for record in &self.records {
            record.write_padded(buffer, stride);
        }
    }
}

/// One record per declared global, in schema order
#[derive(Debug, Clone, Default)]
pub struct GlobalTable {
    records: Vec<GlobalRecord>,
}

impl GlobalTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    /// The value is copied verbatim; this layer does not interpret it
    pub fn push(&mut self, name: u32, type_name: u32, value: u64) {
        self.records.push(GlobalRecord {
            name,
            type_name,
            value,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[GlobalRecord] {
        &self.records
    }

    pub fn write_to_buffer(&self, buffer: &mut Vec<u8>, stride: usize) {
        buffer.reserve(self.records.len() * stride);
        for record in &self.records {
            record.write_padded(buffer, stride);
        }
    }
}
