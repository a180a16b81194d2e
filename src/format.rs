// SPDX-License-Identifier: MIT
//! Contract descriptor blob format
//!
//! Defines the byte layout shared by the writer and the reader. Integers are
//! stored in native byte order and records are packed with no padding.

/// Magic signature: ASCII "DACBLOB" followed by one NUL
pub const CONTRACT_MAGIC: &[u8; 8] = b"DACBLOB\0";

/// Size of the magic signature in bytes
pub const MAGIC_SIZE: usize = 8;

/// Size of the directory in bytes
pub const DIRECTORY_SIZE: usize = 32;

/// Size of the baseline name offset that follows the directory
pub const BASELINE_SIZE: usize = 4;

/// Magic + directory + baseline offset
pub const HEADER_SIZE: usize = MAGIC_SIZE + DIRECTORY_SIZE + BASELINE_SIZE;

/// Offset of the first table relative to the start of the directory
pub const FIRST_REGION_START: u32 = (DIRECTORY_SIZE + BASELINE_SIZE) as u32;

#[inline]
fn u16_at(bytes: &[u8], at: usize) -> u16 {
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&bytes[at..at + 2]);
    u16::from_ne_bytes(buf)
}

#[inline]
pub(crate) fn u32_at(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_ne_bytes(buf)
}

/// An index or byte length as a 32-bit blob offset, if it fits
#[inline]
pub(crate) fn checked_offset(value: usize) -> Option<u32> {
    u32::try_from(value).ok()
}

#[inline]
fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_ne_bytes(buf)
}

/// Fixed-size tables addressed through the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Types,
    FieldPool,
    GlobalValues,
}

impl Table {
    /// Get all tables in layout order
    pub fn all() -> &'static [Table] {
        &[Table::Types, Table::FieldPool, Table::GlobalValues]
    }

    /// Get the name of the table
    pub fn name(&self) -> &'static str {
        match self {
            Table::Types => "types",
            Table::FieldPool => "field pool",
            Table::GlobalValues => "global values",
        }
    }

    /// Number of bytes of a record this build knows how to interpret
    pub fn known_record_size(&self) -> usize {
        match self {
            Table::Types => TypeRecord::SIZE,
            Table::FieldPool => FieldRecord::SIZE,
            Table::GlobalValues => GlobalRecord::SIZE,
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixed-shape record stored in one of the directory tables.
///
/// `SIZE` is the shape this build writes and reads. Blobs produced by other
/// builds may record a wider stride; readers decode the first `SIZE` bytes and
/// skip the rest.
pub trait Record: Sized + Copy {
    const SIZE: usize;
    const TABLE: Table;

    /// Append exactly `SIZE` bytes
    fn encode(&self, buffer: &mut Vec<u8>);

    /// Decode from at least `SIZE` bytes
    fn decode(bytes: &[u8]) -> Self;

    /// Append the record followed by zero bytes up to `stride`
    fn write_padded(&self, buffer: &mut Vec<u8>, stride: usize) {
        let start = buffer.len();
        self.encode(buffer);
        debug_assert_eq!(buffer.len() - start, Self::SIZE);
        buffer.resize(start + stride.max(Self::SIZE), 0);
    }
}

/// Type record: {Name: u32, Fields: u32, Size: u16}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeRecord {
    /// Offset of the type name in the names pool
    pub name: u32,
    /// Byte offset of the first field record, relative to the field pool
    pub fields: u32,
    /// Size in bytes, 0 when indeterminate
    pub size: u16,
}

impl TypeRecord {
    #[inline]
    pub fn is_indeterminate(&self) -> bool {
        self.size == 0
    }
}

impl Record for TypeRecord {
    const SIZE: usize = 10;
    const TABLE: Table = Table::Types;

    fn encode(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.name.to_ne_bytes());
        buffer.extend_from_slice(&self.fields.to_ne_bytes());
        buffer.extend_from_slice(&self.size.to_ne_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            name: u32_at(bytes, 0),
            fields: u32_at(bytes, 4),
            size: u16_at(bytes, 8),
        }
    }
}

/// Field record: {Name: u32, TypeName: u32, FieldOffset: u16}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldRecord {
    pub name: u32,
    pub type_name: u32,
    /// Byte offset of the field within its containing type
    pub offset: u16,
}

impl FieldRecord {
    /// All-zero record closing every field run
    pub const TERMINATOR: FieldRecord = FieldRecord {
        name: 0,
        type_name: 0,
        offset: 0,
    };

    #[inline]
    pub fn is_terminator(&self) -> bool {
        *self == Self::TERMINATOR
    }
}

impl Record for FieldRecord {
    const SIZE: usize = 10;
    const TABLE: Table = Table::FieldPool;

    fn encode(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.name.to_ne_bytes());
        buffer.extend_from_slice(&self.type_name.to_ne_bytes());
        buffer.extend_from_slice(&self.offset.to_ne_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            name: u32_at(bytes, 0),
            type_name: u32_at(bytes, 4),
            offset: u16_at(bytes, 8),
        }
    }
}

/// Global record: {Name: u32, TypeName: u32, Value: u64}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlobalRecord {
    pub name: u32,
    pub type_name: u32,
    /// Literal value; its meaning is carried by the declared type name
    pub value: u64,
}

impl Record for GlobalRecord {
    const SIZE: usize = 16;
    const TABLE: Table = Table::GlobalValues;

    fn encode(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.name.to_ne_bytes());
        buffer.extend_from_slice(&self.type_name.to_ne_bytes());
        buffer.extend_from_slice(&self.value.to_ne_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            name: u32_at(bytes, 0),
            type_name: u32_at(bytes, 4),
            value: u64_at(bytes, 8),
        }
    }
}

/// Per-element sizes recorded in the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub type_record_size: u8,
    pub field_record_size: u8,
    pub global_record_size: u8,
}

impl RecordLayout {
    /// Natural packed sizes of this build's record shapes
    pub const fn natural() -> Self {
        Self {
            type_record_size: TypeRecord::SIZE as u8,
            field_record_size: FieldRecord::SIZE as u8,
            global_record_size: GlobalRecord::SIZE as u8,
        }
    }

    #[inline]
    pub fn size_of(&self, table: Table) -> u8 {
        match table {
            Table::Types => self.type_record_size,
            Table::FieldPool => self.field_record_size,
            Table::GlobalValues => self.global_record_size,
        }
    }

    /// First table whose size cannot hold this build's record shape
    pub fn undersized(&self) -> Option<(Table, u8)> {
        Table::all()
            .iter()
            .map(|&table| (table, self.size_of(table)))
            .find(|&(table, size)| (size as usize) < table.known_record_size())
    }
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self::natural()
    }
}

/// Directory (32 bytes). Region starts are relative to the directory itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Directory {
    pub types_start: u32,
    pub field_pool_start: u32,
    pub global_values_start: u32,
    pub names_start: u32,

    pub type_count: u32,
    pub field_pool_count: u32,
    /// Byte length of the names pool
    pub names_pool_count: u32,

    pub type_record_size: u8,
    pub field_record_size: u8,
    pub global_record_size: u8,
    pub reserved: u8,
}

impl Directory {
    /// Parse a directory from the bytes immediately following the magic
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < DIRECTORY_SIZE {
            return None;
        }

        Some(Self {
            types_start: u32_at(bytes, 0),
            field_pool_start: u32_at(bytes, 4),
            global_values_start: u32_at(bytes, 8),
            names_start: u32_at(bytes, 12),
            type_count: u32_at(bytes, 16),
            field_pool_count: u32_at(bytes, 20),
            names_pool_count: u32_at(bytes, 24),
            type_record_size: bytes[28],
            field_record_size: bytes[29],
            global_record_size: bytes[30],
            reserved: bytes[31],
        })
    }

    /// Write the directory to the end of `buffer`
    #[inline]
    pub fn write_to_buffer(&self, buffer: &mut Vec<u8>) {
        buffer.reserve(DIRECTORY_SIZE);

        buffer.extend_from_slice(&self.types_start.to_ne_bytes());
        buffer.extend_from_slice(&self.field_pool_start.to_ne_bytes());
        buffer.extend_from_slice(&self.global_values_start.to_ne_bytes());
        buffer.extend_from_slice(&self.names_start.to_ne_bytes());
        buffer.extend_from_slice(&self.type_count.to_ne_bytes());
        buffer.extend_from_slice(&self.field_pool_count.to_ne_bytes());
        buffer.extend_from_slice(&self.names_pool_count.to_ne_bytes());
        buffer.push(self.type_record_size);
        buffer.push(self.field_record_size);
        buffer.push(self.global_record_size);
        buffer.push(self.reserved);
    }

    pub fn to_bytes(&self) -> [u8; DIRECTORY_SIZE] {
        let mut buffer = Vec::with_capacity(DIRECTORY_SIZE);
        self.write_to_buffer(&mut buffer);

        let mut bytes = [0u8; DIRECTORY_SIZE];
        bytes.copy_from_slice(&buffer);
        bytes
    }

    /// Recorded per-element sizes
    pub fn layout(&self) -> RecordLayout {
        RecordLayout {
            type_record_size: self.type_record_size,
            field_record_size: self.field_record_size,
            global_record_size: self.global_record_size,
        }
    }

    /// Start of a table relative to the directory
    #[inline]
    pub fn region_start(&self, table: Table) -> u32 {
        match table {
            Table::Types => self.types_start,
            Table::FieldPool => self.field_pool_start,
            Table::GlobalValues => self.global_values_start,
        }
    }

    /// Absolute offset from the start of the blob for a directory-relative offset
    #[inline]
    pub fn absolute(relative: u32) -> u64 {
        MAGIC_SIZE as u64 + relative as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_offset_boundary() {
        assert_eq!(checked_offset(0), Some(0));
        assert_eq!(checked_offset(u32::MAX as usize), Some(u32::MAX));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(checked_offset(u32::MAX as usize + 1), None);
    }

    #[test]
    fn test_magic_is_dacblob() {
        assert_eq!(CONTRACT_MAGIC, b"DACBLOB\0");
        assert_eq!(CONTRACT_MAGIC.len(), MAGIC_SIZE);
    }

    #[test]
    fn test_header_constants() {
        assert_eq!(HEADER_SIZE, 44);
        assert_eq!(FIRST_REGION_START, 36);
    }

    #[test]
    fn test_directory_layout_is_byte_exact() {
        let directory = Directory {
            types_start: 1,
            field_pool_start: 2,
            global_values_start: 3,
            names_start: 4,
            type_count: 5,
            field_pool_count: 6,
            names_pool_count: 7,
            type_record_size: 10,
            field_record_size: 11,
            global_record_size: 16,
            reserved: 0,
        };

        let bytes = directory.to_bytes();
        assert_eq!(&bytes[0..4], &1u32.to_ne_bytes());
        assert_eq!(&bytes[24..28], &7u32.to_ne_bytes());
        assert_eq!(bytes[28], 10);
        assert_eq!(bytes[29], 11);
        assert_eq!(bytes[30], 16);
        assert_eq!(bytes[31], 0);

        assert_eq!(Directory::from_bytes(&bytes), Some(directory));
    }

    #[test]
    fn test_directory_from_short_slice() {
        assert!(Directory::from_bytes(&[0u8; DIRECTORY_SIZE - 1]).is_none());
    }

    #[test]
    fn test_record_sizes() {
        let mut buffer = Vec::new();
        TypeRecord::default().encode(&mut buffer);
        assert_eq!(buffer.len(), 10);

        buffer.clear();
        FieldRecord::TERMINATOR.encode(&mut buffer);
        assert_eq!(buffer.len(), 10);
        assert!(buffer.iter().all(|&b| b == 0));

        buffer.clear();
        GlobalRecord::default().encode(&mut buffer);
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn test_write_padded_zero_fills() {
        let record = GlobalRecord {
            name: 1,
            type_name: 2,
            value: u64::MAX,
        };
        let mut buffer = Vec::new();
        record.write_padded(&mut buffer, 24);

        assert_eq!(buffer.len(), 24);
        assert!(buffer[16..].iter().all(|&b| b == 0));
        assert_eq!(GlobalRecord::decode(&buffer), record);
    }

    #[test]
    fn test_type_record_indeterminate() {
        let record = TypeRecord {
            name: 1,
            fields: 10,
            size: 0,
        };
        assert!(record.is_indeterminate());
        assert!(!TypeRecord { size: 8, ..record }.is_indeterminate());
    }

    #[test]
    fn test_layout_undersized() {
        assert!(RecordLayout::natural().undersized().is_none());

        let layout = RecordLayout {
            field_record_size: 6,
            ..RecordLayout::natural()
        };
        assert_eq!(layout.undersized(), Some((Table::FieldPool, 6)));
    }

    #[test]
    fn test_table_names() {
        assert_eq!(Table::Types.name(), "types");
        assert_eq!(Table::FieldPool.name(), "field pool");
        assert_eq!(Table::GlobalValues.name(), "global values");
        assert_eq!(Table::all().len(), 3);
    }
}
