// SPDX-License-Identifier: MIT
//! Contract blob reader
//!
//! A reader only exists once the magic and directory have been checked.
//! Every table is addressed through the directory's offsets and recorded
//! strides, never through this build's record sizes, so blobs written with
//! wider records remain readable.

use crate::descriptor::{ContractDescriptor, FieldDescriptor, GlobalDescriptor, TypeDescriptor};
use crate::format::{
    u32_at, Directory, FieldRecord, GlobalRecord, Record, Table, TypeRecord, CONTRACT_MAGIC,
    DIRECTORY_SIZE, HEADER_SIZE, MAGIC_SIZE,
};

/// Errors that can occur while reading a blob
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("Not a contract blob: magic signature mismatch")]
    NotAContractBlob,

    #[error("Unsupported record shape for {table}: recorded {recorded} bytes, at least {required} required")]
    UnsupportedRecordShape {
        table: Table,
        recorded: u8,
        required: usize,
    },

    #[error("Out of bounds: {what} at offset {offset}")]
    OutOfBounds { what: &'static str, offset: u64 },

    #[error("Invalid UTF-8 in names pool at offset {offset}")]
    InvalidString { offset: u32 },

    #[error("Type {index} points its field run at the reserved record")]
    ReservedFieldRun { index: u32 },
}

/// Counts gathered by [`ContractReader::verify`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractStats {
    pub types: u32,
    /// Field records across all runs, terminators excluded
    pub field_records: usize,
    pub globals: u32,
    pub names_bytes: u32,
}

/// Validated view over the bytes of a contract blob
#[derive(Debug, Clone, Copy)]
pub struct ContractReader<'a> {
    data: &'a [u8],
    directory: Directory,
    baseline: u32,
}

impl<'a> ContractReader<'a> {
    /// Check the magic and read the directory.
    ///
    /// Nothing past the magic is interpreted unless the magic matches. Record
    /// sizes are checked lazily per table, so a table with an unsupported shape
    /// does not prevent reading the others.
    pub fn parse(data: &'a [u8]) -> Result<Self, ReadError> {
        if data.len() < MAGIC_SIZE || &data[..MAGIC_SIZE] != CONTRACT_MAGIC {
            return Err(ReadError::NotAContractBlob);
        }

        let directory =
            Directory::from_bytes(&data[MAGIC_SIZE..]).ok_or(ReadError::OutOfBounds {
                what: "directory",
                offset: MAGIC_SIZE as u64,
            })?;

        if data.len() < HEADER_SIZE {
            return Err(ReadError::OutOfBounds {
                what: "baseline name",
                offset: (MAGIC_SIZE + DIRECTORY_SIZE) as u64,
            });
        }
        let baseline = u32_at(data, MAGIC_SIZE + DIRECTORY_SIZE);

        for &table in Table::all() {
            let recorded = directory.layout().size_of(table) as usize;
            if recorded > table.known_record_size() {
                tracing::warn!(
                    table = table.name(),
                    recorded,
                    known = table.known_record_size(),
                    "Blob records are wider than this reader knows; skipping trailing bytes"
                );
            }
        }

        tracing::debug!(
            types = directory.type_count,
            field_records = directory.field_pool_count,
            names_bytes = directory.names_pool_count,
            "Contract blob validated"
        );

        Ok(Self {
            data,
            directory,
            baseline,
        })
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Slice of `len` bytes starting at a directory-relative offset
    fn region(&self, start: u32, len: u64, what: &'static str) -> Result<&'a [u8], ReadError> {
        let begin = Directory::absolute(start);
        let end = begin
            .checked_add(len)
            .ok_or(ReadError::OutOfBounds { what, offset: begin })?;

        if end > self.data.len() as u64 {
            return Err(ReadError::OutOfBounds { what, offset: begin });
        }
        Ok(&self.data[begin as usize..end as usize])
    }

    /// Recorded stride of a table, if wide enough for this build's record shape
    pub fn stride(&self, table: Table) -> Result<usize, ReadError> {
        let recorded = self.directory.layout().size_of(table);
        let required = table.known_record_size();

        if (recorded as usize) < required {
            return Err(ReadError::UnsupportedRecordShape {
                table,
                recorded,
                required,
            });
        }
        Ok(recorded as usize)
    }

    pub fn names_pool(&self) -> Result<&'a [u8], ReadError> {
        self.region(
            self.directory.names_start,
            self.directory.names_pool_count as u64,
            "names pool",
        )
    }

    /// Resolve a names-pool offset to its string
    pub fn string_at(&self, offset: u32) -> Result<&'a str, ReadError> {
        let pool = self.names_pool()?;
        let start = offset as usize;

        if start >= pool.len() {
            return Err(ReadError::OutOfBounds {
                what: "string",
                offset: offset as u64,
            });
        }

        let tail = &pool[start..];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReadError::OutOfBounds {
                what: "unterminated string",
                offset: offset as u64,
            })?;

        std::str::from_utf8(&tail[..len]).map_err(|_| ReadError::InvalidString { offset })
    }

    pub fn baseline(&self) -> Result<&'a str, ReadError> {
        self.string_at(self.baseline)
    }

    pub fn type_count(&self) -> u32 {
        self.directory.type_count
    }

    fn table_region(&self, table: Table, count: u32) -> Result<(&'a [u8], usize), ReadError> {
        let stride = self.stride(table)?;
        let region = self.region(
            self.directory.region_start(table),
            count as u64 * stride as u64,
            table.name(),
        )?;
        Ok((region, stride))
    }

    fn record_at<R: Record>(&self, count: u32, index: u32) -> Result<R, ReadError> {
        if index >= count {
            return Err(ReadError::OutOfBounds {
                what: R::TABLE.name(),
                offset: index as u64,
            });
        }

        let (region, stride) = self.table_region(R::TABLE, count)?;
        let at = index as usize * stride;
        Ok(R::decode(&region[at..at + stride]))
    }

    pub fn type_at(&self, index: u32) -> Result<TypeRecord, ReadError> {
        self.record_at(self.directory.type_count, index)
    }

    /// All type records in blob order
    pub fn types(&self) -> Result<impl Iterator<Item = TypeRecord> + 'a, ReadError> {
        let (region, stride) = self.table_region(Table::Types, self.directory.type_count)?;
        Ok(region.chunks_exact(stride).map(TypeRecord::decode))
    }

    /// The field run of a type, scanned until its terminator
    pub fn fields(&self, ty: &TypeRecord) -> Result<FieldRun<'a>, ReadError> {
        let (region, stride) =
            self.table_region(Table::FieldPool, self.directory.field_pool_count)?;
        let position = ty.fields as usize;

        if position % stride != 0 || position >= region.len() {
            return Err(ReadError::OutOfBounds {
                what: "field run",
                offset: ty.fields as u64,
            });
        }

        Ok(FieldRun {
            region,
            stride,
            position,
            done: false,
        })
    }

    /// Number of globals, derived from the gap between the global and names regions
    pub fn global_count(&self) -> Result<u32, ReadError> {
        let stride = self.stride(Table::GlobalValues)?;
        let start = self.directory.global_values_start;
        let len = self
            .directory
            .names_start
            .checked_sub(start)
            .ok_or(ReadError::OutOfBounds {
                what: "global values",
                offset: start as u64,
            })? as usize;

        if len % stride != 0 {
            return Err(ReadError::OutOfBounds {
                what: "global values",
                offset: start as u64,
            });
        }
        Ok((len / stride) as u32)
    }

    pub fn global_at(&self, index: u32) -> Result<GlobalRecord, ReadError> {
        self.record_at(self.global_count()?, index)
    }

    /// All global records in blob order
    pub fn globals(&self) -> Result<impl Iterator<Item = GlobalRecord> + 'a, ReadError> {
        let (region, stride) = self.table_region(Table::GlobalValues, self.global_count()?)?;
        Ok(region.chunks_exact(stride).map(GlobalRecord::decode))
    }

    /// First type with the given name
    pub fn find_type(&self, name: &str) -> Result<Option<TypeRecord>, ReadError> {
        for ty in self.types()? {
            if self.string_at(ty.name)? == name {
                return Ok(Some(ty));
            }
        }
        Ok(None)
    }

    /// First global with the given name
    pub fn find_global(&self, name: &str) -> Result<Option<GlobalRecord>, ReadError> {
        for global in self.globals()? {
            if self.string_at(global.name)? == name {
                return Ok(Some(global));
            }
        }
        Ok(None)
    }

    /// Walk every table and field run and resolve every name.
    ///
    /// Stricter than [`decode`](Self::decode): a type whose run starts at the
    /// reserved record is rejected, since no producer emits one.
    pub fn verify(&self) -> Result<ContractStats, ReadError> {
        self.baseline()?;
        let mut stats = ContractStats {
            types: self.directory.type_count,
            names_bytes: self.directory.names_pool_count,
            ..ContractStats::default()
        };

        for (index, ty) in self.types()?.enumerate() {
            if ty.fields == 0 {
                return Err(ReadError::ReservedFieldRun {
                    index: index as u32,
                });
            }
            self.string_at(ty.name)?;
            for field in self.fields(&ty)? {
                let field = field?;
                self.string_at(field.name)?;
                self.string_at(field.type_name)?;
                stats.field_records += 1;
            }
        }

        for global in self.globals()? {
            self.string_at(global.name)?;
            self.string_at(global.type_name)?;
            stats.globals += 1;
        }

        Ok(stats)
    }

    /// Decode every table, resolving all names
    pub fn decode(&self) -> Result<ContractDescriptor, ReadError> {
        let mut types = Vec::with_capacity(self.directory.type_count as usize);
        for ty in self.types()? {
            let mut fields = Vec::new();
            for field in self.fields(&ty)? {
                let field = field?;
                fields.push(FieldDescriptor {
                    name: self.string_at(field.name)?.to_string(),
                    type_name: self.string_at(field.type_name)?.to_string(),
                    offset: field.offset,
                });
            }

            types.push(TypeDescriptor {
                name: self.string_at(ty.name)?.to_string(),
                size: (!ty.is_indeterminate()).then_some(ty.size),
                fields,
            });
        }

        let mut globals = Vec::new();
        for global in self.globals()? {
            globals.push(GlobalDescriptor {
                name: self.string_at(global.name)?.to_string(),
                type_name: self.string_at(global.type_name)?.to_string(),
                value: global.value,
            });
        }

        Ok(ContractDescriptor {
            baseline: self.baseline()?.to_string(),
            types,
            globals,
        })
    }
}

/// Iterator over one type's field records
///
/// Ends at the all-zero terminator. Reaching the end of the field pool first
/// yields a single `OutOfBounds` error.
#[derive(Debug, Clone)]
pub struct FieldRun<'a> {
    region: &'a [u8],
    stride: usize,
    position: usize,
    done: bool,
}

impl Iterator for FieldRun<'_> {
    type Item = Result<FieldRecord, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.position + self.stride > self.region.len() {
            self.done = true;
            return Some(Err(ReadError::OutOfBounds {
                what: "unterminated field run",
                offset: self.position as u64,
            }));
        }

        let record = FieldRecord::decode(&self.region[self.position..]);
        self.position += self.stride;

        if record.is_terminator() {
            self.done = true;
            return None;
        }
        Some(Ok(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::schema::{GlobalDecl, Schema, TypeDecl, TypeSize};
    use crate::writer::ContractWriter;

    fn build() -> Vec<u8> {
        let schema = Schema::new("unit")
            .with_type(
                TypeDecl::new("Node", TypeSize::Fixed(16))
                    .field("Value", "uint64", 0)
                    .field("Next", "pointer", 8),
            )
            .with_type(TypeDecl::new("Empty", TypeSize::Indeterminate))
            .with_global(GlobalDecl::new("Root", "pointer", 0x4000));

        ContractWriter::with_config(BuildConfig::default().with_pointer_size(8))
            .build(&schema)
            .unwrap()
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn test_parse_and_resolve() {
        let data = build();
        let reader = ContractReader::parse(&data).unwrap();

        assert_eq!(reader.baseline().unwrap(), "unit");
        assert_eq!(reader.type_count(), 2);
        assert_eq!(reader.global_count().unwrap(), 1);

        let node = reader.type_at(0).unwrap();
        assert_eq!(reader.string_at(node.name).unwrap(), "Node");
        assert_eq!(node.size, 16);

        let fields: Vec<_> = reader
            .fields(&node)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(reader.string_at(fields[1].name).unwrap(), "Next");
        assert_eq!(fields[1].offset, 8);

        let empty = reader.type_at(1).unwrap();
        assert!(empty.is_indeterminate());
        assert_eq!(reader.fields(&empty).unwrap().count(), 0);
    }

    #[test]
    fn test_string_at_zero_is_empty() {
        let data = build();
        let reader = ContractReader::parse(&data).unwrap();
        assert_eq!(reader.string_at(0).unwrap(), "");
    }

    #[test]
    fn test_string_past_pool() {
        let data = build();
        let reader = ContractReader::parse(&data).unwrap();
        let len = reader.directory().names_pool_count;

        assert!(matches!(
            reader.string_at(len),
            Err(ReadError::OutOfBounds { what: "string", .. })
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let data = build();
        let reader = ContractReader::parse(&data).unwrap();

        assert!(matches!(
            reader.type_at(2),
            Err(ReadError::OutOfBounds { .. })
        ));
        assert!(matches!(
            reader.global_at(1),
            Err(ReadError::OutOfBounds { .. })
        ));
        assert_eq!(reader.global_at(0).unwrap().value, 0x4000);
    }

    #[test]
    fn test_find_by_name() {
        let data = build();
        let reader = ContractReader::parse(&data).unwrap();

        let empty = reader.find_type("Empty").unwrap().unwrap();
        assert_eq!(reader.string_at(empty.name).unwrap(), "Empty");
        assert!(reader.find_type("Missing").unwrap().is_none());
        assert_eq!(reader.find_global("Root").unwrap().unwrap().value, 0x4000);
    }

    #[test]
    fn test_magic_mismatch() {
        let mut data = build();
        data[0] = b'X';
        assert_eq!(
            ContractReader::parse(&data).unwrap_err(),
            ReadError::NotAContractBlob
        );
        assert_eq!(
            ContractReader::parse(b"DAC").unwrap_err(),
            ReadError::NotAContractBlob
        );
    }

    #[test]
    fn test_truncated_header() {
        let data = build();
        assert!(matches!(
            ContractReader::parse(&data[..MAGIC_SIZE + 4]),
            Err(ReadError::OutOfBounds {
                what: "directory",
                ..
            })
        ));
        assert!(matches!(
            ContractReader::parse(&data[..HEADER_SIZE - 1]),
            Err(ReadError::OutOfBounds {
                what: "baseline name",
                ..
            })
        ));
    }

    #[test]
    fn test_misaligned_field_run() {
        let data = build();
        let reader = ContractReader::parse(&data).unwrap();
        let mut node = reader.type_at(0).unwrap();
        node.fields += 1;

        assert!(matches!(
            reader.fields(&node),
            Err(ReadError::OutOfBounds {
                what: "field run",
                ..
            })
        ));
    }

    #[test]
    fn test_decode() {
        let data = build();
        let descriptor = ContractReader::parse(&data).unwrap().decode().unwrap();

        assert_eq!(descriptor.baseline, "unit");
        assert_eq!(descriptor.types[0].size, Some(16));
        assert_eq!(descriptor.types[1].size, None);
        assert_eq!(descriptor.globals[0].name, "Root");
    }

    #[test]
    fn test_verify_counts() {
        let data = build();
        let stats = ContractReader::parse(&data).unwrap().verify().unwrap();

        assert_eq!(stats.types, 2);
        assert_eq!(stats.field_records, 2);
        assert_eq!(stats.globals, 1);
        assert_eq!(
            stats.names_bytes,
            ContractReader::parse(&data)
                .unwrap()
                .names_pool()
                .unwrap()
                .len() as u32
        );
    }

    #[test]
    fn test_verify_rejects_reserved_field_run() {
        let mut data = build();
        // Fields of the second type record
        let at = HEADER_SIZE + TypeRecord::SIZE + 4;
        data[at..at + 4].copy_from_slice(&0u32.to_ne_bytes());

        let reader = ContractReader::parse(&data).unwrap();
        assert_eq!(
            reader.verify().unwrap_err(),
            ReadError::ReservedFieldRun { index: 1 }
        );
        // decode stays lenient: the reserved record reads as an empty run
        assert!(reader.decode().unwrap().types[1].fields.is_empty());
    }
}
