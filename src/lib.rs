// SPDX-License-Identifier: MIT
//! # Contract Descriptor Blobs
//!
//! A compact, self-describing binary format that lets out-of-process
//! diagnostic tools (debuggers, dump analyzers) discover the layout of a
//! runtime's internal data structures: type sizes, field offsets and global
//! values. The blob is built once, embedded in the runtime image, and parsed
//! by a remote reader using nothing but the blob's own header.
//!
//! ## Key Features
//!
//! - **Self-describing**: the directory records where each region lives and
//!   how wide its records are
//! - **Forward compatible**: readers stride by the recorded record sizes, so a
//!   reader built for narrower records still reads blobs with wider ones
//! - **Stable string references**: every name is a byte offset into one
//!   NUL-delimited pool
//! - **Reproducible**: the same schema always produces the same bytes
//!
//! ## Format Specification
//!
//! ```text
//! Contract Descriptor Blob (native byte order, packed)
//! ====================================================
//!
//! Magic: "DACBLOB\0" (8 bytes)
//!
//! Directory (32 bytes, offsets relative to the directory start):
//! - TypesStart, FieldPoolStart, GlobalValuesStart, NamesStart (u32 each)
//! - TypeCount, FieldPoolCount, NamesPoolCount (u32 each)
//! - TypeRecordSize, FieldRecordSize, GlobalRecordSize, Reserved (u8 each)
//!
//! BaselineName: u32 names-pool offset
//!
//! Types[TypeCount]:           {Name: u32, Fields: u32, Size: u16}
//! FieldPool[FieldPoolCount]:  {Name: u32, TypeName: u32, FieldOffset: u16}
//! GlobalValues[derived]:      {Name: u32, TypeName: u32, Value: u64}
//! NamesPool[NamesPoolCount]:  NUL-terminated strings, byte 0 reserved
//! ```
//!
//! A type's `Fields` is a byte offset into the field pool. Its run of field
//! records ends with an all-zero terminator; field pool index 0 is a reserved
//! all-zero record so no real run starts at offset 0. A type `Size` of 0 means
//! the size is indeterminate.
//!
//! ## Usage
//!
//! ```rust
//! use contract_blob::{ContractReader, ContractWriter, GlobalDecl, Schema, TypeDecl, TypeSize};
//!
//! let schema = Schema::new("net9.0/coreclr/linux-x64")
//!     .with_type(
//!         TypeDecl::new("ManagedThread", TypeSize::Indeterminate)
//!             .field("GCHandle", "GCHandle", 0)
//!             .field("Next", "pointer", 8),
//!     )
//!     .with_type(TypeDecl::new("GCHandle", TypeSize::Pointer))
//!     .with_global(GlobalDecl::new("ManagedThreadStore", "pointer", 0x7ff6_0000_1000));
//!
//! let blob = ContractWriter::new().build(&schema).unwrap();
//!
//! let reader = ContractReader::parse(blob.as_bytes()).unwrap();
//! let descriptor = reader.decode().unwrap();
//! assert_eq!(descriptor.find_type("ManagedThread").unwrap().fields.len(), 2);
//! ```

pub mod blob;
pub mod config;
pub mod descriptor;
pub mod field_pool;
pub mod format;
pub mod reader;
pub mod schema;
pub mod string_pool;
pub mod tables;
pub mod writer;

// Re-export main types
pub use blob::{digest_hex, BlobError, ContractBlob};
pub use config::{BuildConfig, ConfigError};
pub use descriptor::{ContractDescriptor, FieldDescriptor, GlobalDescriptor, TypeDescriptor};
pub use format::{Directory, RecordLayout, Table, CONTRACT_MAGIC, HEADER_SIZE};
pub use reader::{ContractReader, ContractStats, FieldRun, ReadError};
pub use schema::{FieldDecl, GlobalDecl, Schema, SchemaError, TypeDecl, TypeSize};
pub use writer::{BuildError, ContractWriter};
