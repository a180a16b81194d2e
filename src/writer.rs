// SPDX-License-Identifier: MIT
//! Contract blob writer: turns a schema into a finished blob

use crate::blob::ContractBlob;
use crate::config::{BuildConfig, ConfigError};
use crate::field_pool::FieldPool;
use crate::format::{
    Directory, FieldRecord, RecordLayout, CONTRACT_MAGIC, FIRST_REGION_START, HEADER_SIZE,
};
use crate::schema::{Schema, SchemaError};
use crate::string_pool::StringPool;
use crate::tables::{GlobalTable, TypeTable};

/// Errors that can occur while building a blob
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Blob too large: {region} does not fit 32-bit offsets")]
    TooLarge { region: &'static str },
}

/// Builds contract descriptor blobs
#[derive(Debug, Clone, Default)]
pub struct ContractWriter {
    config: BuildConfig,
}

impl ContractWriter {
    /// Create a writer with the default configuration for the host
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build a blob from `schema` in a single pass.
    ///
    /// Names are interned in a fixed order: the baseline, then per type its name
    /// followed by each field's name and declared type name, then per global its
    /// name and declared type name. Two builds of the same schema with the same
    /// configuration are byte-identical.
    pub fn build(&self, schema: &Schema) -> Result<ContractBlob, BuildError> {
        self.config.validate()?;
        schema.validate()?;
        if self.config.strict_type_refs {
            schema.check_type_references(&self.config.primitive_types)?;
        }

        let layout = self.config.layout;
        let field_stride = layout.field_record_size as u64;

        let mut names = StringPool::new();
        let mut fields = FieldPool::with_capacity(schema.field_count() + schema.types.len());
        let mut types = TypeTable::with_capacity(schema.types.len());
        let mut globals = GlobalTable::with_capacity(schema.globals.len());

        let baseline = intern(&mut names, &schema.baseline)?;

        for decl in &schema.types {
            let name = intern(&mut names, &decl.name)?;

            let mut run = Vec::with_capacity(decl.fields.len());
            for field in &decl.fields {
                let field_name = intern(&mut names, &field.name)?;
                let type_name = intern(&mut names, &field.type_name)?;
                run.push(FieldRecord {
                    name: field_name,
                    type_name,
                    offset: field.offset,
                });
            }

            let start = fields
                .push_run(run)
                .ok_or(BuildError::TooLarge { region: "field pool" })?;
            let fields_offset = to_u32(start as u64 * field_stride, "field pool")?;
            types.push(name, fields_offset, decl.size.resolve(self.config.pointer_size));
        }

        for global in &schema.globals {
            let name = intern(&mut names, &global.name)?;
            let type_name = intern(&mut names, &global.type_name)?;
            globals.push(name, type_name, global.value);
        }

        let bytes = assemble(baseline, &types, &fields, &globals, &names, layout)?;

        tracing::info!(
            baseline = %schema.baseline,
            types = types.len(),
            field_records = fields.len(),
            globals = globals.len(),
            names_bytes = names.len(),
            total_bytes = bytes.len(),
            "Contract blob built"
        );

        Ok(ContractBlob::from_built(bytes))
    }
}

fn intern(names: &mut StringPool, text: &str) -> Result<u32, BuildError> {
    names
        .intern(text)
        .ok_or(BuildError::TooLarge { region: "names pool" })
}

fn to_u32(value: u64, region: &'static str) -> Result<u32, BuildError> {
    u32::try_from(value).map_err(|_| BuildError::TooLarge { region })
}

/// Lay out magic, directory, baseline and the four regions back to back.
fn assemble(
    baseline: u32,
    types: &TypeTable,
    fields: &FieldPool,
    globals: &GlobalTable,
    names: &StringPool,
    layout: RecordLayout,
) -> Result<Vec<u8>, BuildError> {
    let type_stride = layout.type_record_size as usize;
    let field_stride = layout.field_record_size as usize;
    let global_stride = layout.global_record_size as usize;

    let types_len = (types.len() * type_stride) as u64;
    let fields_len = (fields.len() * field_stride) as u64;
    let globals_len = (globals.len() * global_stride) as u64;
    let names_len = names.len() as u64;

    let types_start = FIRST_REGION_START;
    let field_pool_start = to_u32(types_start as u64 + types_len, "types")?;
    let global_values_start = to_u32(field_pool_start as u64 + fields_len, "field pool")?;
    let names_start = to_u32(global_values_start as u64 + globals_len, "global values")?;
    to_u32(names_start as u64 + names_len, "names pool")?;

    let directory = Directory {
        types_start,
        field_pool_start,
        global_values_start,
        names_start,
        type_count: to_u32(types.len() as u64, "types")?,
        field_pool_count: to_u32(fields.len() as u64, "field pool")?,
        names_pool_count: to_u32(names_len, "names pool")?,
        type_record_size: layout.type_record_size,
        field_record_size: layout.field_record_size,
        global_record_size: layout.global_record_size,
        reserved: 0,
    };

    let total_size = HEADER_SIZE + (types_len + fields_len + globals_len + names_len) as usize;
    let mut buffer = Vec::with_capacity(total_size);

    buffer.extend_from_slice(CONTRACT_MAGIC);
    directory.write_to_buffer(&mut buffer);
    buffer.extend_from_slice(&baseline.to_ne_bytes());
    debug_assert_eq!(buffer.len(), HEADER_SIZE);

    types.write_to_buffer(&mut buffer, type_stride);
    tracing::debug!(count = types.len(), stride = type_stride, "Types region written");

    fields.write_to_buffer(&mut buffer, field_stride);
    tracing::debug!(count = fields.len(), stride = field_stride, "Field pool written");

    globals.write_to_buffer(&mut buffer, global_stride);
    tracing::debug!(count = globals.len(), stride = global_stride, "Global values written");

    buffer.extend_from_slice(names.as_bytes());
    tracing::debug!(bytes = names.len(), "Names pool written");

    debug_assert_eq!(buffer.len(), total_size);
    Ok(buffer)
}
