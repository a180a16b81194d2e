// SPDX-License-Identifier: MIT
//! Schema input: the ordered list of types and globals a blob describes

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Errors in a schema, detected before any byte of a blob is emitted
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Duplicate type: {0}")]
    DuplicateType(String),

    #[error("Duplicate field '{field}' in type '{type_name}'")]
    DuplicateField { type_name: String, field: String },

    #[error("Duplicate global: {0}")]
    DuplicateGlobal(String),

    #[error("Invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("Unknown type '{type_name}' referenced by {referenced_by}")]
    UnknownType {
        type_name: String,
        referenced_by: String,
    },

    #[error("Type '{0}' declares a fixed size of 0; use indeterminate instead")]
    ZeroSize(String),

    #[error("Invalid global value: {0:?}")]
    InvalidValue(String),

    #[error("Failed to parse TOML schema: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Declared size of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "SizeRepr", into = "SizeRepr")]
pub enum TypeSize {
    /// Not statically known at this layer (recorded as 0)
    #[default]
    Indeterminate,
    /// Pointer width of the target
    Pointer,
    /// Fixed size in bytes
    Fixed(u16),
}

impl TypeSize {
    /// Size written into the type record
    pub fn resolve(&self, pointer_size: u8) -> u16 {
        match self {
            TypeSize::Indeterminate => 0,
            TypeSize::Pointer => pointer_size as u16,
            TypeSize::Fixed(bytes) => *bytes,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Bytes(u16),
    Keyword(SizeKeyword),
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SizeKeyword {
    Pointer,
    Indeterminate,
}

impl From<SizeRepr> for TypeSize {
    fn from(repr: SizeRepr) -> Self {
        match repr {
            SizeRepr::Bytes(0) | SizeRepr::Keyword(SizeKeyword::Indeterminate) => {
                TypeSize::Indeterminate
            }
            SizeRepr::Bytes(bytes) => TypeSize::Fixed(bytes),
            SizeRepr::Keyword(SizeKeyword::Pointer) => TypeSize::Pointer,
        }
    }
}

impl From<TypeSize> for SizeRepr {
    fn from(size: TypeSize) -> Self {
        match size {
            TypeSize::Indeterminate => SizeRepr::Keyword(SizeKeyword::Indeterminate),
            TypeSize::Pointer => SizeRepr::Keyword(SizeKeyword::Pointer),
            TypeSize::Fixed(bytes) => SizeRepr::Bytes(bytes),
        }
    }
}

/// A field of a declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Byte offset within the containing type
    pub offset: u16,
}

/// A type declaration with its ordered field list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub size: TypeSize,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, size: TypeSize) -> Self {
        Self {
            name: name.into(),
            size,
            fields: Vec::new(),
        }
    }

    /// Append a field (declaration order is preserved in the blob)
    pub fn field(mut self, name: impl Into<String>, type_name: impl Into<String>, offset: u16) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            type_name: type_name.into(),
            offset,
        });
        self
    }
}

/// A named global constant or address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(deserialize_with = "deserialize_value")]
    pub value: u64,
}

impl GlobalDecl {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ValueRepr {
    Int(u64),
    Bool(bool),
    Text(String),
}

fn deserialize_value<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match ValueRepr::deserialize(deserializer)? {
        ValueRepr::Int(value) => Ok(value),
        ValueRepr::Bool(flag) => Ok(flag as u64),
        ValueRepr::Text(text) => parse_value(&text).map_err(serde::de::Error::custom),
    }
}

/// Parse a global literal: decimal, or hexadecimal with a `0x` prefix.
/// Underscores are accepted as digit separators.
pub fn parse_value(text: &str) -> Result<u64, SchemaError> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '_').collect();
    let parsed = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse::<u64>(),
    };
    parsed.map_err(|_| SchemaError::InvalidValue(text.to_string()))
}

/// The ordered input a blob is built from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Identifies the build/target the blob describes
    #[serde(default)]
    pub baseline: String,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub globals: Vec<GlobalDecl>,
}

impl Schema {
    pub fn new(baseline: impl Into<String>) -> Self {
        Self {
            baseline: baseline.into(),
            types: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.push(decl);
        self
    }

    pub fn with_global(mut self, decl: GlobalDecl) -> Self {
        self.globals.push(decl);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SchemaError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a schema file; `.json` is parsed as JSON, anything else as TOML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        }
    }

    pub fn field_count(&self) -> usize {
        self.types.iter().map(|t| t.fields.len()).sum()
    }

    /// Reject duplicate names and names that cannot live in the names pool
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.baseline.contains('\0') {
            return Err(SchemaError::InvalidName {
                kind: "baseline",
                name: self.baseline.clone(),
                reason: "contains NUL",
            });
        }

        let mut type_names = HashSet::with_capacity(self.types.len());
        for decl in &self.types {
            check_name("type", &decl.name)?;
            if !type_names.insert(decl.name.as_str()) {
                return Err(SchemaError::DuplicateType(decl.name.clone()));
            }
            // 0 is the indeterminate marker on the wire
            if decl.size == TypeSize::Fixed(0) {
                return Err(SchemaError::ZeroSize(decl.name.clone()));
            }

            let mut field_names = HashSet::with_capacity(decl.fields.len());
            for field in &decl.fields {
                check_name("field", &field.name)?;
                check_name("field type", &field.type_name)?;
                if !field_names.insert(field.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        type_name: decl.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        let mut global_names = HashSet::with_capacity(self.globals.len());
        for global in &self.globals {
            check_name("global", &global.name)?;
            check_name("global type", &global.type_name)?;
            if !global_names.insert(global.name.as_str()) {
                return Err(SchemaError::DuplicateGlobal(global.name.clone()));
            }
        }

        Ok(())
    }

    /// Require every declared type name to be a declared type or a primitive
    pub fn check_type_references(&self, primitives: &[String]) -> Result<(), SchemaError> {
        let known: HashSet<&str> = self
            .types
            .iter()
            .map(|t| t.name.as_str())
            .chain(primitives.iter().map(String::as_str))
            .collect();

        for decl in &self.types {
            for field in &decl.fields {
                if !known.contains(field.type_name.as_str()) {
                    return Err(SchemaError::UnknownType {
                        type_name: field.type_name.clone(),
                        referenced_by: format!("field {}.{}", decl.name, field.name),
                    });
                }
            }
        }

        for global in &self.globals {
            if !known.contains(global.type_name.as_str()) {
                return Err(SchemaError::UnknownType {
                    type_name: global.type_name.clone(),
                    referenced_by: format!("global {}", global.name),
                });
            }
        }

        Ok(())
    }
}

fn check_name(kind: &'static str, name: &str) -> Result<(), SchemaError> {
    let reason = if name.is_empty() {
        "empty"
    } else if name.contains('\0') {
        "contains NUL"
    } else {
        return Ok(());
    };

    Err(SchemaError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    })
}
