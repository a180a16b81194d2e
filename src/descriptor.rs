// SPDX-License-Identifier: MIT
//! Owned, decoded view of a contract blob

use crate::schema::{FieldDecl, GlobalDecl, Schema, TypeDecl, TypeSize};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub offset: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    /// `None` when the size is indeterminate
    pub size: Option<u16>,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn is_indeterminate(&self) -> bool {
        self.size.is_none()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: u64,
}

/// Everything a blob describes, with names resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    pub baseline: String,
    pub types: Vec<TypeDescriptor>,
    pub globals: Vec<GlobalDescriptor>,
}

impl ContractDescriptor {
    /// First type with the given name
    pub fn find_type(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.iter().find(|t| t.name == name)
    }

    /// First global with the given name
    pub fn find_global(&self, name: &str) -> Option<&GlobalDescriptor> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Convert back into a schema; pointer-sized types come back as fixed sizes.
    pub fn to_schema(&self) -> Schema {
        Schema {
            baseline: self.baseline.clone(),
            types: self
                .types
                .iter()
                .map(|t| TypeDecl {
                    name: t.name.clone(),
                    size: t.size.map_or(TypeSize::Indeterminate, TypeSize::Fixed),
                    fields: t
                        .fields
                        .iter()
                        .map(|f| FieldDecl {
                            name: f.name.clone(),
                            type_name: f.type_name.clone(),
                            offset: f.offset,
                        })
                        .collect(),
                })
                .collect(),
            globals: self
                .globals
                .iter()
                .map(|g| GlobalDecl::new(g.name.clone(), g.type_name.clone(), g.value))
                .collect(),
        }
    }
}

impl fmt::Display for ContractDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "baseline: {}", self.baseline)?;
        writeln!(f, "types ({}):", self.types.len())?;
        for ty in &self.types {
            match ty.size {
                Some(size) => writeln!(f, "  {} (size {})", ty.name, size)?,
                None => writeln!(f, "  {} (size indeterminate)", ty.name)?,
            }
            for field in &ty.fields {
                writeln!(
                    f,
                    "    +0x{:04x} {}: {}",
                    field.offset, field.name, field.type_name
                )?;
            }
        }
        writeln!(f, "globals ({}):", self.globals.len())?;
        for global in &self.globals {
            writeln!(
                f,
                "  {}: {} = 0x{:x}",
                global.name, global.type_name, global.value
            )?;
        }
        Ok(())
    }
}
