// SPDX-License-Identifier: MIT
//! Build configuration

use crate::format::RecordLayout;

/// Primitive type names accepted by strict type checking
pub const DEFAULT_PRIMITIVE_TYPES: &[&str] = &[
    "pointer", "nuint", "nint", "bool", "uint8", "uint16", "uint32", "uint64", "int8", "int16",
    "int32", "int64",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value} - {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Settings that shape a built blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Target pointer width in bytes; resolves `size = "pointer"`
    pub pointer_size: u8,
    /// Per-element sizes written into the directory
    pub layout: RecordLayout,
    /// Reject field/global type names that are neither declared nor primitive
    pub strict_type_refs: bool,
    pub primitive_types: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            pointer_size: std::mem::size_of::<usize>() as u8,
            layout: RecordLayout::natural(),
            strict_type_refs: false,
            primitive_types: DEFAULT_PRIMITIVE_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl BuildConfig {
    /// Load from `CONTRACT_BLOB_*` environment variables
    ///
    /// Unset variables take their defaults; a variable that is set but does
    /// not parse is an error rather than a silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let natural = RecordLayout::natural();

        Ok(Self {
            pointer_size: parse_var(&lookup, "CONTRACT_BLOB_POINTER_SIZE")?
                .unwrap_or(defaults.pointer_size),
            layout: RecordLayout {
                type_record_size: parse_var(&lookup, "CONTRACT_BLOB_TYPE_RECORD_SIZE")?
                    .unwrap_or(natural.type_record_size),
                field_record_size: parse_var(&lookup, "CONTRACT_BLOB_FIELD_RECORD_SIZE")?
                    .unwrap_or(natural.field_record_size),
                global_record_size: parse_var(&lookup, "CONTRACT_BLOB_GLOBAL_RECORD_SIZE")?
                    .unwrap_or(natural.global_record_size),
            },
            strict_type_refs: parse_flag(&lookup, "CONTRACT_BLOB_STRICT_TYPES")?.unwrap_or(false),
            primitive_types: lookup("CONTRACT_BLOB_PRIMITIVE_TYPES")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.primitive_types),
        })
    }

    pub fn with_pointer_size(mut self, pointer_size: u8) -> Self {
        self.pointer_size = pointer_size;
        self
    }

    pub fn with_layout(mut self, layout: RecordLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_type_refs = strict;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pointer_size != 4 && self.pointer_size != 8 {
            return Err(ConfigError::Invalid {
                key: "CONTRACT_BLOB_POINTER_SIZE".to_string(),
                value: self.pointer_size.to_string(),
                reason: "must be 4 or 8".to_string(),
            });
        }

        if let Some((table, size)) = self.layout.undersized() {
            return Err(ConfigError::Invalid {
                key: format!("{} record size", table),
                value: size.to_string(),
                reason: format!("must be at least {}", table.known_record_size()),
            });
        }

        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(Some(true)),
        "0" | "false" | "no" | "" => Ok(Some(false)),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: "expected true or false".to_string(),
        }),
    }
}
