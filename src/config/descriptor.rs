use crate::domain::model::TableRef;
use crate::utils::error::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a transfer. `bucket` selects object storage over the local
/// filesystem; `schema`/`table` address the relational backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSpec {
    pub bucket: Option<String>,
    pub file_name: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
}

/// Per-call values that win over the descriptor's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationOverride {
    pub bucket: Option<String>,
    pub file_name: Option<String>,
}

impl LocationOverride {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn file(file_name: impl Into<String>) -> Self {
        Self {
            bucket: None,
            file_name: Some(file_name.into()),
        }
    }

    pub fn object(bucket: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            file_name: Some(file_name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLocation {
    File { path: String },
    Object { bucket: String, key: String },
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path } => f.write_str(path),
            Self::Object { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

impl LocationSpec {
    /// Resolves a file or object location; fails before any I/O when no file
    /// name is known.
    pub fn resolve_blob(&self, side: Side, overrides: &LocationOverride) -> Result<ResolvedLocation> {
        let file_name = non_empty(overrides.file_name.as_ref())
            .or_else(|| non_empty(self.file_name.as_ref()))
            .ok_or_else(|| {
                TransferError::configuration(format!("no {} file name provided", side))
            })?;

        match non_empty(overrides.bucket.as_ref()).or_else(|| non_empty(self.bucket.as_ref())) {
            Some(bucket) => Ok(ResolvedLocation::Object {
                bucket,
                key: file_name,
            }),
            None => Ok(ResolvedLocation::File { path: file_name }),
        }
    }

    pub fn resolve_table(&self, side: Side, overrides: Option<&TableRef>) -> Result<TableRef> {
        let (schema, table) = match overrides {
            Some(table) => (
                non_empty(Some(&table.schema)),
                non_empty(Some(&table.table)),
            ),
            None => (non_empty(self.schema.as_ref()), non_empty(self.table.as_ref())),
        };

        match (schema, table) {
            (Some(schema), Some(table)) => Ok(TableRef::new(schema, table)),
            _ => Err(TransferError::configuration(format!(
                "no {} schema and table provided",
                side
            ))),
        }
    }
}

/// Immutable description of where a transfer reads from and writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDescriptor {
    #[serde(default)]
    pub source: LocationSpec,
    #[serde(default)]
    pub target: LocationSpec,
}

impl TransferDescriptor {
    pub fn new(source: LocationSpec, target: LocationSpec) -> Self {
        Self { source, target }
    }
}
