// Per-table column type declarations
//
// A schema artifact is a JSON array of `{name, type, description}` objects,
// the same file the warehouse load step consumes. Only DATE and INTEGER
// declarations drive coercion; every other type stays text.
//
// A missing or unreadable artifact is not an error for callers: `resolve`
// degrades to an empty schema and conversion proceeds with all-text columns.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Declared logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    Date,
    Integer,
    String,
}

impl DeclaredType {
    /// Map a schema artifact type name onto a declared type.
    pub fn from_schema_type(type_name: &str) -> Self {
        let type_name = type_name.trim();
        if type_name.eq_ignore_ascii_case("DATE") {
            DeclaredType::Date
        } else if type_name.eq_ignore_ascii_case("INTEGER")
            || type_name.eq_ignore_ascii_case("INT64")
        {
            DeclaredType::Integer
        } else {
            DeclaredType::String
        }
    }
}

/// One entry of a schema artifact
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema artifact not found at {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read schema artifact {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema artifact {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("column '{column}' is declared both DATE and INTEGER")]
    ConflictingDeclaration { column: String },
}

/// Column names declared DATE and INTEGER for one table.
///
/// The two sets are disjoint; an empty schema means "no declarations".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSchema {
    dates: BTreeSet<String>,
    integers: BTreeSet<String>,
}

impl ColumnSchema {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from artifact fields, rejecting a column declared both DATE and INTEGER.
    pub fn from_fields(fields: &[SchemaField]) -> Result<Self, SchemaError> {
        let mut schema = Self::default();
        for field in fields {
            match DeclaredType::from_schema_type(&field.field_type) {
                DeclaredType::Date => {
                    schema.dates.insert(field.name.clone());
                }
                DeclaredType::Integer => {
                    schema.integers.insert(field.name.clone());
                }
                DeclaredType::String => {}
            }
        }

        if let Some(column) = schema.dates.intersection(&schema.integers).next() {
            return Err(SchemaError::ConflictingDeclaration {
                column: column.clone(),
            });
        }

        Ok(schema)
    }

    pub fn declared_type(&self, column: &str) -> DeclaredType {
        if self.dates.contains(column) {
            DeclaredType::Date
        } else if self.integers.contains(column) {
            DeclaredType::Integer
        } else {
            DeclaredType::String
        }
    }

    pub fn date_columns(&self) -> &BTreeSet<String> {
        &self.dates
    }

    pub fn integer_columns(&self) -> &BTreeSet<String> {
        &self.integers
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.integers.is_empty()
    }
}

/// Locates schema artifacts at `<root>/<dataset>/schema_<table>.json`.
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    root: PathBuf,
}

impl SchemaResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_path(&self, table_name: &str, dataset: &str) -> PathBuf {
        self.root
            .join(dataset)
            .join(format!("schema_{}.json", table_name))
    }

    /// Load the declarations for a table, surfacing why they are unavailable.
    pub fn try_load(&self, table_name: &str, dataset: &str) -> Result<ColumnSchema, SchemaError> {
        let path = self.artifact_path(table_name, dataset);
        load_artifact(&path)
    }

    /// Load the declarations for a table, degrading to an empty schema.
    pub fn resolve(&self, table_name: &str, dataset: &str) -> ColumnSchema {
        match self.try_load(table_name, dataset) {
            Ok(schema) => {
                debug!(
                    table = table_name,
                    date_columns = schema.dates.len(),
                    integer_columns = schema.integers.len(),
                    "Loaded schema declarations"
                );
                schema
            }
            Err(SchemaError::Missing { path }) => {
                debug!(
                    table = table_name,
                    path = %path.display(),
                    "No schema artifact; treating all columns as text"
                );
                ColumnSchema::empty()
            }
            Err(e) => {
                warn!(
                    table = table_name,
                    error = %e,
                    "Schema artifact unusable; treating all columns as text"
                );
                ColumnSchema::empty()
            }
        }
    }
}

fn load_artifact(path: &Path) -> Result<ColumnSchema, SchemaError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SchemaError::Missing {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(SchemaError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let fields: Vec<SchemaField> =
        serde_json::from_str(&content).map_err(|source| SchemaError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    ColumnSchema::from_fields(&fields)
}
