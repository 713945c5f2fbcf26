//! Typed input-validation failures.
//!
//! These are the fatal, structural problems: a run that hits one of them
//! writes nothing. Per-record problems are not errors; see
//! [`crate::registry::ValidationReport`].

use std::path::PathBuf;

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{what} is not valid {format}: {message}")]
    Parse {
        what: &'static str,
        format: &'static str,
        message: String,
    },

    #[error("registry must be a list of tool records, found {found}")]
    RegistryShape { found: &'static str },

    #[error(
        "taxonomy must be a nested mapping (segment -> subtree) or a list of category paths, found {found}"
    )]
    TaxonomyShape { found: &'static str },

    #[error("taxonomy is empty or malformed: no category paths to order by")]
    EmptyTaxonomy,
}

/// Human-readable kind of a JSON value, used in "expected X, found Y" messages.
pub fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

pub fn read_to_string(what: &'static str, path: &std::path::Path) -> Result<String, InputError> {
    if !path.exists() {
        return Err(InputError::NotFound {
            what,
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })
}
