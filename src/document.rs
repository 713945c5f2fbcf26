//! Loading YAML/JSON documents into an order-preserving `serde_json::Value`.

use std::path::Path;

use serde_json::Value;

use crate::error::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Json,
    Yaml,
}

impl DocFormat {
    /// `.json` is JSON; anything else is treated as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocFormat::Json,
            _ => DocFormat::Yaml,
        }
    }

    fn name(self) -> &'static str {
        match self {
            DocFormat::Json => "JSON",
            DocFormat::Yaml => "YAML",
        }
    }
}

/// Parse `text` in the given format. An empty (or whitespace-only) document is `Null`.
pub fn parse_document(
    what: &'static str,
    text: &str,
    format: DocFormat,
) -> Result<Value, InputError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let parsed = match format {
        DocFormat::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
        DocFormat::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| InputError::Parse {
        what,
        format: format.name(),
        message,
    })
}
