//! JSON output with a configurable indent, plus the YAML -> JSON converter.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::document::{parse_document, DocFormat};
use crate::error::read_to_string;

#[derive(Debug, Clone, Copy)]
pub struct JsonStyle {
    /// Spaces per level. 0 still breaks lines, it just does not indent.
    pub indent: usize,
    /// Escape every non-ASCII character as `\uXXXX`.
    pub ensure_ascii: bool,
}

impl Default for JsonStyle {
    fn default() -> Self {
        Self {
            indent: 2,
            ensure_ascii: false,
        }
    }
}

pub fn to_json_string<T: Serialize + ?Sized>(
    value: &T,
    style: &JsonStyle,
) -> Result<String, serde_json::Error> {
    let indent = vec![b' '; style.indent];
    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
    value.serialize(&mut ser)?;
    // serde_json only ever writes valid UTF-8.
    let out = String::from_utf8_lossy(&buf).into_owned();
    if style.ensure_ascii {
        Ok(escape_non_ascii(&out))
    } else {
        Ok(out)
    }
}

/// Replace non-ASCII characters with JSON `\u` escapes (UTF-16, surrogate pairs
/// above the BMP). Outside of string literals JSON text is pure ASCII, so this
/// can run over a whole serialized document.
pub fn escape_non_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut units = [0u16; 2];
    for c in s.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Default output path: the input with a `.json` extension.
pub fn default_json_path(input: &Path) -> PathBuf {
    input.with_extension("json")
}

/// Convert a YAML file to JSON, keeping mapping key order. Returns the output path.
pub fn yaml_to_json(input: &Path, output: Option<&Path>, style: &JsonStyle) -> Result<PathBuf> {
    let text = read_to_string("input file", input)?;
    let value: Value = parse_document("input file", &text, DocFormat::Yaml)?;
    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_json_path(input));
    let json = to_json_string(&value, style)?;
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output dir {}", parent.display()))?;
    }
    fs::write(&out_path, json)
        .with_context(|| format!("failed to write {}", out_path.display()))?;
    Ok(out_path)
}
