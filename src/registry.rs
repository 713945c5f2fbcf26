//! The tool registry: loading, the typed record view, and pre-flight validation.
//!
//! Records are kept as the original `serde_json::Value` so output carries
//! every field in its original order. [`ToolRecord`] is the narrow, typed
//! view the ordering logic works on.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::document::{parse_document, DocFormat};
use crate::error::{read_to_string, value_kind, InputError};
use crate::taxonomy::CategoryPath;

/// A loaded registry file.
#[derive(Debug, Clone)]
pub struct Registry {
    /// The file contents, verbatim (embedded in the dashboard).
    pub raw_text: String,
    pub entries: Vec<Value>,
}

pub fn load_registry(path: &Path) -> Result<Registry, InputError> {
    let raw_text = read_to_string("registry file", path)?;
    let entries = parse_registry(&raw_text, DocFormat::from_path(path))?;
    Ok(Registry { raw_text, entries })
}

/// Parse registry text. The top level must be a list (an empty document counts as `[]`).
pub fn parse_registry(text: &str, format: DocFormat) -> Result<Vec<Value>, InputError> {
    match parse_document("registry", text, format)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => Ok(entries),
        other => Err(InputError::RegistryShape {
            found: value_kind(&other),
        }),
    }
}

/// The fields of a tool record that drive ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRecord {
    pub name: Option<String>,
    pub category_path: CategoryPath,
    pub best_in: bool,
}

impl ToolRecord {
    /// Typed view of a raw record. Non-mapping records yield the default view.
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return ToolRecord::default();
        };
        let name = match map.get("name") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        };
        ToolRecord {
            name,
            category_path: CategoryPath::normalize(map.get("category_path")),
            best_in: map.get("best_in").is_some_and(is_truthy),
        }
    }
}

/// Loose truthiness: `false`, `null`, `0`, `""`, `[]` and `{}` are false.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The entry is not a mapping at all.
    NotAMapping,
    /// `name` is absent or empty.
    MissingName,
    /// `category_path` is absent or normalizes to nothing; the tool sorts last.
    MissingCategoryPath,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::NotAMapping => "not_a_mapping",
            IssueKind::MissingName => "missing_name",
            IssueKind::MissingCategoryPath => "missing_category_path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordIssue {
    pub index: usize,
    pub kind: IssueKind,
    /// `id` for missing names, `name` otherwise; `N/A` when absent.
    pub context: String,
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IssueKind::NotAMapping => write!(f, "#{}: not a mapping", self.index),
            IssueKind::MissingName => {
                write!(f, "#{} (id: {}): 'name' missing or empty", self.index, self.context)
            }
            IssueKind::MissingCategoryPath => write!(
                f,
                "#{} ({}): 'category_path' missing -> placed last",
                self.index, self.context
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<RecordIssue>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for issue in &self.issues {
            *out.entry(issue.kind.as_str()).or_insert(0) += 1;
        }
        out
    }

    /// Emit the whole report once, as warnings.
    pub fn log(&self) {
        if self.is_empty() {
            return;
        }
        warn!("{} warnings about tool records:", self.len());
        for issue in &self.issues {
            warn!("  {issue}");
        }
    }
}

/// Classify every record as well-formed or degraded.
pub fn validate(entries: &[Value]) -> ValidationReport {
    let mut issues = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(map) = entry.as_object() else {
            issues.push(RecordIssue {
                index,
                kind: IssueKind::NotAMapping,
                context: value_kind(entry).to_string(),
            });
            continue;
        };
        let record = ToolRecord::from_value(entry);
        if record.name.as_deref().is_none_or(str::is_empty) {
            issues.push(RecordIssue {
                index,
                kind: IssueKind::MissingName,
                context: display_field(map.get("id")),
            });
        }
        if record.category_path.is_empty() {
            issues.push(RecordIssue {
                index,
                kind: IssueKind::MissingCategoryPath,
                context: display_field(map.get("name")),
            });
        }
    }
    ValidationReport { issues }
}

fn display_field(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Default a missing or `null` `notes` field to `""` on every mapping record.
pub fn ensure_notes(entries: &mut [Value]) -> usize {
    let mut filled = 0;
    for entry in entries.iter_mut() {
        if let Some(map) = entry.as_object_mut() {
            let needs_default = matches!(map.get("notes"), None | Some(Value::Null));
            if needs_default {
                map.insert("notes".to_string(), Value::String(String::new()));
                filled += 1;
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_view_tolerates_loose_shapes() {
        let r = ToolRecord::from_value(&json!({
            "name": "nmap",
            "category_path": ["Recon", " "],
            "best_in": "yes",
            "version": "7.94"
        }));
        assert_eq!(r.name.as_deref(), Some("nmap"));
        assert_eq!(r.category_path, CategoryPath::new(["Recon"]));
        assert!(r.best_in);

        assert_eq!(ToolRecord::from_value(&json!("just a string")), ToolRecord::default());
        assert!(!ToolRecord::from_value(&json!({"best_in": 0})).best_in);
        assert!(!ToolRecord::from_value(&json!({"best_in": null})).best_in);
    }

    #[test]
    fn validation_classifies_each_record() {
        let entries = vec![
            json!({"name": "ok", "category_path": ["A"]}),
            json!(42),
            json!({"id": "t-3", "category_path": ["A"]}),
            json!({"name": "", "category_path": []}),
            json!({"name": "loose"}),
        ];
        let report = validate(&entries);
        assert_eq!(report.count(IssueKind::NotAMapping), 1);
        assert_eq!(report.count(IssueKind::MissingName), 2);
        assert_eq!(report.count(IssueKind::MissingCategoryPath), 2);
        assert_eq!(report.issues[1].to_string(), "#2 (id: t-3): 'name' missing or empty");
        assert_eq!(
            report.issues.last().unwrap().to_string(),
            "#4 (loose): 'category_path' missing -> placed last"
        );
        assert_eq!(report.counts().get("missing_name"), Some(&2));
    }

    #[test]
    fn non_list_registry_is_fatal() {
        let err = parse_registry("name: nmap\n", DocFormat::Yaml).unwrap_err();
        assert!(matches!(err, InputError::RegistryShape { found: "a mapping" }));
        assert!(parse_registry("", DocFormat::Yaml).unwrap().is_empty());
    }

    #[test]
    fn notes_are_defaulted_without_touching_existing_ones() {
        let mut entries = vec![
            json!({"name": "a"}),
            json!({"name": "b", "notes": null}),
            json!({"name": "c", "notes": "keep"}),
            json!("not a mapping"),
        ];
        assert_eq!(ensure_notes(&mut entries), 2);
        assert_eq!(entries[0]["notes"], "");
        assert_eq!(entries[1]["notes"], "");
        assert_eq!(entries[2]["notes"], "keep");
    }
}
