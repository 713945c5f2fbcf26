//! Category paths, the taxonomy tree, and the pre-order index used for sorting.
//!
//! A taxonomy is a tree of category segments. Every distinct path prefix is
//! exactly one node, and children keep the order in which they were first
//! inserted. That order is what [`build_category_order`] turns into sort keys,
//! so the tree stores children as an ordered list rather than a hash map.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::document::{parse_document, DocFormat};
use crate::error::{read_to_string, value_kind, InputError};
use crate::registry::ToolRecord;

/// Ordered, non-empty, trimmed category segments, e.g. `["Recon", "OSINT"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CategoryPath(Vec<String>);

impl CategoryPath {
    /// Build a path from already-textual segments, trimming and dropping blanks.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        CategoryPath(
            segments
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Normalize a loosely-typed `category_path` value.
    ///
    /// Absent or `null` gives an empty path. Strings, numbers and booleans are
    /// kept in their string form; `null` elements and nested lists/maps are
    /// dropped. A bare string is a one-segment path. Never fails.
    pub fn normalize(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => CategoryPath::default(),
            Some(Value::Array(items)) => {
                CategoryPath::new(items.iter().filter_map(segment_text))
            }
            Some(other) => CategoryPath::new(segment_text(other)),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<[String]> for CategoryPath {
    fn borrow(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" > "))
    }
}

fn segment_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// One node of the taxonomy tree; the root has no segment of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyNode {
    children: Vec<(String, TaxonomyNode)>,
}

impl TaxonomyNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold paths into a tree, reusing segments that already exist.
    pub fn build_tree<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a CategoryPath>,
    {
        let mut root = TaxonomyNode::new();
        for path in paths {
            root.insert(path);
        }
        root
    }

    /// Insert one path. Inserting a path that is already present is a no-op.
    pub fn insert(&mut self, path: &CategoryPath) {
        let mut node = self;
        for segment in path.segments() {
            node = node.child_or_insert(segment);
        }
    }

    fn child_or_insert(&mut self, segment: &str) -> &mut TaxonomyNode {
        let pos = match self.children.iter().position(|(s, _)| s == segment) {
            Some(pos) => pos,
            None => {
                self.children
                    .push((segment.to_string(), TaxonomyNode::new()));
                self.children.len() - 1
            }
        };
        &mut self.children[pos].1
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes below this one (the root itself is not counted).
    pub fn node_count(&self) -> usize {
        self.children
            .iter()
            .map(|(_, child)| 1 + child.node_count())
            .sum()
    }

    /// Every root-to-node path, in pre-order.
    pub fn paths(&self) -> Vec<CategoryPath> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        self.collect_paths(&mut prefix, &mut out);
        out
    }

    fn collect_paths(&self, prefix: &mut Vec<String>, out: &mut Vec<CategoryPath>) {
        for (segment, child) in &self.children {
            prefix.push(segment.clone());
            out.push(CategoryPath(prefix.clone()));
            child.collect_paths(prefix, out);
            prefix.pop();
        }
    }

    /// Read a nested mapping (segment -> subtree). `null` and `{}` are leaves.
    pub fn from_value(value: &Value) -> Result<Self, InputError> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map, &mut Vec::new())),
            other => Err(InputError::TaxonomyShape {
                found: value_kind(other),
            }),
        }
    }

    fn from_map(map: &Map<String, Value>, prefix: &mut Vec<String>) -> Self {
        let mut node = TaxonomyNode::new();
        for (key, child) in map {
            let segment = key.trim();
            if segment.is_empty() {
                warn!(parent = %prefix.join(" > "), "skipping blank taxonomy segment");
                continue;
            }
            prefix.push(segment.to_string());
            let subtree = match child {
                Value::Object(grandchildren) => Self::from_map(grandchildren, prefix),
                Value::Null => TaxonomyNode::new(),
                other => {
                    warn!(
                        path = %prefix.join(" > "),
                        found = value_kind(other),
                        "taxonomy node is not a mapping; treating it as a leaf"
                    );
                    TaxonomyNode::new()
                }
            };
            prefix.pop();
            // Keys that collide after trimming merge into the first occurrence.
            node.merge_child(segment.to_string(), subtree);
        }
        node
    }

    fn merge_child(&mut self, segment: String, other: TaxonomyNode) {
        let slot = self.child_or_insert(&segment);
        for (seg, grandchild) in other.children {
            slot.merge_child(seg, grandchild);
        }
    }
}

impl Serialize for TaxonomyNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.children.len()))?;
        for (segment, child) in &self.children {
            map.serialize_entry(segment, child)?;
        }
        map.end()
    }
}

/// Start from `existing` (deduplicated, in order) and append every tool's
/// non-empty category path that has not been seen yet.
///
/// Deduplication is by exact segment tuple: `["A"]` and `["A", "B"]` are two
/// entries.
pub fn merge_registry_paths<'a, I>(existing: &[CategoryPath], tools: I) -> Vec<CategoryPath>
where
    I: IntoIterator<Item = &'a ToolRecord>,
{
    let mut seen: HashSet<CategoryPath> = HashSet::new();
    let mut out = Vec::new();
    let discovered = tools.into_iter().map(|t| &t.category_path);
    for path in existing.iter().chain(discovered) {
        if path.is_empty() || seen.contains(path) {
            continue;
        }
        seen.insert(path.clone());
        out.push(path.clone());
    }
    out
}

/// Category path -> pre-order discovery index.
#[derive(Debug, Clone, Default)]
pub struct OrderMap {
    index: HashMap<CategoryPath, usize>,
    entries: Vec<CategoryPath>,
}

impl OrderMap {
    fn record(&mut self, path: CategoryPath, idx: usize) {
        if self.index.contains_key(&path) {
            return;
        }
        self.index.insert(path.clone(), idx);
        self.entries.push(path);
    }

    /// Exact lookup.
    pub fn get(&self, path: &[String]) -> Option<usize> {
        self.index.get(path).copied()
    }

    /// Exact lookup, then each proper prefix from longest to length 1.
    pub fn lookup_with_fallback(&self, path: &[String]) -> Option<usize> {
        (1..=path.len()).rev().find_map(|len| self.get(&path[..len]))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = (&CategoryPath, usize)> + '_ {
        self.entries.iter().map(move |p| (p, self.index[p]))
    }
}

/// Pre-order walk assigning each node the next value of one shared counter.
pub fn build_category_order(tree: &TaxonomyNode) -> OrderMap {
    let mut order = OrderMap::default();
    let mut prefix = Vec::new();
    let assigned = visit(tree, &mut prefix, 0, &mut order);
    debug!(nodes = assigned, "built category order");
    order
}

fn visit(
    node: &TaxonomyNode,
    prefix: &mut Vec<String>,
    next: usize,
    order: &mut OrderMap,
) -> usize {
    let mut next = next;
    for (segment, child) in &node.children {
        prefix.push(segment.clone());
        order.record(CategoryPath(prefix.clone()), next);
        next += 1;
        if !child.is_empty() {
            next = visit(child, prefix, next, order);
        }
        prefix.pop();
    }
    next
}

/// A taxonomy artifact as found on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum TaxonomySource {
    /// An explicit list of category paths (`[[...], ...]` or `{paths: [...]}`).
    Paths(Vec<CategoryPath>),
    /// A nested mapping.
    Tree(TaxonomyNode),
}

impl TaxonomySource {
    pub fn load(path: &Path) -> Result<Self, InputError> {
        let text = read_to_string("taxonomy file", path)?;
        Self::parse(&text, DocFormat::from_path(path))
    }

    /// Parse a taxonomy document.
    ///
    /// A `const taxonomy = {...};` wrapper is unwrapped first (trailing commas
    /// removed), whatever the file extension.
    pub fn parse(text: &str, format: DocFormat) -> Result<Self, InputError> {
        let value = match unwrap_js_assignment(text) {
            Some(json) => parse_document("taxonomy", &json, DocFormat::Json)?,
            None => parse_document("taxonomy", text, format)?,
        };
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, InputError> {
        match value {
            Value::Null => Ok(TaxonomySource::Paths(Vec::new())),
            Value::Array(items) => Ok(TaxonomySource::Paths(paths_from_list(items))),
            Value::Object(map) => match map.get("paths") {
                Some(Value::Array(items)) => {
                    let ignored: Vec<&str> = map
                        .keys()
                        .map(String::as_str)
                        .filter(|k| *k != "paths")
                        .collect();
                    if !ignored.is_empty() {
                        warn!(keys = ?ignored, "ignoring keys next to taxonomy `paths` list");
                    }
                    Ok(TaxonomySource::Paths(paths_from_list(items)))
                }
                _ => TaxonomyNode::from_value(value).map(TaxonomySource::Tree),
            },
            other => Err(InputError::TaxonomyShape {
                found: value_kind(other),
            }),
        }
    }

    /// The path list this source describes. A tree yields every node path.
    pub fn paths(&self) -> Vec<CategoryPath> {
        match self {
            TaxonomySource::Paths(paths) => paths.clone(),
            TaxonomySource::Tree(tree) => tree.paths(),
        }
    }

    pub fn into_tree(self) -> TaxonomyNode {
        match self {
            TaxonomySource::Paths(paths) => TaxonomyNode::build_tree(&paths),
            TaxonomySource::Tree(tree) => tree,
        }
    }
}

fn paths_from_list(items: &[Value]) -> Vec<CategoryPath> {
    items
        .iter()
        .map(|item| CategoryPath::normalize(Some(item)))
        .filter(|p| !p.is_empty())
        .collect()
}

fn unwrap_js_assignment(text: &str) -> Option<String> {
    static ASSIGN: OnceLock<Regex> = OnceLock::new();
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    let assign = ASSIGN.get_or_init(|| {
        Regex::new(r"(?s)const\s+taxonomy\s*=\s*(\{.*\})\s*;").expect("static regex")
    });
    let trailing = TRAILING_COMMA
        .get_or_init(|| Regex::new(r",\s*([}\]])").expect("static regex"));
    let body = assign.captures(text)?.get(1)?.as_str();
    Some(trailing.replace_all(body, "$1").into_owned())
}

/// Render a tree as a `const taxonomy = {...};` script.
pub fn to_js_assignment(tree: &TaxonomyNode) -> Result<String, serde_json::Error> {
    let style = crate::convert::JsonStyle {
        indent: 4,
        ensure_ascii: false,
    };
    let body = crate::convert::to_json_string(tree, &style)?;
    Ok(format!("const taxonomy = {body};\n"))
}
