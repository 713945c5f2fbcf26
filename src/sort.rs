//! Deterministic tool ordering by taxonomy position.

use serde::Serialize;
use serde_json::Value;

use crate::registry::ToolRecord;
use crate::taxonomy::OrderMap;

/// Category index for tools whose path (and every prefix of it) is unknown.
pub const UNCATEGORIZED_INDEX: usize = 999_999;

/// Compared field by field: category index, then featured rank, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SortKey {
    pub category_index: usize,
    /// 0 for featured (`best_in`) tools, 1 otherwise.
    pub featured_rank: u8,
    /// Lower-cased name; empty when absent.
    pub name: String,
}

pub fn sort_key(tool: &ToolRecord, order: &OrderMap) -> SortKey {
    let category_index = order
        .lookup_with_fallback(tool.category_path.segments())
        .unwrap_or(UNCATEGORIZED_INDEX);
    SortKey {
        category_index,
        featured_rank: if tool.best_in { 0 } else { 1 },
        name: tool.name.as_deref().unwrap_or("").to_lowercase(),
    }
}

/// Stable sort of raw records; records come back unchanged, only reordered.
pub fn sort_tools(entries: Vec<Value>, order: &OrderMap) -> Vec<Value> {
    sort_with_keys(entries, order)
        .into_iter()
        .map(|(_, entry)| entry)
        .collect()
}

/// Like [`sort_tools`], keeping each record's key alongside it.
pub fn sort_with_keys(entries: Vec<Value>, order: &OrderMap) -> Vec<(SortKey, Value)> {
    let mut keyed: Vec<(SortKey, Value)> = entries
        .into_iter()
        .map(|entry| (sort_key(&ToolRecord::from_value(&entry), order), entry))
        .collect();
    // `sort_by` is stable: exact key ties keep their input order.
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{build_category_order, CategoryPath, TaxonomyNode};
    use serde_json::json;

    fn order_of(paths: &[&[&str]]) -> OrderMap {
        let paths: Vec<CategoryPath> = paths.iter().map(|p| CategoryPath::new(*p)).collect();
        build_category_order(&TaxonomyNode::build_tree(&paths))
    }

    fn names(sorted: &[Value]) -> Vec<&str> {
        sorted.iter().map(|t| t["name"].as_str().unwrap_or("")).collect()
    }

    #[test]
    fn end_to_end_recon_scenario() {
        let order = order_of(&[&["Recon"], &["Recon", "OSINT"], &["Exploitation"]]);
        let tools = vec![
            json!({"name": "sqlmap", "category_path": ["Exploitation"], "best_in": false}),
            json!({"name": "theHarvester", "category_path": ["Recon", "OSINT"], "best_in": true}),
            json!({"name": "nmap", "category_path": ["Recon"], "best_in": false}),
        ];
        let sorted = sort_tools(tools, &order);
        assert_eq!(names(&sorted), ["nmap", "theHarvester", "sqlmap"]);
    }

    #[test]
    fn prefix_fallback_and_sentinel() {
        let order = order_of(&[&["A", "B"], &["C"]]);
        let deep = ToolRecord::from_value(&json!({"name": "x", "category_path": ["A", "B", "X"]}));
        assert_eq!(sort_key(&deep, &order).category_index, 1);

        let lost = ToolRecord::from_value(&json!({"name": "aaa", "category_path": ["Z", "Z"]}));
        assert_eq!(sort_key(&lost, &order).category_index, UNCATEGORIZED_INDEX);

        let sorted = sort_tools(
            vec![
                json!({"name": "aaa", "category_path": ["Z", "Z"], "best_in": true}),
                json!({"name": "zzz", "category_path": ["C"]}),
                json!({"name": "mmm"}),
            ],
            &order,
        );
        assert_eq!(names(&sorted), ["zzz", "aaa", "mmm"]);
    }

    #[test]
    fn featured_first_then_case_insensitive_name() {
        let order = order_of(&[&["Recon"]]);
        let sorted = sort_tools(
            vec![
                json!({"name": "nmap", "category_path": ["Recon"]}),
                json!({"name": "zmap", "category_path": ["Recon"], "best_in": true}),
                json!({"name": "Amass", "category_path": ["Recon"]}),
            ],
            &order,
        );
        assert_eq!(names(&sorted), ["zmap", "Amass", "nmap"]);
    }

    #[test]
    fn sorting_is_stable_and_idempotent() {
        let order = order_of(&[&["A"]]);
        let tools = vec![
            json!({"name": "Dup", "category_path": ["A"], "id": 1}),
            json!({"name": "dup", "category_path": ["A"], "id": 2}),
            json!({"name": "alpha", "category_path": ["A"], "id": 3}),
        ];
        let once = sort_tools(tools, &order);
        let ids: Vec<i64> = once.iter().map(|t| t["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, [3, 1, 2]);
        let twice = sort_tools(once.clone(), &order);
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_records_still_get_keys() {
        let order = order_of(&[&["A"]]);
        let sorted = sort_tools(
            vec![json!("bare"), json!({"category_path": ["A"]}), json!(null)],
            &order,
        );
        assert_eq!(sorted[0], json!({"category_path": ["A"]}));
        assert_eq!(sorted[1], json!("bare"));
        assert_eq!(sorted[2], json!(null));
    }
}
