use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::Path;

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn json_stdout(cmd: &mut assert_cmd::Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().clone();
    serde_json::from_slice(&out.stdout).expect("json stdout")
}

const REGISTRY: &str = "\
- name: sqlmap
  category_path: [Exploitation]
- name: theHarvester
  category_path: [Recon, OSINT]
  best_in: true
- name: nmap
  category_path: [\" Recon \"]
- name: orphan
";

#[test]
fn order_indices_follow_insertion_preorder() {
    let dir = tempfile::tempdir().unwrap();
    let taxonomy = dir.path().join("taxonomy.json");
    write_file(&taxonomy, r#"[["A","B"],["A","C"],["D"]]"#);

    let v = json_stdout(
        cargo_bin_cmd!("toolmap")
            .arg("order")
            .arg(&taxonomy)
            .args(["--format", "json"]),
    );
    assert_eq!(v["command"], "order");
    assert_eq!(v["nodes"], 4);
    let rows: Vec<(String, u64)> = v["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            let path: Vec<&str> = r["path"]
                .as_array()
                .unwrap()
                .iter()
                .map(|s| s.as_str().unwrap())
                .collect();
            (path.join("."), r["index"].as_u64().unwrap())
        })
        .collect();
    assert_eq!(
        rows,
        [
            ("A".to_string(), 0),
            ("A.B".to_string(), 1),
            ("A.C".to_string(), 2),
            ("D".to_string(), 3),
        ]
    );
}

#[test]
fn taxonomy_paths_document_round_trips_into_sort() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("data/registry.yml");
    let taxonomy = dir.path().join("data/taxonomy.yml");
    write_file(&registry, REGISTRY);

    let v = json_stdout(
        cargo_bin_cmd!("toolmap")
            .arg("taxonomy")
            .arg("--registry")
            .arg(&registry)
            .arg("--out")
            .arg(&taxonomy)
            .args(["--format", "json"]),
    );
    assert_eq!(v["paths"], 3);
    assert_eq!(v["nodes"], 3);
    assert_eq!(
        v["tree"],
        serde_json::json!({"Exploitation": {}, "Recon": {"OSINT": {}}})
    );

    let written: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&taxonomy).unwrap()).unwrap();
    let paths: Vec<Vec<String>> = serde_yaml::from_value(written["paths"].clone()).unwrap();
    assert_eq!(
        paths,
        [
            vec!["Exploitation".to_string()],
            vec!["Recon".to_string(), "OSINT".to_string()],
            vec!["Recon".to_string()],
        ]
    );

    let out = dir.path().join("sorted.json");
    cargo_bin_cmd!("toolmap")
        .arg("sort")
        .arg("-j")
        .arg(&registry)
        .arg("-t")
        .arg(&taxonomy)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
    let sorted: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    let names: Vec<&str> = sorted
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["sqlmap", "nmap", "theHarvester", "orphan"]);
}

#[test]
fn existing_taxonomy_paths_come_first() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry.yml");
    let existing = dir.path().join("existing.yml");
    let out = dir.path().join("taxonomy.js");
    write_file(&registry, REGISTRY);
    write_file(&existing, "paths:\n  - [Recon]\n  - [Post]\n");

    cargo_bin_cmd!("toolmap")
        .arg("taxonomy")
        .arg("--registry")
        .arg(&registry)
        .arg("--existing")
        .arg(&existing)
        .arg("--out")
        .arg(&out)
        .args(["--style", "js"])
        .assert()
        .success();
    let js = std::fs::read_to_string(&out).unwrap();
    let expected = concat!(
        "const taxonomy = {\n",
        "    \"Recon\": {\n",
        "        \"OSINT\": {}\n",
        "    },\n",
        "    \"Post\": {},\n",
        "    \"Exploitation\": {}\n",
        "};",
    );
    assert!(js.starts_with(expected));

    let v = json_stdout(
        cargo_bin_cmd!("toolmap")
            .arg("order")
            .arg(&out)
            .args(["--format", "json"]),
    );
    assert_eq!(v["nodes"], 4);
    assert_eq!(v["rows"][3]["path"], serde_json::json!(["Exploitation"]));
}

#[test]
fn dashboard_embeds_sorted_tools_tree_and_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("data/registry.yml");
    let taxonomy = dir.path().join("data/taxonomy.yml");
    let page = dir.path().join("app/dashboard.html");
    write_file(&registry, REGISTRY);
    write_file(&taxonomy, "paths:\n  - [Recon]\n  - [Recon, OSINT]\n  - [Exploitation]\n");

    let v = json_stdout(
        cargo_bin_cmd!("toolmap")
            .arg("dashboard")
            .arg("--registry")
            .arg(&registry)
            .arg("--taxonomy")
            .arg(&taxonomy)
            .arg("--out")
            .arg(&page)
            .args(["--format", "json"]),
    );
    assert_eq!(v["command"], "dashboard");
    assert_eq!(v["tools"], 4);
    assert_eq!(v["notes_defaulted"], 4);

    let html = std::fs::read_to_string(&page).unwrap();
    assert!(html.contains("<title>Kali Linux Toolmap</title>"));
    assert!(html.contains(
        "<script id=\"treeData\" type=\"application/json\">{\"Recon\":{\"OSINT\":{}},\"Exploitation\":{}}</script>"
    ));
    assert!(html.contains("<script id=\"registryYaml\" type=\"text/plain\">- name: sqlmap"));
    let nmap = html.find("\"name\":\"nmap\"").unwrap();
    let harvester = html.find("\"name\":\"theHarvester\"").unwrap();
    let sqlmap = html.find("\"name\":\"sqlmap\"").unwrap();
    assert!(nmap < harvester && harvester < sqlmap);
    assert!(html.contains("\"notes\":\"\""));
}

#[test]
fn dashboard_rejects_non_list_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry.yml");
    let taxonomy = dir.path().join("taxonomy.yml");
    let page = dir.path().join("dashboard.html");
    write_file(&registry, "tools:\n  - name: nmap\n");
    write_file(&taxonomy, "paths: []\n");

    cargo_bin_cmd!("toolmap")
        .arg("dashboard")
        .arg("--registry")
        .arg(&registry)
        .arg("--taxonomy")
        .arg(&taxonomy)
        .arg("--out")
        .arg(&page)
        .assert()
        .failure()
        .stderr(predicate::str::contains("found a mapping"));
    assert!(!page.exists());
}

#[test]
fn convert_writes_json_next_to_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry.yml");
    write_file(&registry, "- name: wifite\n  notes: \"perché\"\n");

    cargo_bin_cmd!("toolmap")
        .arg("convert")
        .arg(&registry)
        .arg("--ensure-ascii")
        .assert()
        .success();
    let json = std::fs::read_to_string(dir.path().join("registry.json")).unwrap();
    assert!(json.contains("perch\\u00e9"));
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v, serde_json::json!([{"name": "wifite", "notes": "perché"}]));
}
