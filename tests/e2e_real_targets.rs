use std::process::Command;

fn parse_json_stdout(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.output().expect("spawn toolmap");
    assert!(
        out.status.success(),
        "toolmap failed (status={:?})\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr),
    );
    serde_json::from_slice(&out.stdout).expect("stdout JSON parse")
}

#[test]
fn scrape_with_unreachable_index_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let links = dir.path().join("links.txt");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("toolmap"));
    cmd.args(["scrape", "--start", "http://127.0.0.1:9/tools/", "--delay-ms", "0"])
        .arg("--links-out")
        .arg(&links)
        .arg("--icons-dir")
        .arg(dir.path().join("icons"));
    let out = cmd.output().expect("spawn toolmap");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("cannot reach the tool index"));
    assert!(!links.exists());
}

#[test]
fn kali_tool_index_scrape_is_opt_in_network() {
    // Real crawl of the public tool index; opt-in so the suite stays offline.
    if std::env::var("TOOLMAP_E2E_NETWORK").ok().as_deref() != Some("1") {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let links = dir.path().join("kali_tool_links.txt");
    let icons = dir.path().join("icons");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("toolmap"));
    cmd.args(["scrape", "--format", "json", "--delay-ms", "200"])
        .arg("--links-out")
        .arg(&links)
        .arg("--icons-dir")
        .arg(&icons);
    let v = parse_json_stdout(&mut cmd);
    // No exact counts (the site changes), just a well-formed, non-empty run.
    assert_eq!(v.get("schema_version").and_then(|x| x.as_u64()), Some(1));
    assert_eq!(v.get("command").and_then(|x| x.as_str()), Some("scrape"));
    assert!(v.get("tool_links").and_then(|x| x.as_u64()).unwrap_or(0) > 0);

    let text = std::fs::read_to_string(&links).unwrap();
    assert!(text
        .lines()
        .all(|l| l.starts_with("https://www.kali.org/tools/") && l.ends_with('/')));
}
