//! CLI integration tests running the compiled binary.

mod common;

use common::run_actiongraph_in_dir;
use serde_json::Value;
use tempfile::TempDir;

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn json(dir: &std::path::Path, args: &[&str]) -> Value {
    let mut argv = args.to_vec();
    argv.push("--json");
    let output = run_actiongraph_in_dir(dir, &argv);
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn create(dir: &std::path::Path, title: &str, extra: &[&str]) -> String {
    let mut args = vec!["create", "--title", title];
    args.extend_from_slice(extra);
    json(dir, &args)["id"].as_str().unwrap().to_string()
}

#[test]
fn test_command_outside_workspace_fails() {
    let temp = TempDir::new().unwrap();
    let output = run_actiongraph_in_dir(temp.path(), &["list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("actiongraph init"));
}

#[test]
fn test_init_twice_fails() {
    let temp = TempDir::new().unwrap();
    assert!(run_actiongraph_in_dir(temp.path(), &["init", "--quiet"]).status.success());
    assert!(temp.path().join(".actiongraph/config.yaml").exists());

    let again = run_actiongraph_in_dir(temp.path(), &["init"]);
    assert!(!again.status.success());
}

#[test]
fn test_hierarchy_workflow() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    assert!(run_actiongraph_in_dir(dir, &["init", "--prefix", "plan", "--quiet"]).status.success());

    let root = create(dir, "Plan the offsite", &[]);
    assert!(root.starts_with("plan-"));
    let date = create(dir, "Pick a date", &["--parent", root.as_str()]);
    let venue = create(dir, "Book a venue", &["--parent", root.as_str(), "--deps", date.as_str()]);

    let ready = json(dir, &["ready"]);
    let ready_ids: Vec<&str> = ready
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ready_ids, vec![date.as_str()]);

    json(dir, &["done", date.as_str()]);
    let ready = json(dir, &["ready"]);
    assert_eq!(ready[0]["id"], venue.as_str());

    let shown = json(dir, &["show", venue.as_str()]);
    assert_eq!(shown["parent"]["id"], root.as_str());
    assert_eq!(shown["prerequisites"][0]["id"], date.as_str());

    let tree = run_actiongraph_in_dir(dir, &["tree"]);
    let text = stdout(&tree);
    assert!(text.starts_with(&format!("○ {root} Plan the offsite")));
    assert!(text.contains(&format!("✓ {date} Pick a date")));
    assert!(text.contains(&format!("○ {venue} Book a venue *")));

    let deleted = json(dir, &["delete", root.as_str(), "--policy", "recursive"]);
    assert_eq!(deleted["deleted"].as_array().unwrap().len(), 3);
    assert_eq!(stdout(&run_actiongraph_in_dir(dir, &["list"])), "No actions found.\n");
}

#[test]
fn test_rejected_dependency_reports_error() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    assert!(run_actiongraph_in_dir(dir, &["init", "--quiet"]).status.success());

    let a = create(dir, "A", &[]);
    let b = create(dir, "B", &["--deps", a.as_str()]);

    let output = run_actiongraph_in_dir(dir, &["dep", "add", a.as_str(), b.as_str()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("would create a cycle"));

    let output = run_actiongraph_in_dir(dir, &["dep", "rm", a.as_str(), b.as_str()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("A does not depend on B"));
}
