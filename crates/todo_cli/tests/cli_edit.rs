use std::path::Path;
use std::process::{Command, Output};

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_todo_cli"))
        .args(args)
        .env("TODOAPP_STORE_PATH", dir.join("tasks.json"))
        .env("TODOAPP_CONFIG_PATH", dir.join("config.json"))
        .output()
        .expect("failed to run todo_cli")
}

fn seed(dir: &Path) {
    assert!(run(dir, &["add", "Buy milk", "-d", "2%"]).status.success());
    assert!(run(dir, &["done", "1"]).status.success());
}

#[test]
fn edit_title_keeps_description_and_flag() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    let output = run(dir.path(), &["edit", "1", "--title", "Buy oat milk", "--json"]);

    assert!(output.status.success());
    let task: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        task,
        serde_json::json!({"id": 1, "title": "Buy oat milk", "description": "2%", "complete": true})
    );
}

#[test]
fn edit_description_only() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    let output = run(dir.path(), &["edit", "1", "--description", "1 litre"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Updated task: Buy milk (1)"));

    let listed = run(dir.path(), &["list"]);
    let stdout = String::from_utf8_lossy(&listed.stdout);
    assert!(stdout.contains("1 | [x] | Buy milk | 1 litre"));
}

#[test]
fn edit_without_fields_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    let output = run(dir.path(), &["edit", "1"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}

#[test]
fn edit_blank_title_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    let output = run(dir.path(), &["edit", "1", "--title", "  "]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("title is required"));
}
