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

#[test]
fn add_command_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["add", "demo task"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Added task: demo task (1)"));
}

#[test]
fn add_command_persists_record() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["add", "Buy milk", "--description", "2%"]);
    assert!(output.status.success());

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("tasks.json")).unwrap())
            .unwrap();

    assert_eq!(stored["schema_version"], 1);
    assert_eq!(stored["next_id"], 2);
    assert_eq!(
        stored["tasks"],
        serde_json::json!([
            {"id": 1, "title": "Buy milk", "description": "2%", "complete": false}
        ])
    );
}

#[test]
fn add_command_assigns_distinct_ids_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    for title in ["one", "two", "three"] {
        assert!(run(dir.path(), &["add", title]).status.success());
    }

    let output = run(dir.path(), &["list", "--json"]);
    let tasks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<i64> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|task| task["id"].as_i64().unwrap())
        .collect();

    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn add_command_json_prints_task() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["add", "Buy milk", "-d", "2%", "--json"]);

    assert!(output.status.success());
    let task: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        task,
        serde_json::json!({"id": 1, "title": "Buy milk", "description": "2%", "complete": false})
    );
}

#[test]
fn add_command_rejects_missing_title() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["add"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}

#[test]
fn add_command_rejects_blank_title() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["add", "   "]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input - title is required"));
}

#[test]
fn add_command_honours_store_path_override() {
    let dir = tempfile::tempdir().unwrap();
    let custom = dir.path().join("nested").join("custom.json");
    let from_env = dir.path().join("from-env.json");
    let override_arg = format!("store_path={}", custom.display());

    let output = Command::new(env!("CARGO_BIN_EXE_todo_cli"))
        .args(["add", "elsewhere", "--config-override", &override_arg])
        .env("TODOAPP_STORE_PATH", &from_env)
        .env("TODOAPP_CONFIG_PATH", dir.path().join("config.json"))
        .output()
        .expect("failed to run todo_cli");

    assert!(output.status.success());
    assert!(custom.exists());
    assert!(!from_env.exists());
}
