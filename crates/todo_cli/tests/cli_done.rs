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

fn write_store(dir: &Path, tasks: serde_json::Value) {
    let next_id = tasks.as_array().map_or(1, |rows| rows.len() as i64 + 1);
    let content = serde_json::json!({
        "schema_version": 1,
        "next_id": next_id,
        "tasks": tasks
    });
    std::fs::write(
        dir.join("tasks.json"),
        serde_json::to_string_pretty(&content).unwrap(),
    )
    .unwrap();
}

fn stored_tasks(dir: &Path) -> serde_json::Value {
    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("tasks.json")).unwrap()).unwrap();
    stored["tasks"].clone()
}

#[test]
fn done_command_marks_complete_and_keeps_other_fields() {
    let dir = tempfile::tempdir().unwrap();
    write_store(
        dir.path(),
        serde_json::json!([
            {"id": 1, "title": "Buy milk", "description": "2%", "complete": false}
        ]),
    );

    let output = run(dir.path(), &["done", "1"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Completed task: Buy milk (1)"));
    assert_eq!(
        stored_tasks(dir.path()),
        serde_json::json!([
            {"id": 1, "title": "Buy milk", "description": "2%", "complete": true}
        ])
    );
}

#[test]
fn undo_command_clears_completion() {
    let dir = tempfile::tempdir().unwrap();
    write_store(
        dir.path(),
        serde_json::json!([
            {"id": 1, "title": "Buy milk", "description": "", "complete": true}
        ]),
    );

    let output = run(dir.path(), &["undo", "1", "--json"]);

    assert!(output.status.success());
    let task: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(task["complete"], false);
    assert_eq!(stored_tasks(dir.path())[0]["complete"], false);
}

#[test]
fn done_command_unknown_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    write_store(
        dir.path(),
        serde_json::json!([
            {"id": 1, "title": "Buy milk", "description": "", "complete": false}
        ]),
    );

    let output = run(dir.path(), &["done", "9"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: not_found"));
    assert_eq!(stored_tasks(dir.path())[0]["complete"], false);
}

#[test]
fn done_command_rejects_corrupt_store() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tasks.json"), "{ not json").unwrap();

    let output = run(dir.path(), &["done", "1"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_data"));
}
