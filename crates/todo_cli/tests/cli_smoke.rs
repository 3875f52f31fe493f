use std::process::Command;

#[test]
fn cli_smoke_help() {
    let exe = env!("CARGO_BIN_EXE_todo_cli");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("failed to run todo_cli --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.trim().is_empty());
}

#[test]
fn unknown_command_is_invalid_input() {
    let exe = env!("CARGO_BIN_EXE_todo_cli");
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(exe)
        .arg("frobnicate")
        .env("TODOAPP_STORE_PATH", dir.path().join("tasks.json"))
        .env("TODOAPP_CONFIG_PATH", dir.path().join("config.json"))
        .output()
        .expect("failed to run todo_cli");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}
