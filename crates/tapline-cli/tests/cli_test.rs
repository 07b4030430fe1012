//! Integration tests for the `tapline` binary.
//!
//! Every invocation gets its own `XDG_CONFIG_HOME` so the developer's real
//! config file is never read or written.

use std::path::Path;
use std::process::{Command, Output};

fn tapline(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tapline"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("TAPLINE_XCODE_PROJECT_PATH")
        .env_remove("TAPLINE_LOG_DIR")
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run tapline binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// -----------------------------------------------------------------------
// list
// -----------------------------------------------------------------------

#[test]
fn list_shows_builtin_scenarios() {
    let home = tempfile::tempdir().unwrap();
    let output = tapline(home.path(), &["list"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    let names: Vec<&str> = text
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    assert_eq!(names, vec!["iphone.sample_sum", "iphone.sample_sum_sequential"]);
    assert!(text.contains("iphone"));
}

// -----------------------------------------------------------------------
// init
// -----------------------------------------------------------------------

#[test]
fn init_writes_config_file() {
    let home = tempfile::tempdir().unwrap();
    let logs = home.path().join("logs");
    let output = tapline(
        home.path(),
        &[
            "init",
            "--project-path",
            "/Users/dev/TestApp/TestApp.xcodeproj",
            "--log-dir",
            logs.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let path = home.path().join("tapline").join("config.toml");
    assert!(stdout(&output).contains(&path.display().to_string()));

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[xcode]"));
    assert!(written.contains("project_path = \"/Users/dev/TestApp/TestApp.xcodeproj\""));
    assert!(written.contains("[logging]"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let home = tempfile::tempdir().unwrap();
    assert!(tapline(home.path(), &["init"]).status.success());

    let second = tapline(home.path(), &["init"]);
    assert!(!second.status.success());
    assert!(stderr(&second).contains("already exists"));

    let forced = tapline(home.path(), &["init", "--force", "--project-path", "/x/App.xcodeproj"]);
    assert!(forced.status.success(), "stderr: {}", stderr(&forced));
    let written = std::fs::read_to_string(home.path().join("tapline/config.toml")).unwrap();
    assert!(written.contains("/x/App.xcodeproj"));
}

// -----------------------------------------------------------------------
// run / completions
// -----------------------------------------------------------------------

#[test]
fn run_rejects_unknown_scenario_before_starting() {
    let home = tempfile::tempdir().unwrap();
    let output = tapline(home.path(), &["run", "ipad.does_not_exist"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("unknown scenario"), "stderr: {err}");
    assert!(err.contains("ipad.does_not_exist"));
}

#[test]
fn run_rejects_malformed_config_file() {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join("tapline");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[xcode\n").unwrap();

    let output = tapline(home.path(), &["run", "iphone.sample_sum"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to parse config file"));
}

#[test]
fn completions_for_bash() {
    let home = tempfile::tempdir().unwrap();
    let output = tapline(home.path(), &["completions", "bash"]);

    assert!(output.status.success());
    let script = stdout(&output);
    assert!(script.contains("tapline"));
    assert!(script.contains("list"));
}
