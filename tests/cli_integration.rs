//! Tests for the `rg-replace` command-line interface.
//!
//! These drive the replace, restore and checkpoints commands, which do not
//! need a search binary.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rg-replace"));
    cmd.env_remove("RG_REPLACE_ROOT")
        .env_remove("RG_REPLACE_CONFIG")
        .env_remove("RG_REPLACE_LOG");
    cmd
}

/// Root with one file and a replace request for it.
fn setup_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("notes.txt"),
        "Unicode strange sub file, very strange\nkeep this line\n",
    )
    .unwrap();
    fs::write(dir.path().join("request.json"), request_json(None)).unwrap();
    dir
}

fn request_json(replacement: Option<&str>) -> String {
    let replace = replacement.map_or("null".to_string(), |r| format!("\"{r}\""));
    format!(
        r#"{{"matches":[{{"path":"notes.txt","matches":[
            {{"line":"Unicode strange sub file, very strange\n","match":"strange","start":8,"end":15,"start_utf8":8,"end_utf8":15,"line_number":1,"absolute_offset":0,"replace":{replace}}},
            {{"line":"Unicode strange sub file, very strange\n","match":"strange","start":31,"end":38,"start_utf8":31,"end_utf8":38,"line_number":1,"absolute_offset":0,"replace":{replace}}}
        ]}}]}}"#
    )
}

fn run_replace(root: &Path, extra: &[&str]) -> Output {
    bin()
        .arg("--root")
        .arg(root)
        .arg("replace")
        .arg("--input")
        .arg(root.join("request.json"))
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn test_cli_help() {
    let output = bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("search"));
    assert!(stdout.contains("replace"));
    assert!(stdout.contains("restore"));
    assert!(stdout.contains("checkpoints"));
}

#[test]
fn test_cli_replace_with_text() {
    let dir = setup_root();
    let output = run_replace(dir.path(), &["--with", "hello"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Summary:"));
    assert!(stdout.contains("Replaced 2 match(es) on 1 line(s)"));

    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "Unicode hello sub file, very hello\nkeep this line\n"
    );
    assert!(dir.path().join(".checkpoints/notes-checkpoint.txt").is_file());
}

#[test]
fn test_cli_replace_without_replacements_is_unchanged() {
    let dir = setup_root();
    let output = run_replace(dir.path(), &[]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Nothing to replace"));
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "Unicode strange sub file, very strange\nkeep this line\n"
    );
}

#[test]
fn test_cli_dry_run_does_not_write() {
    let dir = setup_root();
    let output = run_replace(dir.path(), &["--with", "hello", "--dry-run", "--diff"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("Would replace 2 match(es)"));
    assert!(stdout.contains("Unicode hello sub file, very hello"));

    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "Unicode strange sub file, very strange\nkeep this line\n"
    );
    assert!(!dir.path().join(".checkpoints").exists());
}

#[test]
fn test_cli_diff_prints_unified_hunks() {
    let dir = setup_root();
    let mut lines: String = (1..=10).map(|i| format!("filler {i}\n")).collect();
    lines.push_str("Unicode strange sub file, very strange\n");
    lines.push_str("keep this line\n");
    fs::write(dir.path().join("notes.txt"), &lines).unwrap();
    let request = request_json(None).replace("\"line_number\":1", "\"line_number\":11");
    fs::write(dir.path().join("request.json"), request).unwrap();

    let output = run_replace(dir.path(), &["--with", "hello", "--dry-run", "--diff"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    // Three lines of context either side of line 11
    assert!(stdout.contains("@@ -8,5 +8,5 @@"), "{stdout}");
    assert!(stdout.contains(" filler 8"));
    assert!(!stdout.contains("filler 7"));
    assert!(stdout.contains("-Unicode strange sub file, very strange"));
    assert!(stdout.contains("+Unicode hello sub file, very hello"));
}

#[test]
fn test_cli_replace_with_regex_captures() {
    let dir = setup_root();
    let output = run_replace(dir.path(), &["--with", "${1}-x", "--regex", "(str)ange"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "Unicode str-x sub file, very str-x\nkeep this line\n"
    );
}

#[test]
fn test_cli_regex_ignore_case() {
    let dir = setup_root();
    let output = run_replace(
        dir.path(),
        &["--with", "odd", "--regex", "STRANGE", "--ignore-case"],
    );
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "Unicode odd sub file, very odd\nkeep this line\n"
    );
}

#[test]
fn test_cli_invalid_regex_fails() {
    let dir = setup_root();
    let output = run_replace(dir.path(), &["--with", "x", "--regex", "(unclosed"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--regex"));
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "Unicode strange sub file, very strange\nkeep this line\n"
    );
}

#[test]
fn test_cli_no_checkpoint() {
    let dir = setup_root();
    let output = run_replace(dir.path(), &["--with", "hello", "--no-checkpoint"]);

    assert!(output.status.success());
    assert!(!dir.path().join(".checkpoints").exists());
}

#[test]
fn test_cli_replace_reads_stdin() {
    let dir = setup_root();
    let mut child = bin()
        .arg("--root")
        .arg(dir.path())
        .arg("replace")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(request_json(Some("odd")).as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "Unicode odd sub file, very odd\nkeep this line\n"
    );
}

#[test]
fn test_cli_replace_missing_file_fails() {
    let dir = setup_root();
    fs::remove_file(dir.path().join("notes.txt")).unwrap();
    let output = run_replace(dir.path(), &["--with", "hello"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("notes.txt"));
}

#[test]
fn test_cli_restore_and_list_checkpoints() {
    let dir = setup_root();
    let output = run_replace(dir.path(), &["--with", "hello"]);
    assert!(output.status.success());

    let output = bin()
        .arg("--root")
        .arg(dir.path())
        .arg("checkpoints")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("notes-checkpoint.txt"));
    assert!(stdout.contains("1 checkpoint(s)"));

    let output = bin()
        .arg("--root")
        .arg(dir.path())
        .args(["restore", "notes.txt"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "Unicode strange sub file, very strange\nkeep this line\n"
    );
}

#[test]
fn test_cli_search_invalid_path_prints_failure() {
    let dir = setup_root();
    let output = bin()
        .arg("--root")
        .arg(dir.path())
        .args(["search", "strange", "--path", "missing"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["code"], 4);
}

#[test]
fn test_cli_config_from_env() {
    let dir = setup_root();
    let config = dir.path().join("rg-replace.toml");
    fs::write(&config, "[replace]\ncheckpoint_dir = \".snapshots\"\n").unwrap();

    let output = bin()
        .env("RG_REPLACE_CONFIG", &config)
        .env("RG_REPLACE_ROOT", dir.path())
        .args(["replace", "--with", "hello", "--input"])
        .arg(dir.path().join("request.json"))
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(dir.path().join(".snapshots/notes-checkpoint.txt").is_file());
}

#[test]
fn test_cli_invalid_config_fails() {
    let dir = setup_root();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[search]\nmax_count = -1\n").unwrap();

    let output = bin()
        .arg("--config")
        .arg(&config)
        .arg("--root")
        .arg(dir.path())
        .arg("checkpoints")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_count"));
}
