//! CLI integration tests
//!
//! These tests run the compiled binary and check:
//! - Command parsing and help output
//! - The extract subcommand on local files
//! - Scan behavior that needs no network access
//! - Exit codes

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper to get the path to the dockerfile-sources binary
fn dockerfile_sources_bin() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_dockerfile-sources") {
        return PathBuf::from(path);
    }

    let mut path = env::current_exe()
        .expect("Failed to get current executable path")
        .parent()
        .expect("No parent")
        .to_path_buf();

    if path.ends_with("deps") {
        path = path.parent().expect("No parent").to_path_buf();
    }

    path.join("dockerfile-sources")
}

/// Runs the binary with a clean scan environment
fn run(args: &[&str]) -> Output {
    Command::new(dockerfile_sources_bin())
        .args(args)
        .env_remove("REPOSITORY_LIST_URL")
        .env_remove("GITHUB_ACCESS_TOKEN")
        .env_remove("RUST_LOG")
        .env("DOCKERFILE_SOURCES_LOG_LEVEL", "error")
        .output()
        .expect("Failed to execute dockerfile-sources")
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create directory");
    }
    fs::write(&path, content).expect("Failed to write file");
    path
}

#[test]
fn test_cli_help() {
    let output = run(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dockerfile-sources"));
    assert!(stdout.contains("scan"));
    assert!(stdout.contains("extract"));
}

#[test]
fn test_cli_version() {
    let output = run(&["--version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_subcommand_fails() {
    let output = run(&["inspect"]);
    assert!(!output.status.success());
}

#[test]
fn test_extract_json() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "Dockerfile",
        "FROM golang:1.21\nRUN echo hi\nFROM scratch\nFROM golang:1.21\n",
    );

    let output = run(&["extract", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let images = &parsed["data"][path.to_str().unwrap()];
    assert_eq!(images, &serde_json::json!(["golang:1.21", "golang:1.21"]));
}

#[test]
fn test_extract_dedup_images() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "Dockerfile",
        "FROM golang:1.21\nFROM alpine:3.19\nFROM golang:1.21\n",
    );

    let output = run(&["extract", "--dedup-images", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        parsed["data"][path.to_str().unwrap()],
        serde_json::json!(["golang:1.21", "alpine:3.19"])
    );
}

#[test]
fn test_extract_human_format() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "Dockerfile", "FROM alpine:3.19\n");

    let output = run(&["extract", "--format", "human", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("alpine:3.19"));
    assert!(serde_json::from_str::<serde_json::Value>(&stdout).is_err());
}

#[test]
fn test_extract_missing_file_exits_partial() {
    let dir = TempDir::new().unwrap();
    let present = write_file(&dir, "Dockerfile", "FROM alpine:3.19\n");
    let missing = dir.path().join("missing/Dockerfile");

    let output = run(&[
        "extract",
        present.to_str().unwrap(),
        missing.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(parsed["data"][present.to_str().unwrap()].is_array());
    assert!(parsed["data"][missing.to_str().unwrap()].is_null());
}

#[test]
fn test_scan_without_list_is_fatal() {
    let output = run(&["scan"]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("REPOSITORY_LIST_URL"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_scan_rejects_invalid_list_url() {
    let output = run(&["scan", "--list-url", "ftp://example.com/repos.txt"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_scan_rejects_zero_concurrency() {
    let dir = TempDir::new().unwrap();
    let list = write_file(&dir, "repos.txt", "");

    let output = run(&[
        "scan",
        "--input",
        list.to_str().unwrap(),
        "--max-concurrency",
        "0",
    ]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_scan_empty_list_outputs_empty_document() {
    let dir = TempDir::new().unwrap();
    let list = write_file(&dir, "repos.txt", "# no repositories yet\n\n");

    let output = run(&["scan", "--input", list.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "{\n  \"data\": {}\n}\n"
    );
}

#[test]
fn test_scan_output_file() {
    let dir = TempDir::new().unwrap();
    let list = write_file(&dir, "repos.txt", "");
    let out = dir.path().join("out.json");

    let output = run(&[
        "scan",
        "--input",
        list.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());

    let written = fs::read_to_string(&out).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed, serde_json::json!({ "data": {} }));
}

#[test]
fn test_scan_missing_input_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("repos.txt");

    let output = run(&["scan", "--input", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}
