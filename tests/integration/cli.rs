//! Integration tests for the `vyper-plugin` CLI surface

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn plugin_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("vyper-plugin");
    path
}

#[test]
fn test_version_flag() {
    let output = Command::new(plugin_bin()).arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_compile_empty_project() {
    let temp_dir = TempDir::new().unwrap();
    let output = Command::new(plugin_bin())
        .arg("compile")
        .arg("--project")
        .arg(temp_dir.path())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let contract_types: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(contract_types, serde_json::json!([]));
}

#[test]
fn test_settings_empty_project() {
    let temp_dir = TempDir::new().unwrap();
    let output = Command::new(plugin_bin())
        .arg("settings")
        .arg("--project")
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let settings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings, serde_json::json!({}));
}

#[test]
fn test_versions_install_rejects_bad_version() {
    let output = Command::new(plugin_bin())
        .args(["versions", "install", "not-a-version"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
