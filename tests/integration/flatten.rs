//! Integration tests for the `vyper-plugin flatten` command

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use vyper_plugin::{ContractType, Project};

/// Path to the built binary
fn plugin_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test executable name
    path.pop(); // Remove "deps"
    path.push("vyper-plugin");
    path
}

fn write(
    path: &Path,
    content: &str,
) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// `app` importing builtins, two local interfaces and a compiled dependency
fn create_project(dir: &TempDir) -> PathBuf {
    let dep = dir.path().join("dep");
    write(
        &dep.join("contracts").join("Dep.vy"),
        "# @version 0.3.10\n\n@external\ndef read() -> uint256:\n    return 1\n",
    );
    let mut dep_type = ContractType::new("Dep");
    dep_type.source_id = "contracts/Dep.vy".to_string();
    dep_type.abi = vec![json!({
        "type": "function",
        "name": "read",
        "inputs": [],
        "outputs": [{"name": "", "type": "uint256"}],
        "stateMutability": "view"
    })];
    Project::load(&dep)
        .unwrap()
        .add_build_output(vec![dep_type], vec![])
        .unwrap();

    let app = dir.path().join("app");
    write(
        &app.join("vyper.toml"),
        "[project]\nname = \"app\"\n\n[dependencies]\ndep = \"../dep\"\n",
    );
    write(
        &app.join("interfaces").join("IFace.vyi"),
        "@view\n@external\ndef foo() -> bool:\n    ...\n",
    );
    write(
        &app.join("interfaces").join("IFaceTwo.vyi"),
        "@external\ndef bar(a: uint256, b: address):\n    ...\n",
    );
    write(
        &app.join("contracts").join("Main.vy"),
        r#"# @version 0.3.10
from vyper.interfaces import ERC20
import interfaces.IFace as IFace
from dep import Dep
from interfaces import IFaceTwo

"""
@title Main
"""

@external
def go(token: address) -> bool:
    return IFace(token).foo()
"#,
    );
    app
}

#[test]
fn test_flatten_writes_interfaces() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_project(&temp_dir);
    let outfile = temp_dir.path().join("Flat.vy");

    let output = Command::new(plugin_bin())
        .arg("flatten")
        .arg(app.join("contracts").join("Main.vy"))
        .arg(&outfile)
        .arg("--project")
        .arg(&app)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let flattened = fs::read_to_string(&outfile).unwrap();
    assert!(flattened.starts_with("# @version 0.3.10"));
    assert!(flattened.contains("from vyper.interfaces import ERC20"));
    assert!(flattened.contains("interface Dep:\n    def read() -> uint256: view\n"));
    assert!(flattened.contains("interface IFace:\n    def foo() -> bool: view\n"));
    assert!(flattened.contains("interface IFaceTwo:\n    def bar(a: uint256, b: address): nonpayable\n"));
    assert!(!flattened.contains("import interfaces.IFace"));
    assert!(!flattened.contains("@title"));
    assert!(flattened.contains("def go(token: address) -> bool:"));
}

#[test]
fn test_flatten_missing_contract_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = Command::new(plugin_bin())
        .arg("flatten")
        .arg(temp_dir.path().join("Nope.vy"))
        .arg(temp_dir.path().join("out.vy"))
        .arg("--project")
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to flatten"));
}
