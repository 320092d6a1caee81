//! Vyper interface source generation and import-line helpers

use serde_json::Value;
use std::collections::BTreeMap;

use crate::contract::{AbiParam, MethodAbi};

const INDENT: &str = "    ";

fn generate_inputs(inputs: &[AbiParam]) -> String {
    inputs
        .iter()
        .map(|i| format!("{}: {}", i.name, i.ty))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `def name(a: t, ...) -> out: mutability`
pub fn generate_method(abi: &MethodAbi) -> String {
    let return_maybe = abi
        .outputs
        .first()
        .map(|out| format!(" -> {}", out.ty))
        .unwrap_or_default();
    format!(
        "def {}({}){}: {}\n",
        abi.name,
        generate_inputs(&abi.inputs),
        return_maybe,
        abi.state_mutability
    )
}

/// Vyper interface block for the function entries of `abi`
pub fn generate_interface(
    abi: &[MethodAbi],
    name: &str,
) -> String {
    let mut source = format!("interface {}:\n", name);
    for method in abi {
        source.push_str(INDENT);
        source.push_str(&generate_method(method));
    }
    source.push('\n');
    source
}

/// Same as [`generate_interface`] for a raw JSON ABI
pub fn generate_interface_from_json(
    abi: &[Value],
    name: &str,
) -> String {
    generate_interface(&MethodAbi::from_abi(abi), name)
}

/// Split the first version pragma line off the source.
pub fn extract_meta(source: &str) -> (Option<String>, String) {
    let mut pragma = None;
    let mut cleaned = Vec::new();
    for line in source.lines() {
        if pragma.is_none()
            && line.starts_with('#')
            && (line.contains("pragma version") || line.contains("@version"))
        {
            pragma = Some(line.to_string());
        } else {
            cleaned.push(line);
        }
    }
    (pragma, cleaned.join("\n"))
}

fn is_import_line(line: &str) -> bool {
    line.starts_with("import ") || (line.starts_with("from ") && line.contains(" import "))
}

/// Import lines pulled out of the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedImports {
    /// `vyper.interfaces` imports
    pub stdlib: String,
    /// Every other import
    pub interfaces: String,
    /// Source without import lines
    pub source: String,
}

pub fn extract_imports(source: &str) -> ExtractedImports {
    let mut stdlib = Vec::new();
    let mut interfaces = Vec::new();
    let mut cleaned = Vec::new();
    for line in source.lines() {
        if is_import_line(line) {
            if line.contains("vyper.interfaces") {
                stdlib.push(line);
            } else {
                interfaces.push(line);
            }
        } else {
            cleaned.push(line);
        }
    }
    ExtractedImports {
        stdlib: stdlib.join("\n"),
        interfaces: interfaces.join("\n"),
        source: cleaned.join("\n"),
    }
}

/// `{imported name: alias}` for `... as alias` imports
pub fn extract_import_aliases(source: &str) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    for line in source.lines() {
        if !is_import_line(line) || !line.contains(" as ") {
            continue;
        }
        let Some((_, subject)) = line.split_once("import ") else {
            continue;
        };
        if let Some((path, alias)) = subject.split_once(" as ") {
            let name = path.rsplit('.').next().unwrap_or(path).trim();
            aliases.insert(name.to_string(), alias.trim().to_string());
        }
    }
    aliases
}
