//! Flatten a contract and its imports into a single source

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::ast::source_to_abi;
use crate::error::{VyperError, VyperResult};
use crate::imports::{DependencyContext, Import, ImportKind, ImportResolver};
use crate::interface::{
    extract_import_aliases, extract_imports, extract_meta, generate_interface,
    generate_interface_from_json,
};
use crate::pragma::version_pragma_spec;
use crate::project::Project;
use crate::version::Version;

const MODULE_WARNING: &str =
    "Flattening modules DOES NOT yield the same bytecode! This is **NOT** valid for contract-verification.";

/// Per-call flattening state
#[derive(Debug, Default)]
struct FlattenState {
    handled: HashSet<PathBuf>,
    warned: bool,
}

pub struct Flattener<'a> {
    resolver: &'a ImportResolver,
    ctx: &'a dyn DependencyContext,
}

impl<'a> Flattener<'a> {
    pub fn new(
        resolver: &'a ImportResolver,
        ctx: &'a dyn DependencyContext,
    ) -> Self {
        Flattener { resolver, ctx }
    }

    /// Flattened source of `path`, with its pragma.
    pub fn flatten(
        &self,
        path: &Path,
        project: &Project,
    ) -> VyperResult<String> {
        let path = project.absolute(path);
        if !path.is_file() {
            return Err(VyperError::SourceNotFound(path));
        }
        let mut state = FlattenState::default();
        self.flatten_source(&path, project, true, &mut state)
    }

    fn flatten_source(
        &self,
        path: &Path,
        project: &Project,
        include_pragma: bool,
        state: &mut FlattenState,
    ) -> VyperResult<String> {
        state.handled.insert(path.to_path_buf());

        let imports: BTreeMap<String, Import> = self
            .resolver
            .get_imports(project, &[path.to_path_buf()], self.ctx)
            .remove(path)
            .unwrap_or_default()
            .into_iter()
            .filter(|import| !import.is_builtin() && import.path().is_some())
            .map(|import| (import.source_id.clone(), import))
            .collect();

        let original = std::fs::read_to_string(path)?;
        let aliases = extract_import_aliases(&original);
        let (pragma, without_meta) = extract_meta(&original);
        let targets_modules = pragma
            .as_deref()
            .and_then(version_pragma_spec)
            .is_some_and(|spec| spec.contains(&Version::new(0, 4, 0)));
        let extracted = extract_imports(&without_meta);

        let mut interfaces = String::new();
        let mut modules = String::new();
        let mut module_prefixes: Vec<String> = Vec::new();

        for import in imports.values() {
            let Some(import_path) = import.path() else {
                continue;
            };
            let stem = import.stem();
            let name = aliases.get(&stem).cloned().unwrap_or_else(|| stem.clone());

            if let ImportKind::Dependency { dependency, .. } = &import.kind {
                let contract_types = dependency.project.contract_types();
                if dependency.project.path() != project.path() && !contract_types.is_empty() {
                    let abi: Vec<Value> = contract_types
                        .values()
                        .flat_map(|ct| ct.abi.iter().cloned())
                        .collect();
                    interfaces.push_str(&generate_interface_from_json(&abi, &name));
                    continue;
                }
            }

            let extension = import_path.extension().and_then(|e| e.to_str());
            if targets_modules && matches!(extension, Some("vy")) {
                if !state.warned {
                    warn!("{}", MODULE_WARNING);
                    state.warned = true;
                }
                if !module_prefixes.contains(&stem) {
                    module_prefixes.push(stem.clone());
                }
                if state.handled.contains(import_path) {
                    continue;
                }
                let module = self.flatten_source(import_path, project, false, state)?;
                modules = format!("{}\n\n{}", modules, module);
            } else if matches!(extension, Some("json")) {
                let abi = json_interface_abi(import_path)?;
                interfaces.push_str(&generate_interface_from_json(&abi, &name));
            } else {
                let source = std::fs::read_to_string(import_path)?;
                interfaces.push_str(&generate_interface(&source_to_abi(&source), &name));
            }
        }

        let pragma = if include_pragma {
            pragma.unwrap_or_default()
        } else {
            String::new()
        };
        let mut flattened = [
            pragma,
            extracted.stdlib,
            interfaces,
            modules,
            extracted.source,
        ]
        .join("\n\n");

        for prefix in &module_prefixes {
            flattened = flattened.replace(&format!("{}.", prefix), "self.");
        }

        Ok(collapse_blank_lines(&strip_docstrings(&flattened)))
    }
}

/// ABI entries of a JSON interface file: a bare list or `{"abi": [...]}`.
fn json_interface_abi(path: &Path) -> VyperResult<Vec<Value>> {
    let value: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    Ok(match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("abi") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    })
}

/// Drop `"""` doc-strings, single- or multi-line.
fn strip_docstrings(source: &str) -> String {
    let mut lines = Vec::new();
    let mut in_docstring = false;
    for line in source.lines() {
        let trimmed = line.trim_end();
        if in_docstring {
            if trimmed.ends_with("\"\"\"") {
                in_docstring = false;
            }
            continue;
        }
        if trimmed.starts_with("\"\"\"") {
            if trimmed == "\"\"\"" || !trimmed.ends_with("\"\"\"") {
                in_docstring = true;
            }
            continue;
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn collapse_blank_lines(source: &str) -> String {
    let mut source = source.to_string();
    while source.contains("\n\n\n\n") {
        source = source.replace("\n\n\n\n", "\n\n\n");
    }
    source
}
