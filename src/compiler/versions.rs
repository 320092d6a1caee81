//! Per-version compiler behavior
//!
//! Vyper 0.2, 0.3 and 0.4 differ in default optimization, PCMap source,
//! how imports reach the compiler and the source map layout.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::ast::{classify_ast, AstNode};
use crate::contract::{Bytecode, ContractType, PcMap};
use crate::error::{VyperError, VyperResult};
use crate::imports::Import;
use crate::pragma::{evm_version_pragma_map, optimization_pragma_map, Optimization};
use crate::project::Project;
use crate::sourcemap::{
    compressed_source_map, dev_messages, get_legacy_pcmap, get_pcmap, parse_source_map,
    SourceMapItem,
};
use crate::version::Version;
use crate::vvm::Toolchain;

/// Default EVM version of a compiler release, if it has one
pub fn default_evm_version(version: &Version) -> Option<&'static str> {
    match version.release() {
        [0, 2, 15] | [0, 2, 16] => Some("berlin"),
        [0, 3, 0..=6] => Some("berlin"),
        [0, 3, 7] => Some("paris"),
        [0, 3, 8..=10] | [0, 4, 0] => Some("shanghai"),
        [0, 4, _] => Some("cancun"),
        [0, minor, _] if minor > 4 => Some("cancun"),
        [major, _, _] if major > 0 => Some("cancun"),
        _ => None,
    }
}

/// Compiler family of a version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubCompiler {
    /// `>=0.2.7,<0.3`
    V02,
    /// `>=0.3.0,<0.4`
    V03,
    /// `>=0.4.0`
    V04,
}

impl SubCompiler {
    pub fn for_version(version: &Version) -> Self {
        match version.release() {
            [0, minor, _] if minor < 3 => SubCompiler::V02,
            [0, 3, _] => SubCompiler::V03,
            _ => SubCompiler::V04,
        }
    }

    pub fn default_optimization(
        &self,
        version: &Version,
    ) -> Optimization {
        match self {
            SubCompiler::V02 => Optimization::Enabled(true),
            SubCompiler::V03 if version < &Version::new(0, 3, 10) => Optimization::Enabled(true),
            SubCompiler::V03 | SubCompiler::V04 => Optimization::Mode("gas".to_string()),
        }
    }

    /// Settings per `"{optimization}%{evm_version}"` key.
    pub fn get_settings(
        &self,
        version: &Version,
        paths: &[PathBuf],
        project: &Project,
    ) -> BTreeMap<String, Value> {
        let default_optimization = self.default_optimization(version);
        let optimizations = optimization_pragma_map(paths, project, &default_optimization);
        let evm_versions = evm_version_pragma_map(paths, project);
        let default_evm = project
            .config()
            .evm_version
            .clone()
            .or_else(|| default_evm_version(version).map(str::to_string));

        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in paths {
            let source_id = project.source_id(path);
            let optimization = optimizations
                .get(&source_id)
                .cloned()
                .unwrap_or_else(|| default_optimization.clone());
            let evm_version = evm_versions
                .get(&source_id)
                .cloned()
                .or_else(|| default_evm.clone());
            let key = format!(
                "{}%{}",
                optimization,
                evm_version.as_deref().unwrap_or("none")
            )
            .to_lowercase();
            groups.entry(key).or_default().push(source_id);
        }

        let output_format = project.config().output_selection();
        let mut settings = BTreeMap::new();
        for (key, selection) in groups {
            let Some((optimization, evm_version)) = key.split_once('%') else {
                continue;
            };

            let output_selection: Map<String, Value> = selection
                .iter()
                .filter(|id| project.path().join(id).is_file())
                .filter(|id| !id.split('/').any(|segment| segment == "interfaces"))
                .map(|id| (id.clone(), json!(output_format)))
                .collect();

            let mut entry = json!({
                "optimize": Optimization::from_key(optimization),
                "outputSelection": output_selection,
                "search_paths": ["."],
            });
            if evm_version != "none" && evm_version != "null" {
                entry["evmVersion"] = Value::from(evm_version);
            }
            if *self == SubCompiler::V04 {
                if let Some(enabled) = project.config().enable_decimals {
                    entry["enable_decimals"] = Value::from(enabled);
                }
            }
            settings.insert(key, entry);
        }
        settings
    }

    /// `sources` of the input JSON for the selected source ids.
    pub fn sources(
        &self,
        source_ids: &[String],
        project: &Project,
        imports: &BTreeMap<String, Vec<Import>>,
    ) -> Map<String, Value> {
        let interfaces = project.interfaces_folder();
        let mut sources = Map::new();
        for id in source_ids {
            let path = project.path().join(id);
            if path.parent() == Some(interfaces.as_path()) {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(&path) {
                sources.insert(id.clone(), json!({ "content": content }));
            }
        }

        if *self == SubCompiler::V04 {
            for id in source_ids {
                for import in imports.get(id).into_iter().flatten() {
                    if import.is_builtin() || sources.contains_key(&import.source_id) {
                        continue;
                    }
                    let Some(path) = import.path() else {
                        continue;
                    };
                    if let Ok(content) = std::fs::read_to_string(path) {
                        sources.insert(import.source_id.clone(), json!({ "content": content }));
                    }
                }
            }
        }
        sources
    }

    /// `-p` base path; imports only resolve with it before 0.4.
    pub fn base_path<'p>(
        &self,
        project: &'p Project,
    ) -> Option<&'p Path> {
        match self {
            SubCompiler::V04 => None,
            _ => Some(project.path()),
        }
    }

    pub fn uses_interfaces(&self) -> bool {
        *self != SubCompiler::V04
    }

    fn pcmap(
        &self,
        version: &Version,
        ast: Option<&AstNode>,
        src_map: &[SourceMapItem],
        opcodes: &[String],
        bytecode: &Value,
    ) -> PcMap {
        let legacy = match self {
            SubCompiler::V02 => true,
            SubCompiler::V03 => version <= &Version::new(0, 3, 7),
            SubCompiler::V04 => false,
        };
        let has_pos_map = bytecode
            .get("sourceMap")
            .and_then(|m| m.get("pc_pos_map"))
            .is_some()
            || bytecode.get("sourceMapFull").is_some_and(Value::is_object);

        match ast {
            Some(ast) if legacy || !has_pos_map => get_legacy_pcmap(ast, src_map, opcodes),
            _ => get_pcmap(bytecode),
        }
    }

    /// Compile every settings group, returning contract types with the key
    /// of the settings that produced them.
    pub fn compile(
        &self,
        version: &Version,
        settings: &BTreeMap<String, Value>,
        imports: &BTreeMap<String, Vec<Import>>,
        interfaces: &Map<String, Value>,
        project: &Project,
        toolchain: &dyn Toolchain,
    ) -> VyperResult<Vec<(ContractType, String)>> {
        let mut compiled = Vec::new();

        for (key, settings_set) in settings {
            let selection: Vec<String> = settings_set
                .get("outputSelection")
                .and_then(Value::as_object)
                .map(|s| s.keys().cloned().collect())
                .unwrap_or_default();
            if selection.is_empty() {
                continue;
            }

            let sources = self.sources(&selection, project, imports);
            let mut input = json!({
                "language": "Vyper",
                "settings": settings_set,
                "sources": sources,
            });
            if self.uses_interfaces() && !interfaces.is_empty() {
                input["interfaces"] = Value::Object(interfaces.clone());
            }

            let mut ids = selection.clone();
            ids.sort();
            info!(
                "Compiling using Vyper compiler '{}'.\nInput:\n\t{}",
                version,
                ids.join("\n\t")
            );

            let result = toolchain.compile_standard(
                version,
                &input,
                self.base_path(project),
                project.path(),
            )?;
            for contract_type in self.contract_types(version, &result, &sources, project)? {
                compiled.push((contract_type, key.clone()));
            }
        }

        Ok(compiled)
    }

    /// Contract types out of a standard-JSON result.
    pub fn contract_types(
        &self,
        version: &Version,
        result: &Value,
        sources: &Map<String, Value>,
        project: &Project,
    ) -> VyperResult<Vec<ContractType>> {
        let contracts = result
            .get("contracts")
            .and_then(Value::as_object)
            .ok_or_else(|| VyperError::Output("missing 'contracts'".to_string()))?;

        let mut contract_types = Vec::new();
        for (raw_id, outputs) in contracts {
            // 0.3.0 may drop the leading separator of absolute paths
            let source_id = if sources.contains_key(raw_id) {
                raw_id.clone()
            } else if sources.contains_key(&format!("/{}", raw_id)) {
                format!("/{}", raw_id)
            } else {
                continue;
            };
            let content = sources[&source_id]
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default();

            let Some(outputs) = outputs.as_object() else {
                continue;
            };
            for (name, output) in outputs {
                let mut ast = result
                    .get("sources")
                    .and_then(|s| s.get(&source_id).or_else(|| s.get(raw_id)))
                    .and_then(|s| s.get("ast"))
                    .cloned();
                if let Some(ast) = ast.as_mut() {
                    classify_ast(ast);
                }
                let ast_node = ast.as_ref().and_then(AstNode::from_json);

                let evm = &output["evm"];
                let bytecode = &evm["deployedBytecode"];
                let opcodes: Vec<String> = bytecode["opcodes"]
                    .as_str()
                    .unwrap_or_default()
                    .split(' ')
                    .filter(|op| !op.is_empty())
                    .map(str::to_string)
                    .collect();
                let raw_map = &bytecode["sourceMap"];
                let sourcemap = compressed_source_map(raw_map, raw_map.is_object());
                let src_map = parse_source_map(sourcemap.as_deref().unwrap_or_default());
                let src_map = src_map.get(1..).unwrap_or_default();
                let pcmap = self.pcmap(version, ast_node.as_ref(), src_map, &opcodes, bytecode);

                let final_source_id = if Path::new(&source_id).is_absolute() {
                    project.source_id(Path::new(&source_id))
                } else {
                    source_id.clone()
                };

                contract_types.push(ContractType {
                    contract_name: name.clone(),
                    source_id: final_source_id,
                    abi: output["abi"].as_array().cloned().unwrap_or_default(),
                    deployment_bytecode: Bytecode::new(
                        evm["bytecode"]["object"].as_str().unwrap_or_default(),
                    ),
                    runtime_bytecode: Bytecode::new(bytecode["object"].as_str().unwrap_or_default()),
                    ast,
                    sourcemap,
                    pcmap: Some(pcmap),
                    userdoc: output.get("userdoc").cloned(),
                    devdoc: output.get("devdoc").cloned(),
                    dev_messages: Some(dev_messages(content)),
                });
            }
        }
        Ok(contract_types)
    }
}
