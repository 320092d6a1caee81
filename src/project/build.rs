//! `.build/__local__.json` build manifest

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::contract::{Compiler, ContractType};
use crate::error::VyperResult;

/// Build manifest file name inside the build directory
pub const BUILD_FILE: &str = "__local__.json";

/// Contract types and the compilers that produced them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    #[serde(default)]
    pub contract_types: BTreeMap<String, ContractType>,
    #[serde(default)]
    pub compilers: Vec<Compiler>,
}

impl BuildManifest {
    /// Load from a build directory; a missing file is an empty manifest.
    pub fn load(build_dir: &Path) -> VyperResult<Self> {
        let path = build_dir.join(BUILD_FILE);
        if !path.is_file() {
            return Ok(BuildManifest::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(
        &self,
        build_dir: &Path,
    ) -> VyperResult<()> {
        std::fs::create_dir_all(build_dir)?;
        let path = build_dir.join(BUILD_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        debug!("Wrote build manifest to '{}'.", path.display());
        Ok(())
    }

    pub fn add_contract_types<I>(
        &mut self,
        contract_types: I,
    ) where
        I: IntoIterator<Item = ContractType>,
    {
        for contract_type in contract_types {
            self.contract_types
                .insert(contract_type.contract_name.clone(), contract_type);
        }
    }

    /// Merge newly used compilers into the recorded ones.
    ///
    /// Contract types listed by a new compiler are removed from older
    /// records, records left without contract types are dropped, and records
    /// sharing name, version and settings are combined.
    pub fn add_compiler_data(
        &mut self,
        compilers: Vec<Compiler>,
    ) {
        if compilers.is_empty() {
            return;
        }

        let recompiled: Vec<&String> = compilers
            .iter()
            .flat_map(|c| c.contract_types.iter())
            .collect();

        let mut merged: Vec<Compiler> = Vec::new();
        for mut existing in std::mem::take(&mut self.compilers) {
            existing
                .contract_types
                .retain(|name| !recompiled.contains(&name));
            if !existing.contract_types.is_empty() {
                merged.push(existing);
            }
        }

        for compiler in compilers {
            match merged.iter_mut().find(|c| c.same_setup(&compiler)) {
                Some(found) => {
                    for name in compiler.contract_types {
                        if !found.contract_types.contains(&name) {
                            found.contract_types.push(name);
                        }
                    }
                    found.contract_types.sort();
                }
                None => merged.push(compiler),
            }
        }

        self.compilers = merged;
    }
}
