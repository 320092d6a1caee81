//! vyper.toml manifest parsing and writing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::VyperConfig;
use crate::error::{VyperError, VyperResult};

/// The main manifest file name
pub const MANIFEST_FILE: &str = "vyper.toml";

/// Default folder holding contract sources
pub const DEFAULT_CONTRACTS_FOLDER: &str = "contracts";

/// Represents the `[project]` section of vyper.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectInfo {
    /// Project name
    pub name: String,
    /// Folder (relative to the project root) holding the sources
    #[serde(default = "default_contracts_folder")]
    pub contracts_folder: String,
}

fn default_contracts_folder() -> String {
    DEFAULT_CONTRACTS_FOLDER.to_string()
}

/// Represents the complete vyper.toml manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectManifest {
    /// Project metadata
    pub project: ProjectInfo,
    /// Compiler configuration
    #[serde(default)]
    pub vyper: VyperConfig,
    /// Dependencies (name -> version string or `{ version, path | git }` table)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, toml::Value>,
}

impl ProjectManifest {
    /// Create a new manifest with the given project name
    pub fn new(name: &str) -> Self {
        ProjectManifest {
            project: ProjectInfo {
                name: name.to_string(),
                contracts_folder: default_contracts_folder(),
            },
            vyper: VyperConfig::default(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Load manifest from a directory containing vyper.toml
    pub fn load(dir: &Path) -> VyperResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(VyperError::NotProject(dir.to_path_buf()));
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest: ProjectManifest = toml::from_str(&content)?;
        Ok(manifest)
    }

    /// Save manifest to a directory
    pub fn save(
        &self,
        dir: &Path,
    ) -> VyperResult<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(MANIFEST_FILE);
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Add a local-path dependency
    pub fn add_path_dependency(
        &mut self,
        name: &str,
        version: &str,
        path: &str,
    ) {
        let mut table = toml::map::Map::new();
        table.insert(
            "version".to_string(),
            toml::Value::String(version.to_string()),
        );
        table.insert("path".to_string(), toml::Value::String(path.to_string()));
        self.dependencies
            .insert(name.to_string(), toml::Value::Table(table));
    }

    /// Check if a dependency exists
    pub fn has_dependency(
        &self,
        name: &str,
    ) -> bool {
        self.dependencies.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_manifest() {
        let manifest = ProjectManifest::new("test-project");
        assert_eq!(manifest.project.name, "test-project");
        assert_eq!(manifest.project.contracts_folder, "contracts");
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let mut manifest = ProjectManifest::new("demo");
        manifest.add_path_dependency("exampledependency", "local", "../dep");
        manifest.vyper.evm_version = Some("paris".to_string());
        manifest.save(tmp.path()).unwrap();

        let loaded = ProjectManifest::load(tmp.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert!(loaded.has_dependency("exampledependency"));
    }

    #[test]
    fn test_load_missing_manifest() {
        let tmp = TempDir::new().unwrap();
        let result = ProjectManifest::load(tmp.path());
        assert!(matches!(result, Err(VyperError::NotProject(_))));
    }

    #[test]
    fn test_parse_full_manifest() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_FILE),
            r#"
[project]
name = "demo"
contracts_folder = "src"

[vyper]
version = "0.3.10"
import_remapping = ["exampledep=exampledependency"]

[dependencies]
exampledependency = { version = "local", path = "../dep" }
"#,
        )
        .unwrap();

        let manifest = ProjectManifest::load(tmp.path()).unwrap();
        assert_eq!(manifest.project.contracts_folder, "src");
        assert_eq!(manifest.vyper.import_remapping[0].key, "exampledep");
        assert_eq!(manifest.dependencies.len(), 1);
    }

    #[test]
    fn test_invalid_manifest() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), "[project\nname=").unwrap();
        assert!(matches!(
            ProjectManifest::load(tmp.path()),
            Err(VyperError::Toml(_))
        ));
    }
}
