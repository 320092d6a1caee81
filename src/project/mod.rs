//! Vyper project layout
//!
//! A project is a directory with an optional `vyper.toml`, a contracts folder
//! and a `.build` directory holding compiled artifacts and cloned dependencies.

pub mod build;
pub mod dependency;
pub mod git;
pub mod manifest;

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::VyperConfig;
use crate::contract::{Compiler, ContractType};
use crate::error::{VyperError, VyperResult};

pub use build::BuildManifest;
pub use dependency::{Dependency, DependencySpec};
pub use manifest::{ProjectManifest, MANIFEST_FILE};

/// Build directory name
pub const BUILD_DIR: &str = ".build";

/// Extensions considered project sources
pub const SOURCE_EXTENSIONS: [&str; 3] = ["vy", "vyi", "json"];

#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    manifest: ProjectManifest,
}

impl Project {
    /// Load the project rooted at `dir`. Without a manifest the project is
    /// named after the directory and uses the default contracts folder.
    pub fn load(dir: &Path) -> VyperResult<Self> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        Self::load_or_default(dir, &name)
    }

    /// Like [`Project::load`], naming a manifest-less project `name`.
    pub fn load_or_default(
        dir: &Path,
        name: &str,
    ) -> VyperResult<Self> {
        let root = normalize(&std::path::absolute(dir)?);
        let manifest = if root.join(MANIFEST_FILE).is_file() {
            ProjectManifest::load(&root)?
        } else {
            debug!("No {} in '{}', using defaults.", MANIFEST_FILE, root.display());
            ProjectManifest::new(name)
        };
        Ok(Project { root, manifest })
    }

    pub fn from_manifest(
        dir: &Path,
        manifest: ProjectManifest,
    ) -> VyperResult<Self> {
        Ok(Project {
            root: normalize(&std::path::absolute(dir)?),
            manifest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.manifest.project.name
    }

    pub fn manifest(&self) -> &ProjectManifest {
        &self.manifest
    }

    pub fn config(&self) -> &VyperConfig {
        &self.manifest.vyper
    }

    pub fn contracts_folder(&self) -> PathBuf {
        self.root.join(&self.manifest.project.contracts_folder)
    }

    /// Top-level `interfaces` folder, whose files are never compiled on their own
    pub fn interfaces_folder(&self) -> PathBuf {
        self.root.join("interfaces")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(BUILD_DIR)
    }

    /// Absolute form of `path`, resolved against the project root when relative.
    pub fn absolute(
        &self,
        path: &Path,
    ) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        normalize(&joined)
    }

    /// Project-relative, `/`-separated identifier of a source file
    pub fn source_id(
        &self,
        path: &Path,
    ) -> String {
        let absolute = self.absolute(path);
        let relative = pathdiff::diff_paths(&absolute, &self.root).unwrap_or(absolute);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Every source file under the contracts folder, sorted
    pub fn sources(&self) -> Vec<PathBuf> {
        let folder = self.contracts_folder();
        if !folder.is_dir() {
            return Vec::new();
        }
        let mut sources: Vec<PathBuf> = WalkDir::new(&folder)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_source_file(p))
            .collect();
        sources.sort();
        sources
    }

    /// Path of a source id, if the file exists
    pub fn lookup(
        &self,
        source_id: &str,
    ) -> Option<PathBuf> {
        [self.root.join(source_id), self.contracts_folder().join(source_id)]
            .into_iter()
            .find(|p| p.is_file())
    }

    pub fn dependency_specs(&self) -> Vec<DependencySpec> {
        DependencySpec::parse_all(&self.manifest.dependencies)
    }

    /// Declared versions of a dependency
    pub fn dependency_versions(
        &self,
        name: &str,
    ) -> Vec<String> {
        self.dependency_specs()
            .into_iter()
            .filter(|spec| spec.name == name)
            .map(|spec| spec.version)
            .collect()
    }

    /// Resolve one declared dependency
    pub fn get_dependency(
        &self,
        name: &str,
        version: &str,
    ) -> VyperResult<Dependency> {
        let spec = self
            .dependency_specs()
            .into_iter()
            .find(|spec| spec.name == name && spec.version == version)
            .ok_or_else(|| VyperError::DependencyNotFound(format!("'{}@{}'", name, version)))?;
        Dependency::resolve(&spec, &self.root)
    }

    /// Resolve every declared dependency
    pub fn dependencies(&self) -> VyperResult<Vec<Dependency>> {
        self.dependency_specs()
            .iter()
            .map(|spec| Dependency::resolve(spec, &self.root))
            .collect()
    }

    pub fn load_build(&self) -> VyperResult<BuildManifest> {
        BuildManifest::load(&self.build_dir())
    }

    pub fn save_build(
        &self,
        build: &BuildManifest,
    ) -> VyperResult<()> {
        build.save(&self.build_dir())
    }

    /// Compiled contract types recorded in the build manifest
    pub fn contract_types(&self) -> BTreeMap<String, ContractType> {
        match self.load_build() {
            Ok(build) => build.contract_types,
            Err(err) => {
                warn!(
                    "Unable to read build manifest of '{}': {}",
                    self.name(),
                    err
                );
                BTreeMap::new()
            }
        }
    }

    /// Record compiled contract types and the compilers used for them
    pub fn add_build_output(
        &self,
        contract_types: Vec<ContractType>,
        compilers: Vec<Compiler>,
    ) -> VyperResult<()> {
        let mut build = self.load_build()?;
        build.add_contract_types(contract_types);
        build.add_compiler_data(compilers);
        self.save_build(&build)
    }

    /// Copy of this project's configuration rooted at `dir`, with relative
    /// dependency paths made absolute so they still resolve.
    pub fn isolate_in(
        &self,
        dir: &Path,
    ) -> VyperResult<Project> {
        let mut manifest = self.manifest.clone();
        for value in manifest.dependencies.values_mut() {
            match value {
                toml::Value::String(path) => {
                    *path = self.absolute(Path::new(path)).to_string_lossy().into_owned();
                }
                toml::Value::Table(table) => {
                    if let Some(toml::Value::String(path)) = table.get_mut("path") {
                        *path = self.absolute(Path::new(path)).to_string_lossy().into_owned();
                    }
                }
                _ => {}
            }
        }
        manifest.save(dir)?;
        let project = Project::from_manifest(dir, manifest)?;
        std::fs::create_dir_all(project.contracts_folder())?;
        Ok(project)
    }
}

/// Whether `path` has a source extension
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

/// Lexically resolve `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
