//! Vyper compiler API
//!
//! Selects compiler versions, resolves imports and dependencies, drives the
//! per-version sub-compilers and records their output in the build manifest.

pub mod versions;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error, warn};

use crate::contract::{Compiler, ContractType};
use crate::error::{VyperError, VyperResult};
use crate::flattener::Flattener;
use crate::imports::{DependencyContext, Import, ImportResolver};
use crate::pragma::{version_pragma_spec, version_pragma_spec_from_path};
use crate::project::{Dependency, Project};
use crate::runtime_error::{enrich_error, ContractLogicError, VyperRuntimeError};
use crate::util::config::UserConfig;
use crate::version::{SpecifierSet, Version};
use crate::vvm::{Toolchain, Vvm};

pub use versions::{default_evm_version, SubCompiler};

/// Versions mapped to the files they compile
pub type VersionMap = BTreeMap<Version, BTreeSet<PathBuf>>;

/// Settings per version, then per settings key
pub type SettingsMap = BTreeMap<Version, BTreeMap<String, Value>>;

pub struct VyperCompiler {
    toolchain: Box<dyn Toolchain>,
    resolver: ImportResolver,
}

impl VyperCompiler {
    pub fn new(toolchain: Box<dyn Toolchain>) -> Self {
        VyperCompiler {
            toolchain,
            resolver: ImportResolver::new(),
        }
    }

    /// Compiler backed by VVM installations
    pub fn with_vvm(config: &UserConfig) -> Self {
        Self::new(Box::new(Vvm::from_user_config(config)))
    }

    pub fn name(&self) -> &'static str {
        "vyper"
    }

    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    pub fn get_sub_compiler(
        &self,
        version: &Version,
    ) -> SubCompiler {
        SubCompiler::for_version(version)
    }

    /// Imports of each file, keyed by the file's source id
    pub fn get_imports(
        &self,
        paths: &[PathBuf],
        project: &Project,
    ) -> BTreeMap<String, Vec<Import>> {
        let paths: Vec<PathBuf> = paths.iter().map(|p| project.absolute(p)).collect();
        self.resolver
            .get_imports(project, &paths, self)
            .into_iter()
            .map(|(path, imports)| (project.source_id(&path), imports))
            .collect()
    }

    /// Source id → import source ids
    pub fn import_map(
        &self,
        paths: &[PathBuf],
        project: &Project,
    ) -> BTreeMap<String, Vec<String>> {
        let paths: Vec<PathBuf> = paths.iter().map(|p| project.absolute(p)).collect();
        self.resolver.import_map(project, &paths, self)
    }

    /// Lowest version satisfying each file's pragma.
    pub fn get_versions(
        &self,
        paths: &[PathBuf],
    ) -> BTreeSet<Version> {
        let mut versions = BTreeSet::new();
        for path in paths {
            let Some(spec) = version_pragma_spec_from_path(path) else {
                continue;
            };
            let candidates = match self.toolchain.available_versions() {
                Ok(available) => spec.filter(&available),
                Err(err) => {
                    error!(
                        "Error checking available versions, possibly due to Internet problems. Attempting to use the best installed version. Error: {}",
                        err
                    );
                    spec.filter(&self.toolchain.installed_versions())
                }
            };
            if let Some(lowest) = candidates.into_iter().min() {
                versions.insert(lowest);
            }
        }
        versions
    }

    /// Import key → dependency: configured remappings first, then every
    /// declared dependency by name.
    pub fn get_dependencies(
        &self,
        project: &Project,
    ) -> BTreeMap<String, Dependency> {
        let mut dependencies = BTreeMap::new();
        let mut handled = HashSet::new();
        let mut accept = |dependency: &Dependency| {
            let id = dependency.package_id();
            if handled.contains(&id) || dependency.project.path() == project.path() {
                return false;
            }
            handled.insert(id);
            true
        };

        for remapping in &project.config().import_remapping {
            let name = &remapping.dependency_name;
            let version = match &remapping.dependency_version {
                Some(version) => version.clone(),
                None => {
                    let versions = project.dependency_versions(name);
                    match versions.as_slice() {
                        [only] => only.clone(),
                        _ => continue,
                    }
                }
            };
            match project.get_dependency(name, &version) {
                Ok(dependency) => {
                    if accept(&dependency) {
                        dependencies.insert(remapping.key.clone(), dependency);
                    }
                }
                Err(err) => warn!("Skipping remapping '{}': {}", remapping, err),
            }
        }

        for spec in project.dependency_specs() {
            match Dependency::resolve(&spec, project.path()) {
                Ok(dependency) => {
                    if accept(&dependency) {
                        dependencies.insert(dependency.name.clone(), dependency);
                    }
                }
                Err(err) => warn!("Skipping dependency '{}': {}", spec.name, err),
            }
        }

        dependencies
    }

    /// `interfaces` input for Vyper < 0.4: `<key>/<ContractName>.json` →
    /// `{"abi": [...]}` for every compiled dependency contract.
    pub fn get_import_remapping(
        &self,
        project: &Project,
    ) -> Map<String, Value> {
        let mut interfaces = Map::new();
        for (key, dependency) in self.get_dependencies(project) {
            for (name, contract_type) in dependency.project.contract_types() {
                interfaces.insert(
                    format!("{}/{}.json", key, name),
                    json!({ "abi": contract_type.abi }),
                );
            }
        }
        interfaces
    }

    pub fn get_version_map(
        &self,
        paths: &[PathBuf],
        project: &Project,
    ) -> VyperResult<VersionMap> {
        let paths: Vec<PathBuf> = paths.iter().map(|p| project.absolute(p)).collect();
        let import_map = self.import_map(&paths, project);
        self.version_map_from_imports(&paths, &import_map, project)
    }

    fn version_map_from_imports(
        &self,
        paths: &[PathBuf],
        import_map: &BTreeMap<String, Vec<String>>,
        project: &Project,
    ) -> VyperResult<VersionMap> {
        if paths.is_empty() {
            return Ok(VersionMap::new());
        }
        let mut sorted = paths.to_vec();
        sorted.sort();

        let mut by_spec: IndexMap<SpecifierSet, BTreeSet<PathBuf>> = IndexMap::new();
        let mut without_pragma = BTreeSet::new();
        for path in &sorted {
            let source_id = project.source_id(path);
            let spec = project
                .config()
                .version
                .clone()
                .or_else(|| version_pragma_spec_from_path(path));
            let Some(spec) = spec else {
                without_pragma.insert(path.clone());
                continue;
            };
            let group = by_spec.entry(spec).or_default();
            group.insert(path.clone());
            for import in import_map.get(&source_id).into_iter().flatten() {
                group.insert(project.path().join(import));
            }
        }

        // Install every missing version before selecting
        for spec in by_spec.keys() {
            if !spec.filter(&self.toolchain.installed_versions()).is_empty() {
                continue;
            }
            let mut installable = spec.filter(&self.toolchain.available_versions()?);
            installable.sort_by(|a, b| b.cmp(a));
            let Some(best) = installable.first() else {
                return Err(VyperError::Install("No available version to install.".to_string()));
            };
            if Some(best) == self.toolchain.package_version().as_ref() {
                let listed = installable
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(VyperError::Install(format!(
                    "Unable to install vyper version(s) '{}'.",
                    listed
                )));
            }
            self.toolchain.install(best)?;
        }

        let installed = self.toolchain.installed_versions();
        let mut version_map = VersionMap::new();
        for (spec, group) in &by_spec {
            if let Some(best) = spec.filter(&installed).into_iter().max() {
                version_map
                    .entry(best)
                    .or_default()
                    .extend(group.iter().filter(|p| sorted.contains(p)).cloned());
            }
        }

        let mut installed = installed;
        if installed.is_empty() {
            let newest = self
                .toolchain
                .available_versions()?
                .into_iter()
                .max()
                .ok_or_else(|| VyperError::Install("No available version to install.".to_string()))?;
            self.toolchain.install(&newest)?;
            installed = self.toolchain.installed_versions();
        }

        if !without_pragma.is_empty() {
            let newest = version_map
                .keys()
                .filter(|v| !v.is_prerelease())
                .max()
                .cloned()
                .or_else(|| installed.iter().filter(|v| !v.is_prerelease()).max().cloned())
                .ok_or_else(|| VyperError::Install("No available version to install.".to_string()))?;
            version_map.entry(newest).or_default().extend(without_pragma);
        }

        Ok(version_map)
    }

    /// Settings per version for the `.vy` files among `paths` that are not
    /// under `<project>/interfaces`.
    pub fn get_compiler_settings(
        &self,
        paths: &[PathBuf],
        project: &Project,
    ) -> VyperResult<SettingsMap> {
        let interfaces = project.interfaces_folder();
        let valid: Vec<PathBuf> = paths
            .iter()
            .map(|p| project.absolute(p))
            .filter(|p| p.extension().is_some_and(|e| e == "vy"))
            .filter(|p| !p.starts_with(&interfaces))
            .collect();
        let version_map = self.get_version_map(&valid, project)?;
        Ok(self.settings_from_version_map(&version_map, project))
    }

    fn settings_from_version_map(
        &self,
        version_map: &VersionMap,
        project: &Project,
    ) -> SettingsMap {
        version_map
            .iter()
            .filter(|(_, paths)| !paths.is_empty())
            .map(|(version, paths)| {
                let paths: Vec<PathBuf> = paths.iter().cloned().collect();
                let settings = self
                    .get_sub_compiler(version)
                    .get_settings(version, &paths, project);
                (version.clone(), settings)
            })
            .collect()
    }

    /// Compile `paths` of `project`, recording the output in its build manifest.
    pub fn compile(
        &self,
        paths: &[PathBuf],
        project: &Project,
    ) -> VyperResult<Vec<ContractType>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let paths: Vec<PathBuf> = paths.iter().map(|p| project.absolute(p)).collect();
        let imports = self.get_imports(&paths, project);
        let import_map: BTreeMap<String, Vec<String>> = imports
            .iter()
            .map(|(id, list)| (id.clone(), list.iter().map(|i| i.source_id.clone()).collect()))
            .collect();
        let version_map = self.version_map_from_imports(&paths, &import_map, project)?;
        let all_settings = self.settings_from_version_map(&version_map, project);
        let interfaces = self.get_import_remapping(project);

        let mut contract_types = Vec::new();
        let mut compilers: BTreeMap<(Version, String), Compiler> = BTreeMap::new();
        for (version, settings) in &all_settings {
            let sub_compiler = self.get_sub_compiler(version);
            let compiled = sub_compiler.compile(
                version,
                settings,
                &imports,
                &interfaces,
                project,
                self.toolchain.as_ref(),
            )?;
            for (contract_type, key) in compiled {
                let compiler = compilers
                    .entry((version.clone(), key.clone()))
                    .or_insert_with(|| {
                        Compiler::new(
                            version.to_string(),
                            settings.get(&key).cloned().unwrap_or(Value::Null),
                        )
                    });
                if !compiler.contract_types.contains(&contract_type.contract_name) {
                    compiler.contract_types.push(contract_type.contract_name.clone());
                }
                contract_types.push(contract_type);
            }
        }

        debug!(
            "Compiled {} contract type(s) in '{}'.",
            contract_types.len(),
            project.path().display()
        );
        project.add_build_output(contract_types.clone(), compilers.into_values().collect())?;
        Ok(contract_types)
    }

    /// Compile a code snippet in a temporary copy of `project`.
    pub fn compile_code(
        &self,
        code: &str,
        project: &Project,
        contract_name: Option<&str>,
    ) -> VyperResult<ContractType> {
        let tmp = TempDir::new()?;
        let isolated = project.isolate_in(tmp.path())?;
        let name = contract_name.unwrap_or("code");
        let file = isolated.contracts_folder().join(format!("{}.vy", name));
        std::fs::write(&file, code)?;

        let result = self.compile(std::slice::from_ref(&file), &isolated);
        let _ = std::fs::remove_file(&file);

        result?
            .into_iter()
            .next()
            .ok_or_else(|| VyperError::Compile("Failed to produce contract type.".to_string()))
    }

    /// Version to compile `code` with.
    pub fn source_vyper_version(
        &self,
        code: &str,
    ) -> VyperResult<Version> {
        let no_version = || VyperError::Install("No available version.".to_string());
        match version_pragma_spec(code) {
            Some(spec) => spec
                .filter(&self.toolchain.available_versions()?)
                .into_iter()
                .next()
                .ok_or_else(no_version),
            None => {
                if let Some(version) =
                    self.toolchain.installed_versions().into_iter().find(Version::is_final)
                {
                    return Ok(version);
                }
                self.toolchain
                    .available_versions()?
                    .into_iter()
                    .find(Version::is_final)
                    .ok_or_else(no_version)
            }
        }
    }

    pub fn flatten_contract(
        &self,
        path: &Path,
        project: &Project,
    ) -> VyperResult<String> {
        Flattener::new(&self.resolver, self).flatten(path, project)
    }

    pub fn enrich_error(
        &self,
        err: ContractLogicError,
        contract: &ContractType,
    ) -> VyperRuntimeError {
        enrich_error(err, contract)
    }
}

impl DependencyContext for VyperCompiler {
    fn dependencies(
        &self,
        project: &Project,
    ) -> BTreeMap<String, Dependency> {
        self.get_dependencies(project)
    }

    fn compile_dependency(
        &self,
        dependency: &Dependency,
    ) -> VyperResult<()> {
        let sources: Vec<PathBuf> = dependency
            .project
            .sources()
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "vy"))
            .collect();
        if sources.is_empty() {
            return Ok(());
        }
        self.compile(&sources, &dependency.project).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectManifest;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[derive(Default)]
    struct FakeState {
        installed: Vec<Version>,
        install_calls: Vec<Version>,
        inputs: Vec<Value>,
    }

    /// Toolchain answering standard-JSON input with one empty contract per
    /// selected source, named after the file stem.
    struct FakeToolchain {
        package: Option<Version>,
        available: Vec<Version>,
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeToolchain {
        fn new(
            installed: &[&str],
            available: &[&str],
        ) -> (Self, Arc<Mutex<FakeState>>) {
            let state = Arc::new(Mutex::new(FakeState {
                installed: installed.iter().map(|s| v(s)).collect(),
                ..Default::default()
            }));
            let fake = FakeToolchain {
                package: None,
                available: available.iter().map(|s| v(s)).collect(),
                state: state.clone(),
            };
            (fake, state)
        }
    }

    impl Toolchain for FakeToolchain {
        fn package_version(&self) -> Option<Version> {
            self.package.clone()
        }

        fn installed_versions(&self) -> Vec<Version> {
            self.state.lock().installed.clone()
        }

        fn available_versions(&self) -> VyperResult<Vec<Version>> {
            Ok(self.available.clone())
        }

        fn install(
            &self,
            version: &Version,
        ) -> VyperResult<()> {
            let mut state = self.state.lock();
            state.install_calls.push(version.clone());
            state.installed.push(version.clone());
            Ok(())
        }

        fn binary(
            &self,
            version: &Version,
        ) -> VyperResult<PathBuf> {
            Ok(PathBuf::from(format!("vyper-{}", version)))
        }

        fn compile_standard(
            &self,
            _version: &Version,
            input: &Value,
            _base_path: Option<&Path>,
            _cwd: &Path,
        ) -> VyperResult<Value> {
            self.state.lock().inputs.push(input.clone());
            let mut contracts = Map::new();
            let mut sources = Map::new();
            let selection = input["settings"]["outputSelection"]
                .as_object()
                .cloned()
                .unwrap_or_default();
            for id in selection.keys() {
                let stem = Path::new(id).file_stem().unwrap().to_string_lossy().into_owned();
                contracts.insert(
                    id.clone(),
                    json!({
                        stem: {
                            "abi": [{"type": "function", "name": "foo", "inputs": [], "outputs": [], "stateMutability": "view"}],
                            "userdoc": {},
                            "devdoc": {},
                            "evm": {
                                "bytecode": {"object": "0x6001"},
                                "deployedBytecode": {
                                    "object": "0x00",
                                    "opcodes": "STOP",
                                    "sourceMap": "-1:-1:0:-;0:1:0:-",
                                    "sourceMapFull": {"pc_pos_map": {}, "error_map": {}}
                                }
                            }
                        }
                    }),
                );
                sources.insert(id.clone(), json!({"ast": {"ast_type": "Module", "src": "0:1:0", "body": []}}));
            }
            Ok(json!({"contracts": contracts, "sources": sources}))
        }
    }

    fn write(
        path: &Path,
        content: &str,
    ) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_get_sub_compiler() {
        let (fake, _) = FakeToolchain::new(&[], &[]);
        let compiler = VyperCompiler::new(Box::new(fake));
        assert_eq!(compiler.get_sub_compiler(&v("0.2.16")), SubCompiler::V02);
        assert_eq!(compiler.get_sub_compiler(&v("0.3.7")), SubCompiler::V03);
        assert_eq!(compiler.get_sub_compiler(&v("0.4.0")), SubCompiler::V04);
    }

    #[test]
    fn test_version_map_installs_and_groups() {
        let tmp = TempDir::new().unwrap();
        let contracts = tmp.path().join("contracts");
        write(&contracts.join("A.vy"), "# pragma version 0.3.10\n");
        write(&contracts.join("B.vy"), "# pragma version ~=0.4.0\n");
        write(&contracts.join("C.vy"), "x: uint256\n");
        let project = Project::load(tmp.path()).unwrap();
        let (fake, state) = FakeToolchain::new(&["0.3.10"], &["0.4.1", "0.4.0", "0.3.10"]);
        let compiler = VyperCompiler::new(Box::new(fake));

        let map = compiler.get_version_map(&project.sources(), &project).unwrap();
        assert_eq!(state.lock().install_calls, vec![v("0.4.1")]);
        assert_eq!(map[&v("0.3.10")], BTreeSet::from([contracts.join("A.vy")]));
        assert_eq!(
            map[&v("0.4.1")],
            BTreeSet::from([contracts.join("B.vy"), contracts.join("C.vy")])
        );
    }

    #[test]
    fn test_version_map_install_errors() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("contracts").join("A.vy");
        write(&file, "# pragma version 0.3.9\n");
        let project = Project::load(tmp.path()).unwrap();

        let (fake, _) = FakeToolchain::new(&[], &["0.4.0"]);
        let compiler = VyperCompiler::new(Box::new(fake));
        let err = compiler.get_version_map(&[file.clone()], &project).unwrap_err();
        assert_eq!(err.to_string(), "No available version to install.");

        let (mut fake, _) = FakeToolchain::new(&[], &["0.3.9"]);
        fake.package = Some(v("0.3.9"));
        let compiler = VyperCompiler::new(Box::new(fake));
        let err = compiler.get_version_map(&[file], &project).unwrap_err();
        assert_eq!(err.to_string(), "Unable to install vyper version(s) '0.3.9'.");
    }

    #[test]
    fn test_config_version_beats_pragma() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("contracts").join("A.vy");
        write(&file, "# pragma version 0.3.9\n");
        let mut manifest = ProjectManifest::new("demo");
        manifest.vyper.version = Some(SpecifierSet::parse("==0.3.10").unwrap());
        let project = Project::from_manifest(tmp.path(), manifest).unwrap();
        let (fake, _) = FakeToolchain::new(&["0.3.10", "0.3.9"], &[]);
        let compiler = VyperCompiler::new(Box::new(fake));

        let map = compiler.get_version_map(&[file], &project).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec![&v("0.3.10")]);
    }

    #[test]
    fn test_get_versions_lowest_match() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("A.vy");
        write(&file, "# pragma version >=0.3.9\n");
        let (fake, _) = FakeToolchain::new(&[], &["0.4.0", "0.3.10", "0.3.9"]);
        let compiler = VyperCompiler::new(Box::new(fake));
        assert_eq!(compiler.get_versions(&[file]), BTreeSet::from([v("0.3.9")]));
    }

    #[test]
    fn test_compile_records_build_output() {
        let tmp = TempDir::new().unwrap();
        let contracts = tmp.path().join("contracts");
        write(&contracts.join("A.vy"), "# pragma version 0.3.10\nx: uint256  # dev: storage\n");
        write(&contracts.join("B.vy"), "# pragma version 0.3.10\n");
        let project = Project::load(tmp.path()).unwrap();
        let (fake, state) = FakeToolchain::new(&["0.3.10"], &[]);
        let compiler = VyperCompiler::new(Box::new(fake));

        let contract_types = compiler.compile(&project.sources(), &project).unwrap();
        let names: Vec<&str> = contract_types.iter().map(|c| c.contract_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(contract_types[0].source_id, "contracts/A.vy");
        assert_eq!(
            contract_types[0].dev_messages.as_ref().unwrap()[&2],
            "dev: storage"
        );

        let inputs = &state.lock().inputs;
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0]["language"], json!("Vyper"));
        assert!(inputs[0].get("interfaces").is_none());

        let build = project.load_build().unwrap();
        assert_eq!(build.contract_types.len(), 2);
        assert_eq!(build.compilers.len(), 1);
        assert_eq!(build.compilers[0].version, "0.3.10");
        assert_eq!(build.compilers[0].contract_types, vec!["A", "B"]);
    }

    #[test]
    fn test_dependencies_and_import_remapping() {
        let tmp = TempDir::new().unwrap();
        let dep_root = tmp.path().join("dep");
        write(&dep_root.join("contracts").join("Dep.vy"), "# pragma version 0.3.10\n");
        let dep = Project::load(&dep_root).unwrap();
        let mut dep_type = ContractType::new("Dep");
        dep_type.abi = vec![json!({"type": "function", "name": "foo"})];
        dep.add_build_output(vec![dep_type], vec![]).unwrap();

        let app_root = tmp.path().join("app");
        let mut manifest = ProjectManifest::new("app");
        manifest.add_path_dependency("dep", "local", "../dep");
        manifest.vyper.import_remapping =
            vec![crate::config::Remapping::parse("mydep=dep").unwrap()];
        manifest.save(&app_root).unwrap();
        let project = Project::load(&app_root).unwrap();
        let (fake, _) = FakeToolchain::new(&[], &[]);
        let compiler = VyperCompiler::new(Box::new(fake));

        let deps = compiler.get_dependencies(&project);
        assert_eq!(deps.keys().collect::<Vec<_>>(), vec!["mydep"]);

        let remapping = compiler.get_import_remapping(&project);
        assert_eq!(
            remapping["mydep/Dep.json"],
            json!({"abi": [{"type": "function", "name": "foo"}]})
        );
    }

    #[test]
    fn test_compile_code_isolated() {
        let tmp = TempDir::new().unwrap();
        let project = Project::load(tmp.path()).unwrap();
        let (fake, _) = FakeToolchain::new(&["0.3.10"], &[]);
        let compiler = VyperCompiler::new(Box::new(fake));

        let contract_type = compiler
            .compile_code("# pragma version 0.3.10\nx: uint256\n", &project, Some("Token"))
            .unwrap();
        assert_eq!(contract_type.contract_name, "Token");
        assert!(!project.build_dir().exists());
    }

    #[test]
    fn test_source_vyper_version() {
        let (fake, _) = FakeToolchain::new(&["0.4.0rc1", "0.3.9"], &["0.4.0", "0.3.10"]);
        let compiler = VyperCompiler::new(Box::new(fake));
        assert_eq!(compiler.source_vyper_version("x: uint256").unwrap(), v("0.3.9"));
        assert_eq!(
            compiler.source_vyper_version("# pragma version ^0.3.0\n").unwrap(),
            v("0.3.10")
        );

        let (fake, _) = FakeToolchain::new(&[], &[]);
        let compiler = VyperCompiler::new(Box::new(fake));
        let err = compiler.source_vyper_version("x: uint256").unwrap_err();
        assert_eq!(err.to_string(), "No available version.");
    }
}
