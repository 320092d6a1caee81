//! Import resolution
//!
//! Every `import` / `from ... import` line of a source is resolved to a
//! builtin interface, a file of the project, or a file of a dependency.
//! Imports of imports are followed, so the list for a file is transitive.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use crate::error::VyperResult;
use crate::project::{normalize, Dependency, Project};

/// Import prefixes served by the compiler itself
pub const BUILTIN_PREFIXES: [&str; 2] = ["vyper", "ethereum"];

/// Lookup order of imported files
pub const IMPORT_EXTENSIONS: [&str; 3] = [".vy", ".vyi", ".json"];

/// Packages that are never compiled on their own
const DO_NOT_COMPILE: [&str; 1] = ["snekmate"];

/// Dotted module path of an import line, if the line is one.
///
/// - `import a.b as c` → `a.b`
/// - `from a.b import c` → `a.b.c`
/// - `from . import c` → `.c`
pub fn parse_import_line(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix("import ") {
        return rest.split_whitespace().next().map(str::to_string);
    }
    if let Some(rest) = line.strip_prefix("from ") {
        if !line.contains(" import ") {
            return None;
        }
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() < 3 || parts[1] != "import" {
            return None;
        }
        let module = parts[0];
        let name = parts[2].trim_end_matches(',');
        return Some(if module.ends_with('.') {
            format!("{}{}", module, name)
        } else {
            format!("{}.{}", module, name)
        });
    }
    None
}

/// What an import resolved to
#[derive(Debug, Clone)]
pub enum ImportKind {
    /// `vyper.*` / `ethereum.*`, provided by the compiler
    Builtin,
    /// A file of the importing project
    Local { path: PathBuf },
    /// A file of a dependency, imported through `key`
    Dependency {
        key: String,
        dependency: Box<Dependency>,
        path: PathBuf,
    },
    /// Nothing found
    Unresolved,
}

/// A resolved import
#[derive(Debug, Clone)]
pub struct Import {
    /// File containing the import line
    pub importer: PathBuf,
    /// Value as written, e.g. `..interfaces.IFace`
    pub value: String,
    /// Leading dots of the value
    pub dots: usize,
    /// Value without dots, `/` separated
    pub pathified: String,
    /// Source id used in compiler input
    pub source_id: String,
    pub kind: ImportKind,
}

impl Import {
    /// Resolve `value`, imported by `importer` of `project`.
    pub fn resolve(
        project: &Project,
        importer: &Path,
        value: &str,
        dependencies: &BTreeMap<String, Dependency>,
    ) -> Import {
        let stripped = value.trim_start_matches('.');
        let dots = value.len() - stripped.len();
        let pathified = stripped.replace('.', "/");

        let mut import = Import {
            importer: importer.to_path_buf(),
            value: value.to_string(),
            dots,
            pathified: pathified.clone(),
            source_id: pathified.clone(),
            kind: ImportKind::Unresolved,
        };

        if import.is_builtin() {
            import.source_id = format!("{}.json", pathified);
            import.kind = ImportKind::Builtin;
            return import;
        }

        if let Some(path) = import.local_path(project) {
            import.source_id = project.source_id(&path);
            import.kind = ImportKind::Local { path };
            return import;
        }

        if dots == 0 {
            let (key, stem) = match pathified.split_once('/') {
                Some((key, stem)) => (key, stem),
                None => (pathified.as_str(), pathified.as_str()),
            };
            if let Some(dependency) = dependencies.get(key) {
                let folder = dependency.project.contracts_folder();
                let found = IMPORT_EXTENSIONS.iter().find_map(|ext| {
                    let path = folder.join(format!("{}{}", stem, ext));
                    path.is_file().then(|| (path, *ext))
                });
                if let Some((path, ext)) = found {
                    import.source_id = format!("{}/{}{}", key, stem, ext);
                    import.kind = ImportKind::Dependency {
                        key: key.to_string(),
                        dependency: Box::new(dependency.clone()),
                        path,
                    };
                }
            }
        }

        import
    }

    pub fn is_builtin(&self) -> bool {
        BUILTIN_PREFIXES
            .iter()
            .any(|p| self.pathified == *p || self.pathified.starts_with(&format!("{}/", p)))
    }

    pub fn is_local(&self) -> bool {
        matches!(self.kind, ImportKind::Local { .. })
    }

    /// File of the import, if resolved to one
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            ImportKind::Local { path } | ImportKind::Dependency { path, .. } => Some(path),
            _ => None,
        }
    }

    /// First path segment, the dependency key for non-relative imports
    pub fn dependency_name(&self) -> Option<&str> {
        if self.dots > 0 {
            return None;
        }
        self.pathified.split('/').next().filter(|s| !s.is_empty())
    }

    /// Name the flattened interface is given without an alias
    pub fn stem(&self) -> String {
        self.path()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| {
                self.pathified
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
    }

    fn local_path(
        &self,
        project: &Project,
    ) -> Option<PathBuf> {
        let parent = self.importer.parent().unwrap_or(project.path());
        let mut relative = parent.to_path_buf();
        for _ in 1..self.dots.max(1) {
            relative.push("..");
        }
        relative.push(&self.pathified);
        let relative = normalize(&relative);
        let absolute = normalize(&project.path().join(&self.pathified));

        [relative, absolute].into_iter().find_map(|base| {
            IMPORT_EXTENSIONS.iter().find_map(|ext| {
                let candidate = PathBuf::from(format!("{}{}", base.display(), ext));
                candidate.is_file().then_some(candidate)
            })
        })
    }

    /// Re-express a file-backed import found inside a dependency relative to
    /// the importing project, as `<key>/<path in contracts folder>`.
    fn rebased(
        self,
        key: &str,
        dependency: &Dependency,
    ) -> Import {
        let ImportKind::Local { path } = &self.kind else {
            return self;
        };
        let folder = dependency.project.contracts_folder();
        let within = pathdiff::diff_paths(path, &folder).unwrap_or_else(|| path.clone());
        let within = within
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Import {
            source_id: format!("{}/{}", key, within),
            kind: ImportKind::Dependency {
                key: key.to_string(),
                dependency: Box::new(dependency.clone()),
                path: path.clone(),
            },
            ..self
        }
    }
}

/// What the resolver needs from the compiler
pub trait DependencyContext {
    /// Import key → dependency, for `project`
    fn dependencies(
        &self,
        project: &Project,
    ) -> BTreeMap<String, Dependency>;

    /// Compile a dependency so its ABIs are available
    fn compile_dependency(
        &self,
        dependency: &Dependency,
    ) -> VyperResult<()>;
}

type ImportMap = BTreeMap<PathBuf, Vec<Import>>;

/// Caches imports per project and importer
#[derive(Debug, Default)]
pub struct ImportResolver {
    projects: Mutex<HashMap<PathBuf, ImportMap>>,
    attempted_compile: Mutex<HashSet<String>>,
}

impl ImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Imports (transitive) of each of `paths`.
    pub fn get_imports(
        &self,
        project: &Project,
        paths: &[PathBuf],
        ctx: &dyn DependencyContext,
    ) -> ImportMap {
        let dependencies = ctx.dependencies(project);
        let mut result = ImportMap::new();

        for path in paths {
            let cached = self
                .projects
                .lock()
                .get(project.path())
                .and_then(|map| map.get(path).cloned());
            if let Some(imports) = cached {
                result.insert(path.clone(), imports);
                continue;
            }

            // Placeholder first, so import cycles terminate
            self.store(project, path, Vec::new());
            if !path.is_file() {
                result.insert(path.clone(), Vec::new());
                continue;
            }

            let content = std::fs::read_to_string(path).unwrap_or_default();
            let mut imports = Vec::new();
            for line in content.lines() {
                let Some(value) = parse_import_line(line) else {
                    continue;
                };
                let import = Import::resolve(project, path, &value, &dependencies);
                imports.extend(self.sub_imports(project, &import, ctx));
                if matches!(import.kind, ImportKind::Unresolved) {
                    if let Some(name) = import.dependency_name() {
                        error!(
                            "'{}' may not be installed. Could not find it in the project's dependencies.",
                            name
                        );
                    }
                }
                imports.push(import);
            }

            self.store(project, path, imports.clone());
            result.insert(path.clone(), imports);
        }

        result
    }

    fn store(
        &self,
        project: &Project,
        path: &Path,
        imports: Vec<Import>,
    ) {
        self.projects
            .lock()
            .entry(project.path().to_path_buf())
            .or_default()
            .insert(path.to_path_buf(), imports);
    }

    fn sub_imports(
        &self,
        project: &Project,
        import: &Import,
        ctx: &dyn DependencyContext,
    ) -> Vec<Import> {
        match &import.kind {
            ImportKind::Local { path } => {
                let paths = [path.clone()];
                self.get_imports(project, &paths, ctx)
                    .remove(path)
                    .unwrap_or_default()
            }
            ImportKind::Dependency {
                key,
                dependency,
                path,
            } => {
                self.compile_dependency_if_needed(dependency, ctx);
                let paths = [path.clone()];
                self.get_imports(&dependency.project, &paths, ctx)
                    .remove(path)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|sub| sub.rebased(key, dependency))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn compile_dependency_if_needed(
        &self,
        dependency: &Dependency,
        ctx: &dyn DependencyContext,
    ) {
        if DO_NOT_COMPILE.contains(&dependency.name.as_str())
            || !dependency.project.contract_types().is_empty()
        {
            return;
        }
        if !self.attempted_compile.lock().insert(dependency.package_id()) {
            return;
        }
        if let Err(err) = ctx.compile_dependency(dependency) {
            warn!(
                "Failed to compile dependency '{}' @ '{}'.\nReason: {}",
                dependency.name, dependency.version, err
            );
        }
    }

    /// Importer source id → import source ids, without duplicates.
    pub fn import_map(
        &self,
        project: &Project,
        paths: &[PathBuf],
        ctx: &dyn DependencyContext,
    ) -> BTreeMap<String, Vec<String>> {
        self.get_imports(project, paths, ctx)
            .into_iter()
            .map(|(path, imports)| {
                let mut ids: Vec<String> = Vec::new();
                for import in imports {
                    if !ids.contains(&import.source_id) {
                        ids.push(import.source_id);
                    }
                }
                (project.source_id(&path), ids)
            })
            .collect()
    }
}
