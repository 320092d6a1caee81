//! Dependency specification parsing and resolution

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{VyperError, VyperResult};
use crate::project::{git, Project};

/// Version used for dependencies that do not declare one
pub const LOCAL_VERSION: &str = "local";

/// Represents a dependency specification
#[derive(Debug, Clone, PartialEq)]
pub struct DependencySpec {
    /// Package name
    pub name: String,
    /// Version string (a git tag for git dependencies)
    pub version: String,
    /// Optional git URL
    pub git: Option<String>,
    /// Optional local path, relative to the declaring project
    pub path: Option<String>,
}

impl DependencySpec {
    /// Parse a dependency from a TOML value
    ///
    /// Supports two forms:
    /// - String: `"../dep"` -> local path dependency
    /// - Table: `{ version = "0.1.0", path = "..." }` or `{ version = "v1.0.0", git = "..." }`
    pub fn parse(
        name: &str,
        value: &toml::Value,
    ) -> Self {
        match value {
            toml::Value::String(path) => DependencySpec {
                name: name.to_string(),
                version: LOCAL_VERSION.to_string(),
                git: None,
                path: Some(path.clone()),
            },
            toml::Value::Table(table) => {
                let version = table
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or(LOCAL_VERSION)
                    .to_string();
                let git = table
                    .get("git")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                let path = table
                    .get("path")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());

                DependencySpec {
                    name: name.to_string(),
                    version,
                    git,
                    path,
                }
            }
            _ => DependencySpec {
                name: name.to_string(),
                version: LOCAL_VERSION.to_string(),
                git: None,
                path: None,
            },
        }
    }

    /// Parse all dependencies from a BTreeMap (as stored in manifest)
    pub fn parse_all(deps: &BTreeMap<String, toml::Value>) -> Vec<DependencySpec> {
        deps.iter()
            .map(|(name, value)| DependencySpec::parse(name, value))
            .collect()
    }
}

/// A dependency resolved to a loadable project
#[derive(Debug, Clone)]
pub struct Dependency {
    /// Package name
    pub name: String,
    /// Version string
    pub version: String,
    /// The dependency's own project
    pub project: Project,
}

impl Dependency {
    /// Resolve a dependency declared by the project rooted at `root`.
    ///
    /// Path dependencies are loaded in place; git dependencies are cloned
    /// into `.build/dependencies/<name>/<version>` once and reused.
    pub fn resolve(
        spec: &DependencySpec,
        root: &Path,
    ) -> VyperResult<Self> {
        let project_dir = if let Some(ref path) = spec.path {
            root.join(path)
        } else if let Some(ref url) = spec.git {
            let dest = root
                .join(crate::project::BUILD_DIR)
                .join("dependencies")
                .join(&spec.name)
                .join(&spec.version);
            if !dest.is_dir() {
                let reference = (spec.version != LOCAL_VERSION).then_some(spec.version.as_str());
                git::clone_repo(url, reference, &dest)?;
            }
            dest
        } else {
            return Err(VyperError::DependencyNotFound(format!(
                "'{}' has neither a path nor a git source",
                spec.name
            )));
        };

        if !project_dir.is_dir() {
            return Err(VyperError::DependencyNotFound(format!(
                "'{}' ({})",
                spec.name,
                project_dir.display()
            )));
        }

        let project = Project::load_or_default(&project_dir, &spec.name)?;
        Ok(Dependency {
            name: spec.name.clone(),
            version: spec.version.clone(),
            project,
        })
    }

    /// Identifier unique per name and version
    pub fn package_id(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_string_path() {
        let value = toml::Value::String("../dep".to_string());
        let spec = DependencySpec::parse("foo", &value);
        assert_eq!(spec.name, "foo");
        assert_eq!(spec.version, "local");
        assert_eq!(spec.path.as_deref(), Some("../dep"));
        assert!(spec.git.is_none());
    }

    #[test]
    fn test_parse_table_with_path() {
        let value: toml::Value = toml::from_str(r#"version = "0.1.0"
path = "deps/foo""#)
        .unwrap();
        let spec = DependencySpec::parse("foo", &value);
        assert_eq!(spec.version, "0.1.0");
        assert_eq!(spec.path.as_deref(), Some("deps/foo"));
    }

    #[test]
    fn test_parse_table_with_git() {
        let value: toml::Value = toml::from_str(
            r#"version = "v0.1.0"
git = "https://github.com/pcaversaccio/snekmate""#,
        )
        .unwrap();
        let spec = DependencySpec::parse("snekmate", &value);
        assert_eq!(spec.version, "v0.1.0");
        assert_eq!(
            spec.git.as_deref(),
            Some("https://github.com/pcaversaccio/snekmate")
        );
    }

    #[test]
    fn test_parse_all() {
        let mut deps = BTreeMap::new();
        deps.insert("a".to_string(), toml::Value::String("../a".to_string()));
        deps.insert("b".to_string(), toml::Value::String("../b".to_string()));
        let specs = DependencySpec::parse_all(&deps);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "a");
    }

    #[test]
    fn test_resolve_path_dependency() {
        let tmp = TempDir::new().unwrap();
        let dep_dir = tmp.path().join("dep");
        std::fs::create_dir_all(dep_dir.join("contracts")).unwrap();

        let spec = DependencySpec::parse("dep", &toml::Value::String("dep".to_string()));
        let dependency = Dependency::resolve(&spec, tmp.path()).unwrap();
        assert_eq!(dependency.name, "dep");
        assert_eq!(dependency.package_id(), "dep_local");
        assert_eq!(dependency.project.path(), dep_dir.as_path());
    }

    fn git_spec(
        repo: &Path,
        rev: &str,
    ) -> DependencySpec {
        let mut table = toml::value::Table::new();
        table.insert("version".to_string(), toml::Value::String("v1".to_string()));
        table.insert(
            "git".to_string(),
            toml::Value::String(format!("file://{}?rev={}", repo.display(), rev)),
        );
        DependencySpec::parse("dep", &toml::Value::Table(table))
    }

    #[test]
    fn test_resolve_git_rev_is_cloned_once() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        let first = crate::project::git::tests::two_commit_repo(&repo);
        let root = tmp.path().join("app");
        std::fs::create_dir_all(&root).unwrap();

        let spec = git_spec(&repo, &first);
        let dependency = Dependency::resolve(&spec, &root).unwrap();
        let source = dependency.project.contracts_folder().join("V.vy");
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "# old\n");
        assert!(root.join(".build/dependencies/dep/v1").is_dir());

        let again = Dependency::resolve(&spec, &root).unwrap();
        assert_eq!(again.project.path(), dependency.project.path());
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "# old\n");
    }

    #[test]
    fn test_resolve_failed_git_clone_is_not_reused() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        crate::project::git::tests::two_commit_repo(&repo);
        let root = tmp.path().join("app");
        std::fs::create_dir_all(&root).unwrap();

        let spec = git_spec(&repo, "0123456789abcdef0123456789abcdef01234567");
        assert!(Dependency::resolve(&spec, &root).is_err());
        assert!(!root.join(".build/dependencies/dep/v1").exists());
        assert!(Dependency::resolve(&spec, &root).is_err());
    }

    #[test]
    fn test_resolve_missing_path() {
        let tmp = TempDir::new().unwrap();
        let spec = DependencySpec::parse("dep", &toml::Value::String("nope".to_string()));
        assert!(matches!(
            Dependency::resolve(&spec, tmp.path()),
            Err(VyperError::DependencyNotFound(_))
        ));
    }
}
