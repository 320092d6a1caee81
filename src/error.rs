//! Vyper plugin error types

use std::path::PathBuf;
use thiserror::Error;

use crate::project::manifest::MANIFEST_FILE;

/// Errors raised while managing, invoking or post-processing the Vyper compiler.
#[derive(Debug, Error)]
pub enum VyperError {
    /// Installing (or finding an installable) Vyper version failed
    #[error("{0}")]
    Install(String),

    /// The compiler rejected the input; carries its diagnostics verbatim
    #[error("{0}")]
    Compile(String),

    /// A version string could not be parsed
    #[error("Invalid version: '{0}'")]
    InvalidVersion(String),

    /// A version specifier could not be parsed
    #[error("Invalid version specifier: '{0}'")]
    InvalidSpecifier(String),

    /// An `import_remapping` entry is not of the form `key=name[@version]`
    #[error("Invalid import remapping: '{0}'")]
    InvalidRemapping(String),

    /// No manifest in the given directory
    #[error("Not a Vyper project: {} not found in {}", MANIFEST_FILE, .0.display())]
    NotProject(PathBuf),

    /// Invalid manifest format
    #[error("Invalid {} format: {}", MANIFEST_FILE, .0)]
    InvalidManifest(String),

    /// Dependency not declared or not resolvable
    #[error("Dependency not found: {0}")]
    DependencyNotFound(String),

    /// Source file missing
    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Compiler output did not have the expected shape
    #[error("Unexpected compiler output: {0}")]
    Output(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization/deserialization error
    #[error("TOML parse error: {0}")]
    Toml(String),
}

impl VyperError {
    /// Wrap an installation failure for a specific version.
    pub fn install_failed(
        version: impl std::fmt::Display,
        reason: impl std::fmt::Display,
    ) -> Self {
        VyperError::Install(format!(
            "Unable to install Vyper version: '{}'.\nReason: {}",
            version, reason
        ))
    }
}

impl From<toml::de::Error> for VyperError {
    fn from(e: toml::de::Error) -> Self {
        VyperError::Toml(e.to_string())
    }
}

impl From<toml::ser::Error> for VyperError {
    fn from(e: toml::ser::Error) -> Self {
        VyperError::Toml(e.to_string())
    }
}

/// Result type for plugin operations
pub type VyperResult<T> = Result<T, VyperError>;
