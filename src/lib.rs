//! Vyper compiler plugin
//!
//! Drives an external Vyper toolchain (managed through VVM) for a project:
//! picks a compiler version per source, resolves imports and dependencies,
//! runs `vyper --standard-json` and turns the output into contract types
//! with ABIs, bytecode, source maps and PCMaps.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use vyper_plugin::{compile_project, Result};
//!
//! fn main() -> Result<()> {
//!     let contract_types = compile_project(Path::new("."))?;
//!     println!("{} contract(s)", contract_types.len());
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod ast;
pub mod compiler;
pub mod config;
pub mod contract;
pub mod error;
pub mod flattener;
pub mod imports;
pub mod interface;
pub mod pragma;
pub mod project;
pub mod runtime_error;
pub mod sourcemap;
pub mod version;
pub mod vvm;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use compiler::VyperCompiler;
pub use contract::ContractType;
pub use error::{VyperError, VyperResult};
pub use project::Project;
pub use version::{SpecifierSet, Version};

use std::path::{Path, PathBuf};
use tracing::debug;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Plugin name
pub const NAME: &str = "vyper-plugin";

/// Compiler using the user's VVM configuration
pub fn default_compiler() -> VyperCompiler {
    let config = util::config::load_user_config().unwrap_or_default();
    VyperCompiler::with_vvm(&config)
}

/// `.vy` sources of the project's contracts folder
pub fn contract_sources(project: &Project) -> Vec<PathBuf> {
    project
        .sources()
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "vy"))
        .collect()
}

/// Compile every contract of the project rooted at `dir`.
pub fn compile_project(dir: &Path) -> Result<Vec<ContractType>> {
    let project = Project::load(dir)
        .with_context(|| format!("Failed to load project: {}", dir.display()))?;
    let sources = contract_sources(&project);
    debug!("Found {} source(s) in '{}'.", sources.len(), dir.display());
    let contract_types = default_compiler().compile(&sources, &project)?;
    Ok(contract_types)
}
