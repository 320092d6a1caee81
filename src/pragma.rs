//! Source pragma extraction
//!
//! Vyper sources declare their compiler requirements in comments:
//!
//! ```text
//! # @version ^0.3.0          (before 0.3.10)
//! # pragma version ~=0.4.0   (0.3.10 and later)
//! #pragma optimize codesize
//! #pragma evm-version paris
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::project::Project;
use crate::version::{pragma_str_to_specifier_set, SpecifierSet};

static VERSION_PRAGMA_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?:\n|^)\s*#\s*@version\s*([^\n]*)").expect("pragma pattern is valid"),
        Regex::new(r"(?:\n|^)\s*#\s*pragma\s+version\s*([^\n]*)")
            .expect("pragma pattern is valid"),
    ]
});

static OPTIMIZE_PRAGMA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\n|^)\s*#pragma\s+optimize\s+([^\n]*)").expect("pragma pattern is valid")
});

static EVM_VERSION_PRAGMA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\n|^)\s*#pragma\s+evm-version\s+([^\n]*)").expect("pragma pattern is valid")
});

/// Value of the `optimize` setting: a boolean (pre 0.3.10) or a mode name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Optimization {
    /// `true` / `false`
    Enabled(bool),
    /// `gas`, `codesize` or `none`
    Mode(String),
}

impl Optimization {
    /// Parse a settings-key fragment, turning `true`/`false` back into booleans.
    pub fn from_key(s: &str) -> Self {
        match s {
            "true" => Optimization::Enabled(true),
            "false" => Optimization::Enabled(false),
            other => Optimization::Mode(other.to_string()),
        }
    }
}

impl std::fmt::Display for Optimization {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Optimization::Enabled(b) => write!(f, "{}", b),
            Optimization::Mode(mode) => write!(f, "{}", mode),
        }
    }
}

/// Extract the version specifier from source code.
///
/// Returns `None` when no pragma is present or when the pragma cannot be
/// parsed (a warning is logged in that case).
pub fn version_pragma_spec(source: &str) -> Option<SpecifierSet> {
    for pattern in VERSION_PRAGMA_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(source) {
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            return match pragma_str_to_specifier_set(raw) {
                Ok(spec) if !spec.is_empty() => Some(spec),
                _ => {
                    warn!("Invalid pragma spec: '{}'. Trying latest.", raw);
                    None
                }
            };
        }
    }
    None
}

/// Same as [`version_pragma_spec`], reading the source from a file.
pub fn version_pragma_spec_from_path(path: &Path) -> Option<SpecifierSet> {
    let source = std::fs::read_to_string(path).ok()?;
    version_pragma_spec(&source)
}

/// Extract the `#pragma optimize` value.
pub fn optimization_pragma(source: &str) -> Option<String> {
    OPTIMIZE_PRAGMA_PATTERN
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Extract the `#pragma evm-version` value.
pub fn evm_version_pragma(source: &str) -> Option<String> {
    EVM_VERSION_PRAGMA_PATTERN
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Optimization per source id, falling back to `default` for files without a pragma.
pub fn optimization_pragma_map(
    paths: &[PathBuf],
    project: &Project,
    default: &Optimization,
) -> BTreeMap<String, Optimization> {
    paths
        .iter()
        .map(|path| {
            let pragma = std::fs::read_to_string(path)
                .ok()
                .and_then(|source| optimization_pragma(&source));
            let value = pragma.map(Optimization::Mode).unwrap_or_else(|| default.clone());
            (project.source_id(path), value)
        })
        .collect()
}

/// EVM version per source id, for files declaring one.
pub fn evm_version_pragma_map(
    paths: &[PathBuf],
    project: &Project,
) -> BTreeMap<String, String> {
    paths
        .iter()
        .filter_map(|path| {
            let source = std::fs::read_to_string(path).ok()?;
            let pragma = evm_version_pragma(&source)?;
            Some((project.source_id(path), pragma))
        })
        .collect()
}
