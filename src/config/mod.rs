//! `[vyper]` configuration
//!
//! ```toml
//! [vyper]
//! version = "0.3.10"
//! evm_version = "paris"
//! import_remapping = ["dep_a=dependency_a@0.1.1", "dep_b=dependency"]
//! enable_decimals = true
//! output_format = ["abi", "evm.bytecode", "evm.deployedBytecode"]
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{VyperError, VyperResult};
use crate::version::{pragma_str_to_specifier_set, SpecifierSet};

/// Per-project compiler configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VyperConfig {
    /// Version to use for all files, regardless of pragma.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_version",
        deserialize_with = "deserialize_version"
    )]
    pub version: Option<SpecifierSet>,

    /// The evm-version or hard-fork name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_version: Option<String>,

    /// Import names mapped to dependencies. Use `@` to pick a dependency
    /// version; without one the dependency must have a single version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_remapping: Vec<Remapping>,

    /// Output selection requested for every compiled source.
    #[serde(default = "default_output_format")]
    pub output_format: Vec<String>,

    /// Vyper 0.4 requires opting in to decimal types. `None` leaves the
    /// setting out entirely, so older versions are unaffected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_decimals: Option<bool>,
}

fn default_output_format() -> Vec<String> {
    vec!["*".to_string()]
}

fn serialize_version<S: Serializer>(
    value: &Option<SpecifierSet>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(spec) => serializer.collect_str(spec),
        None => serializer.serialize_none(),
    }
}

fn deserialize_version<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SpecifierSet>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| pragma_str_to_specifier_set(&s).map_err(serde::de::Error::custom))
        .transpose()
}

impl VyperConfig {
    /// Output selection, never empty.
    pub fn output_selection(&self) -> Vec<String> {
        if self.output_format.is_empty() {
            default_output_format()
        } else {
            self.output_format.clone()
        }
    }
}

/// An import name mapped to a dependency, written `key=name[@version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapping {
    /// The name used in `import` statements
    pub key: String,
    /// Dependency name
    pub dependency_name: String,
    /// Dependency version, if pinned
    pub dependency_version: Option<String>,
}

impl Remapping {
    /// Parse a `key=name[@version]` string.
    pub fn parse(value: &str) -> VyperResult<Self> {
        let invalid = || VyperError::InvalidRemapping(value.to_string());
        let (key, target) = value.split_once('=').ok_or_else(invalid)?;
        let key = key.trim();
        let target = target.trim();

        let (name, version) = match target.split_once('@') {
            Some((name, version)) => (name.trim(), Some(version.trim().to_string())),
            None => (target, None),
        };

        if key.is_empty() || name.is_empty() {
            return Err(invalid());
        }

        Ok(Remapping {
            key: key.to_string(),
            dependency_name: name.to_string(),
            dependency_version: version.filter(|v| !v.is_empty()),
        })
    }
}

impl fmt::Display for Remapping {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}={}", self.key, self.dependency_name)?;
        if let Some(ref version) = self.dependency_version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for Remapping {
    type Err = VyperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Remapping::parse(s)
    }
}

impl Serialize for Remapping {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Remapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Remapping::parse(&s).map_err(serde::de::Error::custom)
    }
}
