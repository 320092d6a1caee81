//! Compiled contract artifacts
//!
//! The shapes here mirror what the build manifest stores for each contract:
//! ABI, bytecode, AST, source map, PCMap and the `dev:` comments of the source.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single ABI parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    pub fn new(
        name: impl Into<String>,
        ty: impl Into<String>,
    ) -> Self {
        AbiParam {
            name: name.into(),
            ty: ty.into(),
            components: Vec::new(),
        }
    }
}

/// A function entry of an ABI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodAbi {
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default = "default_mutability")]
    pub state_mutability: String,
}

fn function_type() -> String {
    "function".to_string()
}

fn default_mutability() -> String {
    "nonpayable".to_string()
}

impl MethodAbi {
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<AbiParam>,
        outputs: Vec<AbiParam>,
        state_mutability: impl Into<String>,
    ) -> Self {
        MethodAbi {
            kind: function_type(),
            name: name.into(),
            inputs,
            outputs,
            state_mutability: state_mutability.into(),
        }
    }

    /// Parse every function entry out of a raw ABI list, skipping events,
    /// constructors and anything malformed.
    pub fn from_abi(abi: &[Value]) -> Vec<MethodAbi> {
        abi.iter()
            .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("function"))
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect()
    }
}

/// Location and developer message for one program counter.
///
/// `location` is `[line_start, col_start, line_end, col_end]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcMapItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<[Option<u64>; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<String>,
}

impl PcMapItem {
    pub fn located(location: [Option<u64>; 4]) -> Self {
        PcMapItem {
            location: Some(location),
            dev: None,
        }
    }

    pub fn dev(message: impl Into<String>) -> Self {
        PcMapItem {
            location: None,
            dev: Some(message.into()),
        }
    }

    /// Starting line of the location, if any
    pub fn line(&self) -> Option<u64> {
        self.location.and_then(|loc| loc[0])
    }
}

/// Program counter → source information
pub type PcMap = BTreeMap<u64, PcMapItem>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bytecode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<String>,
}

impl Bytecode {
    pub fn new(bytecode: impl Into<String>) -> Self {
        Bytecode {
            bytecode: Some(bytecode.into()),
        }
    }
}

/// A compiled contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractType {
    pub contract_name: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub abi: Vec<Value>,
    #[serde(default)]
    pub deployment_bytecode: Bytecode,
    #[serde(default)]
    pub runtime_bytecode: Bytecode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast: Option<Value>,
    /// Compressed source map as emitted by the compiler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcmap: Option<PcMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userdoc: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devdoc: Option<Value>,
    /// `dev:` comments keyed by 1-based line number
    #[serde(default, rename = "dev_messages", skip_serializing_if = "Option::is_none")]
    pub dev_messages: Option<BTreeMap<u64, String>>,
}

impl ContractType {
    pub fn new(name: impl Into<String>) -> Self {
        ContractType {
            contract_name: name.into(),
            ..Default::default()
        }
    }

    /// Function entries of the ABI
    pub fn methods(&self) -> Vec<MethodAbi> {
        MethodAbi::from_abi(&self.abi)
    }
}

/// A compiler invocation recorded in the build manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compiler {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub contract_types: Vec<String>,
    #[serde(default)]
    pub settings: Value,
}

impl Compiler {
    pub fn new(
        version: impl Into<String>,
        settings: Value,
    ) -> Self {
        Compiler {
            name: "vyper".to_string(),
            version: version.into(),
            contract_types: Vec::new(),
            settings,
        }
    }

    /// Same compiler version with the same settings
    pub fn same_setup(
        &self,
        other: &Compiler,
    ) -> bool {
        self.name == other.name && self.version == other.version && self.settings == other.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_methods_skip_non_functions() {
        let mut contract = ContractType::new("Token");
        contract.abi = vec![
            json!({"type": "event", "name": "Transfer", "inputs": []}),
            json!({
                "type": "function",
                "name": "balanceOf",
                "inputs": [{"name": "owner", "type": "address"}],
                "outputs": [{"name": "", "type": "uint256"}],
                "stateMutability": "view"
            }),
        ];

        let methods = contract.methods();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "balanceOf");
        assert_eq!(methods[0].inputs[0], AbiParam::new("owner", "address"));
        assert_eq!(methods[0].state_mutability, "view");
    }

    #[test]
    fn test_method_serializes_like_abi() {
        let method = MethodAbi::new("foo", vec![AbiParam::new("a", "uint256")], vec![], "pure");
        let value = serde_json::to_value(&method).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["stateMutability"], "pure");
        assert_eq!(value["inputs"][0]["type"], "uint256");
    }

    #[test]
    fn test_contract_type_json_shape() {
        let mut contract = ContractType::new("Foo");
        contract.source_id = "contracts/Foo.vy".to_string();
        let mut pcmap = PcMap::new();
        pcmap.insert(12, PcMapItem::located([Some(3), Some(4), Some(3), Some(20)]));
        pcmap.insert(40, PcMapItem::dev("Integer overflow"));
        contract.pcmap = Some(pcmap);

        let value = serde_json::to_value(&contract).unwrap();
        assert_eq!(value["contractName"], "Foo");
        assert_eq!(value["sourceId"], "contracts/Foo.vy");
        assert_eq!(value["pcmap"]["12"]["location"], json!([3, 4, 3, 20]));
        assert_eq!(value["pcmap"]["40"]["dev"], "Integer overflow");
        assert!(value["pcmap"]["40"].get("location").is_none());

        let back: ContractType = serde_json::from_value(value).unwrap();
        assert_eq!(back, contract);
    }

    #[test]
    fn test_pcmap_item_line() {
        assert_eq!(
            PcMapItem::located([Some(7), None, None, None]).line(),
            Some(7)
        );
        assert_eq!(PcMapItem::dev("x").line(), None);
    }

    #[test]
    fn test_compiler_same_setup() {
        let a = Compiler::new("0.3.10", json!({"optimize": true}));
        let mut b = Compiler::new("0.3.10", json!({"optimize": true}));
        b.contract_types.push("Foo".to_string());
        assert!(a.same_setup(&b));
        let c = Compiler::new("0.3.10", json!({"optimize": "gas"}));
        assert!(!a.same_setup(&c));
    }
}
