//! Runtime errors raised by compiled Vyper contracts
//!
//! Vyper does not emit revert strings for its built-in checks. The PCMap tags
//! the program counters of those checks with `dev: <message>`, which
//! [`enrich_error`] turns back into typed errors.

use std::fmt;
use thiserror::Error;

use crate::contract::ContractType;

/// Built-in runtime checks of the Vyper compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeErrorType {
    NonpayableCheck,
    IndexOutOfRange,
    IntegerOverflow,
    IntegerUnderflow,
    DivisionByZero,
    ModuloByZero,
    FallbackNotDefined,
    UserAssert,
    InvalidCalldataOrValue,
}

impl RuntimeErrorType {
    pub const ALL: [RuntimeErrorType; 9] = [
        RuntimeErrorType::NonpayableCheck,
        RuntimeErrorType::IndexOutOfRange,
        RuntimeErrorType::IntegerOverflow,
        RuntimeErrorType::IntegerUnderflow,
        RuntimeErrorType::DivisionByZero,
        RuntimeErrorType::ModuloByZero,
        RuntimeErrorType::FallbackNotDefined,
        RuntimeErrorType::UserAssert,
        RuntimeErrorType::InvalidCalldataOrValue,
    ];

    /// Human readable message
    pub fn message(self) -> &'static str {
        match self {
            RuntimeErrorType::NonpayableCheck => "Cannot send ether to non-payable function",
            RuntimeErrorType::IndexOutOfRange => "Index out of range",
            RuntimeErrorType::IntegerOverflow => "Integer overflow",
            RuntimeErrorType::IntegerUnderflow => "Integer underflow",
            RuntimeErrorType::DivisionByZero => "Division by zero",
            RuntimeErrorType::ModuloByZero => "Modulo by zero",
            RuntimeErrorType::FallbackNotDefined => "Fallback not defined",
            RuntimeErrorType::UserAssert => "User assert",
            RuntimeErrorType::InvalidCalldataOrValue => "Invalid calldata or msg.value",
        }
    }

    /// Upper snake case name, e.g. `INTEGER_OVERFLOW`
    pub fn name(self) -> &'static str {
        match self {
            RuntimeErrorType::NonpayableCheck => "NONPAYABLE_CHECK",
            RuntimeErrorType::IndexOutOfRange => "INDEX_OUT_OF_RANGE",
            RuntimeErrorType::IntegerOverflow => "INTEGER_OVERFLOW",
            RuntimeErrorType::IntegerUnderflow => "INTEGER_UNDERFLOW",
            RuntimeErrorType::DivisionByZero => "DIVISION_BY_ZERO",
            RuntimeErrorType::ModuloByZero => "MODULO_BY_ZERO",
            RuntimeErrorType::FallbackNotDefined => "FALLBACK_NOT_DEFINED",
            RuntimeErrorType::UserAssert => "USER_ASSERT",
            RuntimeErrorType::InvalidCalldataOrValue => "INVALID_CALLDATA_OR_VALUE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn from_message(message: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.message() == message)
    }

    /// Check guarding an arithmetic operator AST type
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "Add" | "Mult" | "Pow" => Some(RuntimeErrorType::IntegerOverflow),
            "Sub" => Some(RuntimeErrorType::IntegerUnderflow),
            "Div" => Some(RuntimeErrorType::DivisionByZero),
            "Mod" => Some(RuntimeErrorType::ModuloByZero),
            _ => None,
        }
    }

    /// `dev: <message>`, as stored in the PCMap
    pub fn dev_message(self) -> String {
        format!("dev: {}", self.message())
    }
}

impl fmt::Display for RuntimeErrorType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A transaction reverted by contract logic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractLogicError {
    /// Revert message, if any
    pub message: String,
    /// `dev:` message of the failing statement
    pub dev_message: Option<String>,
    /// Program counter of the revert
    pub pc: Option<u64>,
}

impl ContractLogicError {
    pub fn new(
        message: impl Into<String>,
        pc: Option<u64>,
    ) -> Self {
        ContractLogicError {
            message: message.into(),
            dev_message: None,
            pc,
        }
    }

    /// Dev message of the revert: the PCMap tag at `pc`, else the `dev:`
    /// comment on the line the PCMap locates.
    pub fn lookup_dev_message(
        &self,
        contract: &ContractType,
    ) -> Option<String> {
        let pc = self.pc?;
        let item = contract.pcmap.as_ref()?.get(&pc)?;
        if let Some(ref dev) = item.dev {
            return Some(dev.clone());
        }
        let line = item.line()?;
        contract.dev_messages.as_ref()?.get(&line).cloned()
    }
}

impl fmt::Display for ContractLogicError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match (&self.dev_message, self.message.is_empty()) {
            (Some(dev), true) => write!(f, "{}", dev),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ContractLogicError {}

/// Typed runtime errors; anything not recognised stays a [`ContractLogicError`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VyperRuntimeError {
    #[error("Cannot send ether to non-payable function")]
    NonPayable(ContractLogicError),

    #[error("Index out of range")]
    IndexOutOfRange(ContractLogicError),

    #[error("Integer overflow")]
    IntegerOverflow(ContractLogicError),

    #[error("Integer underflow")]
    IntegerUnderflow(ContractLogicError),

    #[error("Division by zero")]
    DivisionByZero(ContractLogicError),

    #[error("Modulo by zero")]
    ModuloByZero(ContractLogicError),

    #[error("Fallback not defined")]
    FallbackNotDefined(ContractLogicError),

    #[error("Invalid calldata or msg.value")]
    InvalidCalldataOrValue(ContractLogicError),

    #[error("{0}")]
    Logic(ContractLogicError),
}

impl VyperRuntimeError {
    /// The underlying revert
    pub fn inner(&self) -> &ContractLogicError {
        match self {
            VyperRuntimeError::NonPayable(e)
            | VyperRuntimeError::IndexOutOfRange(e)
            | VyperRuntimeError::IntegerOverflow(e)
            | VyperRuntimeError::IntegerUnderflow(e)
            | VyperRuntimeError::DivisionByZero(e)
            | VyperRuntimeError::ModuloByZero(e)
            | VyperRuntimeError::FallbackNotDefined(e)
            | VyperRuntimeError::InvalidCalldataOrValue(e)
            | VyperRuntimeError::Logic(e) => e,
        }
    }

    /// The runtime check that failed, if recognised
    pub fn error_type(&self) -> Option<RuntimeErrorType> {
        match self {
            VyperRuntimeError::NonPayable(_) => Some(RuntimeErrorType::NonpayableCheck),
            VyperRuntimeError::IndexOutOfRange(_) => Some(RuntimeErrorType::IndexOutOfRange),
            VyperRuntimeError::IntegerOverflow(_) => Some(RuntimeErrorType::IntegerOverflow),
            VyperRuntimeError::IntegerUnderflow(_) => Some(RuntimeErrorType::IntegerUnderflow),
            VyperRuntimeError::DivisionByZero(_) => Some(RuntimeErrorType::DivisionByZero),
            VyperRuntimeError::ModuloByZero(_) => Some(RuntimeErrorType::ModuloByZero),
            VyperRuntimeError::FallbackNotDefined(_) => Some(RuntimeErrorType::FallbackNotDefined),
            VyperRuntimeError::InvalidCalldataOrValue(_) => {
                Some(RuntimeErrorType::InvalidCalldataOrValue)
            }
            VyperRuntimeError::Logic(_) => None,
        }
    }
}

/// Attach the dev message of `err` and map Vyper's built-in checks to
/// typed errors.
pub fn enrich_error(
    mut err: ContractLogicError,
    contract: &ContractType,
) -> VyperRuntimeError {
    if err.dev_message.is_none() {
        err.dev_message = err.lookup_dev_message(contract);
    }

    let error_type = err
        .dev_message
        .as_deref()
        .map(|dev| dev.strip_prefix("dev:").unwrap_or(dev).trim())
        .and_then(RuntimeErrorType::from_message);

    match error_type {
        Some(RuntimeErrorType::NonpayableCheck) => VyperRuntimeError::NonPayable(err),
        Some(RuntimeErrorType::IndexOutOfRange) => VyperRuntimeError::IndexOutOfRange(err),
        Some(RuntimeErrorType::IntegerOverflow) => VyperRuntimeError::IntegerOverflow(err),
        Some(RuntimeErrorType::IntegerUnderflow) => VyperRuntimeError::IntegerUnderflow(err),
        Some(RuntimeErrorType::DivisionByZero) => VyperRuntimeError::DivisionByZero(err),
        Some(RuntimeErrorType::ModuloByZero) => VyperRuntimeError::ModuloByZero(err),
        Some(RuntimeErrorType::FallbackNotDefined) => VyperRuntimeError::FallbackNotDefined(err),
        Some(RuntimeErrorType::InvalidCalldataOrValue) => {
            VyperRuntimeError::InvalidCalldataOrValue(err)
        }
        Some(RuntimeErrorType::UserAssert) | None => VyperRuntimeError::Logic(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{PcMap, PcMapItem};
    use std::collections::BTreeMap;

    fn contract() -> ContractType {
        let mut pcmap = PcMap::new();
        pcmap.insert(10, PcMapItem::dev(RuntimeErrorType::IntegerOverflow.dev_message()));
        pcmap.insert(20, PcMapItem::located([Some(5), Some(4), Some(5), Some(30)]));
        pcmap.insert(30, PcMapItem::dev(RuntimeErrorType::UserAssert.dev_message()));
        pcmap.insert(40, PcMapItem::located([Some(9), Some(4), Some(9), Some(30)]));

        let mut dev_messages = BTreeMap::new();
        dev_messages.insert(5, "dev: only owner".to_string());

        let mut contract = ContractType::new("Foo");
        contract.pcmap = Some(pcmap);
        contract.dev_messages = Some(dev_messages);
        contract
    }

    #[test]
    fn test_runtime_error_type_lookups() {
        for t in RuntimeErrorType::ALL {
            assert_eq!(RuntimeErrorType::from_name(t.name()), Some(t));
            assert_eq!(RuntimeErrorType::from_message(t.message()), Some(t));
        }
        assert_eq!(
            RuntimeErrorType::from_operator("Mult"),
            Some(RuntimeErrorType::IntegerOverflow)
        );
        assert_eq!(RuntimeErrorType::from_operator("BitAnd"), None);
        assert_eq!(
            RuntimeErrorType::DivisionByZero.dev_message(),
            "dev: Division by zero"
        );
    }

    #[test]
    fn test_enrich_builtin_check() {
        let err = ContractLogicError::new("", Some(10));
        let enriched = enrich_error(err, &contract());
        assert!(matches!(enriched, VyperRuntimeError::IntegerOverflow(_)));
        assert_eq!(enriched.to_string(), "Integer overflow");
        assert_eq!(
            enriched.inner().dev_message.as_deref(),
            Some("dev: Integer overflow")
        );
    }

    #[test]
    fn test_enrich_dev_comment() {
        let err = ContractLogicError::new("", Some(20));
        let enriched = enrich_error(err, &contract());
        assert!(matches!(enriched, VyperRuntimeError::Logic(_)));
        assert_eq!(enriched.to_string(), "dev: only owner");
    }

    #[test]
    fn test_enrich_user_assert_stays_logic() {
        let err = ContractLogicError::new("not allowed", Some(30));
        let enriched = enrich_error(err, &contract());
        assert!(matches!(enriched, VyperRuntimeError::Logic(_)));
        assert_eq!(enriched.error_type(), None);
        assert_eq!(enriched.to_string(), "not allowed");
    }

    #[test]
    fn test_enrich_unknown_pc() {
        let err = ContractLogicError::new("boom", Some(999));
        let enriched = enrich_error(err.clone(), &contract());
        assert_eq!(enriched, VyperRuntimeError::Logic(err));

        let no_line = ContractLogicError::new("boom", Some(40));
        let enriched = enrich_error(no_line, &contract());
        assert!(enriched.inner().dev_message.is_none());
    }

    #[test]
    fn test_existing_dev_message_kept() {
        let mut err = ContractLogicError::new("", Some(20));
        err.dev_message = Some("dev: Modulo by zero".to_string());
        let enriched = enrich_error(err, &contract());
        assert_eq!(enriched.error_type(), Some(RuntimeErrorType::ModuloByZero));
    }
}
