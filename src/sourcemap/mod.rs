//! Source maps and PCMaps
//!
//! Compilers after 0.3.7 emit a `pc_pos_map` and an `error_map` directly;
//! older ones only give a compressed source map, so the PCMap is rebuilt by
//! walking the opcodes against the AST.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::ast::AstNode;
use crate::contract::{PcMap, PcMapItem};
use crate::runtime_error::RuntimeErrorType;

/// One entry of a compressed source map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMapItem {
    pub start: Option<u64>,
    pub length: Option<u64>,
    pub contract_index: Option<u64>,
    pub jump_code: String,
}

/// Decompress an `s:l:f:j;...` source map.
///
/// Empty fields repeat the previous entry and `-1` marks an absent value.
pub fn parse_source_map(raw: &str) -> Vec<SourceMapItem> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut previous = SourceMapItem::default();

    for row in raw.split(';') {
        let fields: Vec<&str> = row.split(':').collect();
        let number = |idx: usize, prev: Option<u64>| -> Option<u64> {
            match fields.get(idx).map(|s| s.trim()) {
                None | Some("") => prev,
                Some(value) => match value.parse::<i64>() {
                    Ok(n) if n >= 0 => Some(n as u64),
                    _ => None,
                },
            }
        };

        let item = SourceMapItem {
            start: number(0, previous.start),
            length: number(1, previous.length),
            contract_index: number(2, previous.contract_index),
            jump_code: match fields.get(3).map(|s| s.trim()) {
                None | Some("") => previous.jump_code.clone(),
                Some(j) => j.to_string(),
            },
        };
        items.push(item.clone());
        previous = item;
    }

    items
}

/// Compressed source map string of a `deployedBytecode` entry: 0.4 nests
/// it under `sourceMap.pc_pos_map_compressed`.
pub fn compressed_source_map(
    source_map: &Value,
    nested: bool,
) -> Option<String> {
    if nested {
        source_map
            .get("pc_pos_map_compressed")
            .and_then(Value::as_str)
            .map(str::to_string)
    } else {
        source_map.as_str().map(str::to_string)
    }
}

/// PCMap from the `pc_pos_map` and `error_map` of a `deployedBytecode`
/// entry (Vyper > 0.3.7).
pub fn get_pcmap(bytecode: &Value) -> PcMap {
    let Some(src_info) = bytecode
        .get("sourceMapFull")
        .filter(|v| v.is_object())
        .or_else(|| bytecode.get("sourceMap").filter(|v| v.is_object()))
    else {
        return PcMap::new();
    };

    let mut pcmap: PcMap = src_info
        .get("pc_pos_map")
        .and_then(Value::as_object)
        .map(|positions| {
            positions
                .iter()
                .filter_map(|(pc, loc)| Some((pc.parse::<u64>().ok()?, parse_location(loc)?)))
                .map(|(pc, loc)| (pc, PcMapItem::located(loc)))
                .collect()
        })
        .unwrap_or_default();

    if pcmap.is_empty() {
        return pcmap;
    }

    let errors: BTreeMap<u64, String> = src_info
        .get("error_map")
        .and_then(Value::as_object)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|(pc, err)| Some((pc.parse().ok()?, err.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default();

    for (err_pc, error_type) in errors {
        let (error_str, use_location) = classify_error(&error_type);
        let dev = format!("dev: {}", error_str);

        if let Some(item) = pcmap.get_mut(&err_pc) {
            item.dev = Some(dev);
            continue;
        }

        let location = if use_location {
            pcmap
                .range(..=err_pc)
                .rev()
                .find(|(_, item)| item.dev.is_none() && item.location.is_some())
                .and_then(|(_, item)| item.location)
        } else {
            None
        };
        pcmap.insert(
            err_pc,
            PcMapItem {
                location,
                dev: Some(dev),
            },
        );
    }

    pcmap
}

fn parse_location(value: &Value) -> Option<[Option<u64>; 4]> {
    let items = value.as_array()?;
    let mut location = [None; 4];
    for (slot, item) in location.iter_mut().zip(items) {
        *slot = item.as_u64();
    }
    Some(location)
}

/// Error text and whether the error has a source location
fn classify_error(error_type: &str) -> (String, bool) {
    let lower = error_type.to_lowercase();
    let known = if error_type.contains("safemul")
        || error_type.contains("safeadd")
        || error_type.contains("bounds check")
    {
        Some(RuntimeErrorType::IntegerOverflow)
    } else if error_type.contains("safesub") || error_type.contains("clamp") {
        Some(RuntimeErrorType::IntegerUnderflow)
    } else if error_type.contains("safediv") {
        Some(RuntimeErrorType::DivisionByZero)
    } else if error_type.contains("safemod") {
        Some(RuntimeErrorType::ModuloByZero)
    } else if lower.contains("user assert") || lower.contains("user revert") {
        Some(RuntimeErrorType::UserAssert)
    } else if error_type.contains("fallback function") {
        return (RuntimeErrorType::FallbackNotDefined.message().to_string(), false);
    } else if error_type.contains("bad calldatasize or callvalue") {
        Some(RuntimeErrorType::InvalidCalldataOrValue)
    } else if error_type.contains("nonpayable check") {
        Some(RuntimeErrorType::NonpayableCheck)
    } else {
        None
    };

    match known {
        Some(t) => (t.message().to_string(), true),
        None => {
            let name = error_type.to_uppercase().replace(' ', "_");
            let message = RuntimeErrorType::from_name(&name)
                .map(|t| t.message().to_string())
                .unwrap_or(name);
            (message, false)
        }
    }
}

const REVERT_TAIL: [&str; 5] = ["JUMPDEST", "PUSH1", "0x00", "DUP1", "REVERT"];
const FALLBACK_WINDOW: [&str; 7] = [
    "JUMPDEST",
    "PUSH1",
    "0x00",
    "CALLDATALOAD",
    "PUSH1",
    "0xE0",
    "SHR",
];

fn push_size(op: &str) -> Option<u64> {
    op.strip_prefix("PUSH")
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
}

/// PCMap for Vyper <= 0.3.7, rebuilt from the AST, the decompressed source
/// map (one item per instruction) and the space-separated opcodes.
///
/// PCs are byte offsets of instruction starts.
pub fn get_legacy_pcmap(
    ast: &AstNode,
    src_map: &[SourceMapItem],
    opcodes: &[String],
) -> PcMap {
    // Decode instructions: (pc, op, push data)
    let mut instructions: Vec<(u64, &str, Option<&str>)> = Vec::new();
    let mut pc = 0u64;
    let mut idx = 0;
    while idx < opcodes.len() {
        let op = opcodes[idx].as_str();
        idx += 1;
        let start = pc;
        pc += 1;
        let mut data = None;
        if let Some(size) = push_size(op) {
            data = opcodes.get(idx).map(String::as_str);
            idx += 1;
            pc += size;
        }
        instructions.push((start, op, data));
    }

    // Shared `JUMPDEST PUSH1 0x00 DUP1 REVERT` block at the end of the code
    let revert_pc = if opcodes.len() >= REVERT_TAIL.len()
        && opcodes[opcodes.len() - REVERT_TAIL.len()..]
            .iter()
            .map(String::as_str)
            .eq(REVERT_TAIL)
    {
        pc.checked_sub(5)
    } else {
        None
    };

    let mut pcmap = PcMap::new();
    let mut last_located: Option<u64> = None;
    let mut last_value: Option<u64> = None;
    let mut nonpayable_tagged = false;
    let mut fallback_tagged = false;

    for (i, &(pc, op, data)) in instructions.iter().enumerate() {
        if !fallback_tagged && op == "SHR" && i >= 4 {
            // Four instructions, seven tokens: JUMPDEST, PUSH1 0x00, CALLDATALOAD, PUSH1 0xE0, SHR
            let window = &instructions[i - 4..=i];
            let tokens: Vec<&str> = window
                .iter()
                .flat_map(|(_, op, data)| std::iter::once(*op).chain(*data))
                .collect();
            if tokens.iter().map(|t| t.to_uppercase()).eq(FALLBACK_WINDOW
                .iter()
                .map(|t| t.to_uppercase()))
            {
                pcmap.insert(
                    window[0].0,
                    PcMapItem::dev(RuntimeErrorType::FallbackNotDefined.dev_message()),
                );
                fallback_tagged = true;
            }
        }

        let jumps_to_revert = op == "JUMPI" && revert_pc.is_some() && last_value == revert_pc;

        if !nonpayable_tagged && jumps_to_revert && i >= 2 && instructions[i - 2].1 == "CALLVALUE"
        {
            pcmap.insert(
                pc,
                PcMapItem::dev(RuntimeErrorType::NonpayableCheck.dev_message()),
            );
            nonpayable_tagged = true;
        } else {
            let src = src_map.get(i);
            let located = src.and_then(|s| Some((s.start?, s.length?)));

            match located {
                Some((start, length)) => {
                    let node = ast.get_node(start, length);
                    let mut item = PcMapItem {
                        location: node.map(AstNode::line_numbers),
                        dev: None,
                    };
                    if op == "REVERT" || jumps_to_revert {
                        item.dev = Some(statement_error(node).dev_message());
                    }
                    if item.location.is_some() || item.dev.is_some() {
                        pcmap.insert(pc, item);
                        if pcmap[&pc].location.is_some() {
                            last_located = Some(pc);
                        }
                    }
                }
                None if op == "REVERT" => {
                    if let Some(item) = last_located.and_then(|lpc| pcmap.get_mut(&lpc)) {
                        if item.dev.is_none() {
                            item.dev = Some(RuntimeErrorType::UserAssert.dev_message());
                        }
                    }
                }
                None => {}
            }
        }

        last_value = data.and_then(parse_hex);
    }

    pcmap
}

fn parse_hex(s: &str) -> Option<u64> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

/// Runtime check guarding a statement
fn statement_error(node: Option<&AstNode>) -> RuntimeErrorType {
    let Some(node) = node else {
        return RuntimeErrorType::UserAssert;
    };
    for candidate in node.iter() {
        match candidate.ast_type.as_str() {
            "BinOp" | "AugAssign" => {
                if let Some(t) = candidate.op.as_deref().and_then(RuntimeErrorType::from_operator) {
                    return t;
                }
            }
            "Subscript" => return RuntimeErrorType::IndexOutOfRange,
            _ => {}
        }
    }
    RuntimeErrorType::UserAssert
}

static DEV_MSG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*\s*#\s*(dev:.+)").expect("dev message pattern is valid"));

/// `dev:` comments keyed by 1-based line number
pub fn dev_messages(content: &str) -> BTreeMap<u64, String> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let caps = DEV_MSG_PATTERN.captures(line)?;
            Some((idx as u64 + 1, caps.get(1)?.as_str().trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_source_map_inherits() {
        let items = parse_source_map("1:2:0:-;:3;5::1:i;;-1:-1:-1:o");
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].start, Some(1));
        assert_eq!(items[0].length, Some(2));
        assert_eq!(items[0].jump_code, "-");
        assert_eq!(items[1].start, Some(1));
        assert_eq!(items[1].length, Some(3));
        assert_eq!(items[2].start, Some(5));
        assert_eq!(items[2].length, Some(3));
        assert_eq!(items[2].contract_index, Some(1));
        assert_eq!(items[3], items[2]);
        assert_eq!(items[4].start, None);
        assert_eq!(items[4].jump_code, "o");
    }

    #[test]
    fn test_parse_empty_source_map() {
        assert!(parse_source_map("").is_empty());
    }

    #[test]
    fn test_compressed_source_map() {
        let nested = json!({"pc_pos_map_compressed": "1:2:0:-", "pc_pos_map": {}});
        assert_eq!(
            compressed_source_map(&nested, true).as_deref(),
            Some("1:2:0:-")
        );
        assert_eq!(
            compressed_source_map(&json!("3:4:0:-"), false).as_deref(),
            Some("3:4:0:-")
        );
        assert!(compressed_source_map(&json!("x"), true).is_none());
    }

    #[test]
    fn test_get_pcmap() {
        let bytecode = json!({
            "sourceMap": {
                "pc_pos_map": {
                    "10": [4, 4, 4, 20],
                    "20": [7, 8, 7, 30]
                },
                "error_map": {
                    "20": "safeadd",
                    "25": "safediv",
                    "30": "fallback function",
                    "40": "user revert with reason",
                    "50": "some weird check"
                }
            }
        });

        let pcmap = get_pcmap(&bytecode);
        assert_eq!(pcmap[&10].location, Some([Some(4), Some(4), Some(4), Some(20)]));
        assert_eq!(pcmap[&20].dev.as_deref(), Some("dev: Integer overflow"));
        assert_eq!(pcmap[&25].dev.as_deref(), Some("dev: Division by zero"));
        assert_eq!(pcmap[&25].location, pcmap[&10].location);
        assert_eq!(pcmap[&30].dev.as_deref(), Some("dev: Fallback not defined"));
        assert_eq!(pcmap[&30].location, None);
        assert_eq!(pcmap[&40].dev.as_deref(), Some("dev: User assert"));
        assert_eq!(pcmap[&50].dev.as_deref(), Some("dev: SOME_WEIRD_CHECK"));
        assert_eq!(pcmap[&50].location, None);
    }

    #[test]
    fn test_get_pcmap_prefers_full_map() {
        let bytecode = json!({
            "sourceMap": "1:2:0",
            "sourceMapFull": {"pc_pos_map": {"3": [1, 0, 1, 5]}, "error_map": {}}
        });
        let pcmap = get_pcmap(&bytecode);
        assert_eq!(pcmap.len(), 1);
        assert!(get_pcmap(&json!({"sourceMap": "1:2:0"})).is_empty());
    }

    #[test]
    fn test_classify_known_name() {
        let (msg, loc) = classify_error("index out of range");
        assert_eq!(msg, "Index out of range");
        assert!(!loc);
    }

    fn ops(s: &str) -> Vec<String> {
        s.split(' ').map(str::to_string).collect()
    }

    fn legacy_ast() -> AstNode {
        AstNode::from_json(&json!({
            "ast_type": "Module",
            "src": "0:200:0",
            "body": [{
                "ast_type": "FunctionDef",
                "src": "0:100:0",
                "lineno": 3, "col_offset": 0, "end_lineno": 6, "end_col_offset": 0,
                "body": [
                    {
                        "ast_type": "AugAssign",
                        "src": "30:10:0",
                        "lineno": 4, "col_offset": 4, "end_lineno": 4, "end_col_offset": 14,
                        "op": {"ast_type": "Add", "src": "30:10:0"}
                    },
                    {
                        "ast_type": "Assert",
                        "src": "50:20:0",
                        "lineno": 5, "col_offset": 4, "end_lineno": 5, "end_col_offset": 24
                    }
                ]
            }]
        }))
        .unwrap()
    }

    fn item(
        start: i64,
        length: i64,
    ) -> SourceMapItem {
        SourceMapItem {
            start: (start >= 0).then_some(start as u64),
            length: (length >= 0).then_some(length as u64),
            contract_index: Some(0),
            jump_code: "-".to_string(),
        }
    }

    #[test]
    fn test_legacy_pcmap() {
        // pc: 0 CALLVALUE, 1 PUSH1 0x0e, 3 JUMPI, 4 ADD, 5 PUSH1 0x0e, 7 JUMPI,
        //     8 PUSH1 0x00, 10 REVERT, 11 REVERT, 12 STOP, 13 STOP,
        //     14 JUMPDEST, 15 PUSH1 0x00, 17 DUP1, 18 REVERT
        let opcodes = ops(
            "CALLVALUE PUSH1 0x0E JUMPI ADD PUSH1 0x0E JUMPI PUSH1 0x00 REVERT REVERT STOP STOP \
             JUMPDEST PUSH1 0x00 DUP1 REVERT",
        );
        let src_map = vec![
            item(-1, -1), // CALLVALUE
            item(-1, -1), // PUSH1
            item(-1, -1), // JUMPI
            item(30, 10), // ADD
            item(30, 10), // PUSH1
            item(30, 10), // JUMPI -> revert block
            item(50, 20), // PUSH1
            item(50, 20), // REVERT
            item(-1, -1), // REVERT without source
        ];

        let pcmap = get_legacy_pcmap(&legacy_ast(), &src_map, &opcodes);

        assert_eq!(
            pcmap[&3].dev.as_deref(),
            Some("dev: Cannot send ether to non-payable function")
        );
        assert_eq!(pcmap[&3].location, None);

        assert_eq!(pcmap[&4].location, Some([Some(4), Some(4), Some(4), Some(14)]));
        assert_eq!(pcmap[&4].dev, None);
        assert_eq!(pcmap[&7].dev.as_deref(), Some("dev: Integer overflow"));

        assert_eq!(pcmap[&8].location, Some([Some(5), Some(4), Some(5), Some(24)]));
        assert_eq!(pcmap[&10].dev.as_deref(), Some("dev: User assert"));
        assert!(!pcmap.contains_key(&11));
    }

    #[test]
    fn test_legacy_pcmap_sourceless_revert_tags_last() {
        let opcodes = ops("PUSH1 0x01 REVERT");
        let src_map = vec![item(50, 20), item(-1, -1)];
        let pcmap = get_legacy_pcmap(&legacy_ast(), &src_map, &opcodes);
        assert_eq!(pcmap[&0].dev.as_deref(), Some("dev: User assert"));
    }

    #[test]
    fn test_legacy_pcmap_fallback() {
        let opcodes = ops("JUMPDEST PUSH1 0x00 CALLDATALOAD PUSH1 0xE0 SHR");
        let pcmap = get_legacy_pcmap(&legacy_ast(), &[], &opcodes);
        assert_eq!(pcmap[&0].dev.as_deref(), Some("dev: Fallback not defined"));
        assert_eq!(pcmap[&0].location, None);
    }

    #[test]
    fn test_dev_messages() {
        let content = "x: uint256\n\n@external\ndef foo():\n    assert x > 0  # dev: x must be positive \n";
        let messages = dev_messages(content);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[&5], "dev: x must be positive");
    }
}
