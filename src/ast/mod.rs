//! Vyper AST helpers
//!
//! [`AstNode`] is a typed view over the JSON AST emitted by the compiler;
//! [`source_to_abi`] derives function ABIs straight from source text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::contract::{AbiParam, MethodAbi};

/// Mutability used when a function has no mutability decorator
pub const DEFAULT_MUTABILITY: &str = "nonpayable";

const DECORATOR_MUTABILITY: [&str; 4] = ["pure", "view", "payable", "nonpayable"];

/// AST types classified as functions
pub const FUNCTION_AST_TYPES: [&str; 1] = ["FunctionDef"];

/// A node of the compiler's JSON AST
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub ast_type: String,
    /// Byte offset of the node in the source
    pub start: Option<u64>,
    /// Byte length of the node
    pub length: Option<u64>,
    pub lineno: Option<u64>,
    pub col_offset: Option<u64>,
    pub end_lineno: Option<u64>,
    pub end_col_offset: Option<u64>,
    /// `ast_type` of the `op` field (`BinOp`, `AugAssign`, ...)
    pub op: Option<String>,
    pub children: Vec<AstNode>,
}

impl AstNode {
    /// Build the node tree; `None` when `value` is not an AST node.
    pub fn from_json(value: &Value) -> Option<AstNode> {
        let obj = value.as_object()?;
        let ast_type = obj.get("ast_type")?.as_str()?.to_string();
        let (start, length) = obj
            .get("src")
            .and_then(Value::as_str)
            .map(parse_src)
            .unwrap_or((None, None));

        let mut children = Vec::new();
        for (key, field) in obj {
            if key == "ast_type" {
                continue;
            }
            collect_children(field, &mut children);
        }

        let op = obj
            .get("op")
            .and_then(|op| op.get("ast_type"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(AstNode {
            ast_type,
            start,
            length,
            lineno: obj.get("lineno").and_then(Value::as_u64),
            col_offset: obj.get("col_offset").and_then(Value::as_u64),
            end_lineno: obj.get("end_lineno").and_then(Value::as_u64),
            end_col_offset: obj.get("end_col_offset").and_then(Value::as_u64),
            op,
            children,
        })
    }

    /// `[lineno, col_offset, end_lineno, end_col_offset]`
    pub fn line_numbers(&self) -> [Option<u64>; 4] {
        [
            self.lineno,
            self.col_offset,
            self.end_lineno,
            self.end_col_offset,
        ]
    }

    /// First node (pre-order) spanning exactly `start..start+length`
    pub fn get_node(
        &self,
        start: u64,
        length: u64,
    ) -> Option<&AstNode> {
        if self.start == Some(start) && self.length.unwrap_or(0) == length {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.get_node(start, length))
    }

    /// Every node in pre-order
    pub fn iter(&self) -> Vec<&AstNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.iter());
        }
        out
    }
}

fn collect_children(
    value: &Value,
    out: &mut Vec<AstNode>,
) {
    match value {
        Value::Object(_) => {
            if let Some(node) = AstNode::from_json(value) {
                out.push(node);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_children(item, out);
            }
        }
        _ => {}
    }
}

/// Parse an AST `src` of the form `start:length:file`.
pub fn parse_src(src: &str) -> (Option<u64>, Option<u64>) {
    let mut parts = src.split(':');
    let start = parts.next().and_then(|s| s.parse().ok());
    let length = parts.next().and_then(|s| s.parse().ok());
    (start, length)
}

/// Mark function nodes with `"classification": "function"`, recursively.
pub fn classify_ast(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            let is_function = obj
                .get("ast_type")
                .and_then(Value::as_str)
                .is_some_and(|t| FUNCTION_AST_TYPES.contains(&t));
            if is_function {
                obj.insert("classification".to_string(), Value::from("function"));
            }
            for (_, child) in obj.iter_mut() {
                classify_ast(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(classify_ast),
        _ => {}
    }
}

static ARRAY_RETURN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\[\s*(\d+)\s*\]$").expect("return pattern is valid")
});

static DEF_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("def pattern is valid")
});

/// Method ABIs of every top-level function in `source`.
///
/// Complex types and events are not covered.
pub fn source_to_abi(source: &str) -> Vec<MethodAbi> {
    let lines: Vec<&str> = source.lines().collect();
    let mut abi = Vec::new();
    let mut decorators: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if let Some(decorator) = line.strip_prefix('@') {
            let name = decorator
                .split(|c: char| c == '(' || c.is_whitespace() || c == '#')
                .next()
                .unwrap_or_default();
            decorators.push(name.to_string());
            i += 1;
            continue;
        }

        if DEF_HEAD.is_match(line) {
            let mut signature = String::new();
            while i < lines.len() {
                signature.push_str(strip_comment(lines[i]).trim());
                signature.push(' ');
                i += 1;
                if signature_complete(&signature) {
                    break;
                }
            }
            if let Some(method) = parse_signature(signature.trim(), &decorators) {
                abi.push(method);
            }
            decorators.clear();
            continue;
        }

        if !line.trim().is_empty() && !line.starts_with(char::is_whitespace) {
            decorators.clear();
        }
        i += 1;
    }

    abi
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Parentheses balanced and a trailing `:` after them
fn signature_complete(signature: &str) -> bool {
    let mut depth = 0i32;
    let mut closed = false;
    for c in signature.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth == 0 {
                    closed = true;
                }
            }
            _ => {}
        }
    }
    closed && depth == 0 && signature.trim_end().ends_with(':')
}

/// Split on commas outside brackets
fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_signature(
    signature: &str,
    decorators: &[String],
) -> Option<MethodAbi> {
    let caps = DEF_HEAD.captures(signature)?;
    let name = caps.get(1)?.as_str().to_string();
    let open = caps.get(0)?.end();

    // Matching close paren of the argument list
    let mut depth = 1i32;
    let mut close = None;
    for (idx, c) in signature[open..].char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;

    let inputs = split_top_level(&signature[open..close])
        .into_iter()
        .filter_map(|arg| {
            let (arg_name, rest) = arg.split_once(':')?;
            let ty = rest.split('=').next().unwrap_or_default().trim();
            Some(AbiParam::new(arg_name.trim(), ty))
        })
        .collect();

    let tail = signature[close + 1..].trim().trim_end_matches(':').trim();
    let outputs = match tail.strip_prefix("->") {
        Some(ret) => vec![AbiParam::new("", return_type(ret.trim()))],
        None => Vec::new(),
    };

    let state_mutability = decorators
        .iter()
        .find(|d| DECORATOR_MUTABILITY.contains(&d.as_str()))
        .map(String::as_str)
        .unwrap_or(DEFAULT_MUTABILITY);

    Some(MethodAbi::new(name, inputs, outputs, state_mutability))
}

fn return_type(raw: &str) -> String {
    match ARRAY_RETURN.captures(raw) {
        Some(caps) => format!("{}[{}]", &caps[1], &caps[2]),
        None => raw.to_string(),
    }
}
