//! Abstract Syntax Tree definitions for Evalis
//!
//! This module defines the AST nodes produced by the builder and the runtime
//! values the evaluator works with. Nodes are immutable once built and may be
//! evaluated any number of times against different contexts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Expression node
///
/// Serializes in the tagged JSON shape used by other Evalis implementations,
/// e.g. `{"type": "binaryOp", "op": "+", "left": ..., "right": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EvalisNode {
    /// Constant value
    Literal { value: Value },

    /// Attribute access: `user.tags[0]`
    ///
    /// Each child is evaluated at evaluation time to produce the next key.
    Reference {
        root: String,
        children: Vec<EvalisNode>,
    },

    /// Unary operation: `not a`
    UnaryOp {
        op: UnaryOperator,
        expr: Box<EvalisNode>,
    },

    /// Binary operation: `a + b`, `a == b`, `a in b`, etc.
    BinaryOp {
        op: BinaryOperator,
        left: Box<EvalisNode>,
        right: Box<EvalisNode>,
    },

    /// List comprehension: `[expr for x in list]`
    #[serde(rename_all = "camelCase")]
    ListComprehension {
        element_expr: Box<EvalisNode>,
        variable_name: String,
        iterable_expr: Box<EvalisNode>,
    },
}

impl EvalisNode {
    /// Create a literal node
    pub fn literal(value: impl Into<Value>) -> Self {
        EvalisNode::Literal {
            value: value.into(),
        }
    }

    /// Create a reference node
    pub fn reference(root: impl Into<String>, children: Vec<EvalisNode>) -> Self {
        EvalisNode::Reference {
            root: root.into(),
            children,
        }
    }

    pub fn unary(op: UnaryOperator, expr: EvalisNode) -> Self {
        EvalisNode::UnaryOp {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn binary(op: BinaryOperator, left: EvalisNode, right: EvalisNode) -> Self {
        EvalisNode::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a list comprehension node
    pub fn comprehension(
        element_expr: EvalisNode,
        variable_name: impl Into<String>,
        iterable_expr: EvalisNode,
    ) -> Self {
        EvalisNode::ListComprehension {
            element_expr: Box::new(element_expr),
            variable_name: variable_name.into(),
            iterable_expr: Box::new(iterable_expr),
        }
    }

    /// Short name of the node variant, used in logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            EvalisNode::Literal { .. } => "literal",
            EvalisNode::Reference { .. } => "reference",
            EvalisNode::UnaryOp { .. } => "unaryOp",
            EvalisNode::BinaryOp { .. } => "binaryOp",
            EvalisNode::ListComprehension { .. } => "listComprehension",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,

    // Logical
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,

    // Comparison
    #[serde(rename = "==")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,

    // Membership
    #[serde(rename = "in")]
    In,
}

impl BinaryOperator {
    /// Every binary operator, in declaration order
    pub const ALL: [BinaryOperator; 13] = [
        BinaryOperator::Add,
        BinaryOperator::Subtract,
        BinaryOperator::Multiply,
        BinaryOperator::Divide,
        BinaryOperator::And,
        BinaryOperator::Or,
        BinaryOperator::Equals,
        BinaryOperator::NotEquals,
        BinaryOperator::Gt,
        BinaryOperator::Gte,
        BinaryOperator::Lt,
        BinaryOperator::Lte,
        BinaryOperator::In,
    ];

    /// Source spelling of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Equals => "==",
            BinaryOperator::NotEquals => "!=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Gte => ">=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Lte => "<=",
            BinaryOperator::In => "in",
        }
    }

    /// Parse an operator from its source spelling
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    #[serde(rename = "not")]
    Not,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Not => "not",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "not" => Some(UnaryOperator::Not),
            _ => None,
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Value representation (runtime values and evaluation contexts)
///
/// `Int` and `Float` together form the single number kind of the language.
/// Values (de)serialize as plain data, so any JSON/YAML/TOML document can be
/// used as a context.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, boolean, number or string
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// Truthiness used by `not`, `and` and `or`
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Convert to the representation used for string concatenation
    ///
    /// Null renders as the empty string; integral floats drop the fraction.
    /// Floats below `1e-6` or from `1e21` up use exponent form (`1e+21`).
    pub fn to_string_repr(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.clone(),
            Value::List(items) => {
                let strs: Vec<_> = items.iter().map(|v| v.to_string_repr()).collect();
                strs.join(",")
            }
            Value::Map(_) => "[object]".to_string(),
        }
    }

    /// Get the kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Int(_) | Value::Float(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }
}

/// Shortest round-trip rendering of a float for concatenation
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }

    let magnitude = f.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return f.to_string();
    }

    let exponent_form = format!("{:e}", f);
    match exponent_form.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => exponent_form,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                let strs: Vec<_> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", strs.join(", "))
            }
            Value::Map(map) => {
                let pairs: Vec<_> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

/// Kinds of runtime values, as named in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    List,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}
