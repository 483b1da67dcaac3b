//! AST builder - turns a pest parse tree into [`EvalisNode`]s
//!
//! Each grammar production maps to exactly one node. The builder performs no
//! semantic checks; the only failures are internal ones caused by a parse
//! tree of unexpected shape.

use crate::ast::{BinaryOperator, EvalisNode, UnaryOperator, Value};
use crate::error::EvalisError;
use crate::parser::Rule;
use pest::iterators::Pair;

type Result<T> = std::result::Result<T, EvalisError>;

/// Builds AST nodes from parse tree pairs
#[derive(Debug, Default, Clone, Copy)]
pub struct AstBuilder;

impl AstBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the node for a single parse tree pair
    pub fn build(&self, pair: Pair<'_, Rule>) -> Result<EvalisNode> {
        let pair = descend(pair)?;

        match pair.as_rule() {
            Rule::or_expr
            | Rule::and_expr
            | Rule::equality_expr
            | Rule::membership_expr
            | Rule::relational_expr
            | Rule::additive_expr
            | Rule::multiplicative_expr => self.build_binary_chain(pair),

            Rule::not_expr => self.build_not(pair),
            Rule::reference => self.build_reference(pair),
            Rule::list_comprehension => self.build_comprehension(pair),
            Rule::number | Rule::string | Rule::boolean | Rule::null => build_literal(pair),

            other => Err(EvalisError::internal(format!(
                "Unexpected parse tree node: {:?}",
                other
            ))),
        }
    }

    /// Left-fold `operand (op operand)*` into nested binary operations
    fn build_binary_chain(&self, pair: Pair<'_, Rule>) -> Result<EvalisNode> {
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();

        let first = inner.next().ok_or_else(|| missing("operand", rule))?;
        let mut left = self.build(first)?;

        while let Some(op_pair) = inner.next() {
            let op = binary_operator(&op_pair)?;
            let right = inner.next().ok_or_else(|| missing("right operand", rule))?;
            left = EvalisNode::binary(op, left, self.build(right)?);
        }

        Ok(left)
    }

    /// `not_op* operand`, wrapped innermost first
    fn build_not(&self, pair: Pair<'_, Rule>) -> Result<EvalisNode> {
        let mut ops = Vec::new();
        let mut operand = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::not_op => {
                    let op = UnaryOperator::from_symbol(inner.as_str()).ok_or_else(|| {
                        EvalisError::internal(format!(
                            "Unexpected unary operator: {}",
                            inner.as_str()
                        ))
                    })?;
                    ops.push(op);
                }
                _ => operand = Some(inner),
            }
        }

        let operand = operand.ok_or_else(|| missing("operand", Rule::not_expr))?;
        let mut node = self.build(operand)?;
        for op in ops.into_iter().rev() {
            node = EvalisNode::unary(op, node);
        }
        Ok(node)
    }

    fn build_reference(&self, pair: Pair<'_, Rule>) -> Result<EvalisNode> {
        let mut inner = pair.into_inner();
        let root = inner
            .next()
            .filter(|p| p.as_rule() == Rule::identifier)
            .ok_or_else(|| missing("identifier", Rule::reference))?;

        let children = inner
            .map(|suffix| self.build_suffix(suffix))
            .collect::<Result<Vec<_>>>()?;

        Ok(EvalisNode::reference(root.as_str(), children))
    }

    /// `.name` becomes a static key, `[expr]` a computed one
    fn build_suffix(&self, suffix: Pair<'_, Rule>) -> Result<EvalisNode> {
        let rule = suffix.as_rule();
        let inner = suffix
            .into_inner()
            .next()
            .ok_or_else(|| missing("key", rule))?;

        match rule {
            Rule::dot_suffix => Ok(EvalisNode::literal(inner.as_str())),
            Rule::bracket_suffix => self.build(inner),
            other => Err(EvalisError::internal(format!(
                "Unexpected access suffix: {:?}",
                other
            ))),
        }
    }

    fn build_comprehension(&self, pair: Pair<'_, Rule>) -> Result<EvalisNode> {
        // Keywords are tokens in the tree; only the expressions and the variable matter
        let mut parts = pair
            .into_inner()
            .filter(|p| !matches!(p.as_rule(), Rule::for_kw | Rule::in_op));

        let element = parts
            .next()
            .ok_or_else(|| missing("element expression", Rule::list_comprehension))?;
        let variable = parts
            .next()
            .filter(|p| p.as_rule() == Rule::identifier)
            .ok_or_else(|| missing("loop variable", Rule::list_comprehension))?;
        let iterable = parts
            .next()
            .ok_or_else(|| missing("iterable expression", Rule::list_comprehension))?;

        Ok(EvalisNode::comprehension(
            self.build(element)?,
            variable.as_str(),
            self.build(iterable)?,
        ))
    }
}

fn binary_operator(pair: &Pair<'_, Rule>) -> Result<BinaryOperator> {
    match pair.as_rule() {
        Rule::or_op => Ok(BinaryOperator::Or),
        Rule::and_op => Ok(BinaryOperator::And),
        Rule::in_op => Ok(BinaryOperator::In),
        Rule::equality_op | Rule::relational_op | Rule::additive_op | Rule::multiplicative_op => {
            BinaryOperator::from_symbol(pair.as_str()).ok_or_else(|| {
                EvalisError::internal(format!("Unexpected binary operator: {}", pair.as_str()))
            })
        }
        other => Err(EvalisError::internal(format!(
            "Missing operator, found {:?}",
            other
        ))),
    }
}

/// Skip over pairs that only wrap a single child
///
/// Parentheses and every precedence level without an operator collapse to
/// their operand here, in a loop rather than through `build`.
fn descend(mut pair: Pair<'_, Rule>) -> Result<Pair<'_, Rule>> {
    loop {
        let rule = pair.as_rule();
        let next = match rule {
            Rule::parse | Rule::expr | Rule::paren_expr | Rule::literal => {
                pair.into_inner().find(|p| p.as_rule() != Rule::EOI)
            }
            Rule::or_expr
            | Rule::and_expr
            | Rule::not_expr
            | Rule::equality_expr
            | Rule::membership_expr
            | Rule::relational_expr
            | Rule::additive_expr
            | Rule::multiplicative_expr => {
                let mut inner = pair.clone().into_inner();
                match (inner.next(), inner.next()) {
                    (Some(only), None) => Some(only),
                    _ => return Ok(pair),
                }
            }
            _ => return Ok(pair),
        };
        pair = next.ok_or_else(|| missing("expression", rule))?;
    }
}

/// Build a literal from its typed token
fn build_literal(pair: Pair<'_, Rule>) -> Result<EvalisNode> {
    match pair.as_rule() {
        Rule::number => build_number(pair.as_str()),
        Rule::string => Ok(EvalisNode::literal(unescape_string(pair.as_str()))),
        Rule::boolean => Ok(EvalisNode::literal(pair.as_str() == "true")),
        Rule::null => Ok(EvalisNode::literal(Value::Null)),
        other => Err(EvalisError::internal(format!(
            "Unexpected literal token: {:?}",
            other
        ))),
    }
}

/// Numbers with a decimal point are floats, everything else an integer
fn build_number(text: &str) -> Result<EvalisNode> {
    let value = if text.contains('.') {
        text.parse::<f64>().map(Value::Float)
    } else {
        // Integers too large for i64 keep their magnitude as floats
        text.parse::<i64>()
            .map(Value::Int)
            .or_else(|_| text.parse::<f64>().map(Value::Float))
    };

    value
        .map(EvalisNode::literal)
        .map_err(|e| EvalisError::internal(format!("Invalid number literal '{}': {}", text, e)))
}

/// Strip the quotes, then unescape `\"` and `\\`, in that order
pub fn unescape_string(raw: &str) -> String {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    unquoted.replace("\\\"", "\"").replace("\\\\", "\\")
}

fn missing(what: &str, rule: Rule) -> EvalisError {
    EvalisError::internal(format!("Missing {} in {:?}", what, rule))
}
