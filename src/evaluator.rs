//! Evaluator for Evalis - walks an AST against a data context
//!
//! Evaluation is a pure recursive walk with a depth limit. The evaluator holds only its
//! options, so one instance can be shared across threads and reused for any
//! number of ASTs and contexts.

use crate::ast::{BinaryOperator, EvalisNode, UnaryOperator, Value};
use crate::coerce;
use crate::context::{self, Scope};
use crate::error::EvalisError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, EvalisError>;

/// Environment variable read by [`EvaluatorOptions::from_env`]
pub const NULL_ON_BAD_ACCESS_ENV: &str = "EVALIS_NULL_ON_BAD_ACCESS";

/// Deepest AST nesting the evaluator will walk
///
/// Chains of binary operators nested on the left and runs of `not` do not
/// count against it.
pub const MAX_EVALUATION_DEPTH: usize = 256;

static NULL: Value = Value::Null;

/// Evaluator configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatorOptions {
    /// Resolve failed lookups and non-list comprehension sources to null
    /// instead of failing
    pub should_null_on_bad_access: bool,
}

impl EvaluatorOptions {
    pub fn with_null_on_bad_access(mut self, enabled: bool) -> Self {
        self.should_null_on_bad_access = enabled;
        self
    }

    /// Read options from the environment
    ///
    /// `EVALIS_NULL_ON_BAD_ACCESS=1|true|yes` enables null-on-bad-access.
    pub fn from_env() -> Self {
        let enabled = std::env::var(NULL_ON_BAD_ACCESS_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self::default().with_null_on_bad_access(enabled)
    }
}

/// Tree-walking evaluator
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    options: EvaluatorOptions,
}

impl Evaluator {
    /// Create a new evaluator
    pub fn new(options: EvaluatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Evaluate an AST against a context
    pub fn evaluate(&self, node: &EvalisNode, context: &Value) -> Result<Value> {
        self.evaluate_in(node, &Scope::root(context))
    }

    /// Evaluate the same AST against many contexts in parallel
    ///
    /// Results are returned in the order of `contexts`.
    pub fn evaluate_batch(&self, node: &EvalisNode, contexts: &[Value]) -> Vec<Result<Value>> {
        debug!(contexts = contexts.len(), "evaluating batch");
        contexts
            .par_iter()
            .map(|context| self.evaluate(node, context))
            .collect()
    }

    /// Evaluate a node within a scope
    pub fn evaluate_in(&self, node: &EvalisNode, scope: &Scope<'_>) -> Result<Value> {
        self.eval_at(node, scope, 0)
    }

    fn eval_at(&self, node: &EvalisNode, scope: &Scope<'_>, depth: usize) -> Result<Value> {
        if depth > MAX_EVALUATION_DEPTH {
            return Err(EvalisError::TooDeep {
                limit: MAX_EVALUATION_DEPTH,
            });
        }
        trace!(node = node.kind_name(), depth, "evaluating node");

        match node {
            EvalisNode::Literal { value } => Ok(value.clone()),

            EvalisNode::Reference { root, children } => self
                .evaluate_reference(root, children, scope, depth)
                .cloned(),

            EvalisNode::UnaryOp { .. } => self.evaluate_not_chain(node, scope, depth),

            EvalisNode::BinaryOp { .. } => self.evaluate_binary_chain(node, scope, depth),

            EvalisNode::ListComprehension {
                element_expr,
                variable_name,
                iterable_expr,
            } => {
                let items = match self.eval_at(iterable_expr, scope, depth + 1)? {
                    Value::List(items) => items,
                    other if self.options.should_null_on_bad_access => {
                        debug!(kind = %other.kind(), "comprehension over non-list, yielding null");
                        return Ok(Value::Null);
                    }
                    other => {
                        return Err(EvalisError::type_error(format!(
                            "List comprehension requires iterable to be a list, got {}",
                            other.kind()
                        )));
                    }
                };

                let mut results = Vec::with_capacity(items.len());
                for item in &items {
                    let item_scope = scope.bind(variable_name, item);
                    results.push(self.eval_at(element_expr, &item_scope, depth + 1)?);
                }
                Ok(Value::List(results))
            }
        }
    }

    /// Evaluate a left-nested run of binary operations without recursing on
    /// the left operand
    ///
    /// Operands are still evaluated leftmost first, and both sides of every
    /// operation are always evaluated.
    fn evaluate_binary_chain(
        &self,
        node: &EvalisNode,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<Value> {
        let mut spine = Vec::new();
        let mut leftmost = node;
        while let EvalisNode::BinaryOp { op, left, right } = leftmost {
            spine.push((*op, right.as_ref()));
            leftmost = left;
        }

        let mut acc = self.eval_at(leftmost, scope, depth + 1)?;
        for (op, right) in spine.into_iter().rev() {
            let right_val = self.eval_at(right, scope, depth + 1)?;
            acc = self.evaluate_binary_op(op, acc, right_val)?;
        }
        Ok(acc)
    }

    /// Evaluate `not not ... expr` by counting the operators
    fn evaluate_not_chain(
        &self,
        node: &EvalisNode,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<Value> {
        let mut negations = 0usize;
        let mut operand = node;
        while let EvalisNode::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } = operand
        {
            negations += 1;
            operand = expr;
        }

        let truthy = self.eval_at(operand, scope, depth + 1)?.is_truthy();
        Ok(Value::Bool(truthy == (negations % 2 == 0)))
    }

    /// Resolve `root` and then each child key in turn
    fn evaluate_reference<'a>(
        &self,
        root: &str,
        children: &[EvalisNode],
        scope: &Scope<'a>,
        depth: usize,
    ) -> Result<&'a Value> {
        let mut current = self.recover(scope.resolve(root))?;

        for child in children {
            // Keys are computed in the enclosing scope, not relative to `current`
            let key = self.eval_at(child, scope, depth + 1)?;
            current = self.recover(context::lookup(current, &key))?;
        }

        Ok(current)
    }

    /// Apply the null-on-bad-access policy to a lookup result
    fn recover<'a>(&self, lookup: Result<&'a Value>) -> Result<&'a Value> {
        match lookup {
            Err(e) if e.is_bad_access() && self.options.should_null_on_bad_access => {
                debug!(error = %e, "bad access resolved to null");
                Ok(&NULL)
            }
            other => other,
        }
    }

    /// Evaluate binary operations
    fn evaluate_binary_op(&self, op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        match op {
            BinaryOperator::Add => coerce::add(left, right),

            BinaryOperator::Subtract | BinaryOperator::Multiply | BinaryOperator::Divide => {
                coerce::arithmetic(op, &left, &right)
            }

            // The deciding operand is returned as-is, not coerced to a boolean
            BinaryOperator::And => Ok(if left.is_truthy() { right } else { left }),
            BinaryOperator::Or => Ok(if left.is_truthy() { left } else { right }),

            BinaryOperator::Equals => Ok(Value::Bool(coerce::values_equal(&left, &right))),
            BinaryOperator::NotEquals => Ok(Value::Bool(!coerce::values_equal(&left, &right))),

            BinaryOperator::Gt => {
                let ord = coerce::compare(op, &left, &right)?;
                Ok(Value::Bool(ord == Some(Ordering::Greater)))
            }
            BinaryOperator::Gte => {
                let ord = coerce::compare(op, &left, &right)?;
                Ok(Value::Bool(matches!(
                    ord,
                    Some(Ordering::Greater | Ordering::Equal)
                )))
            }
            BinaryOperator::Lt => {
                let ord = coerce::compare(op, &left, &right)?;
                Ok(Value::Bool(ord == Some(Ordering::Less)))
            }
            BinaryOperator::Lte => {
                let ord = coerce::compare(op, &left, &right)?;
                Ok(Value::Bool(matches!(ord, Some(Ordering::Less | Ordering::Equal))))
            }

            BinaryOperator::In => match right {
                Value::List(items) => Ok(Value::Bool(
                    items.iter().any(|item| coerce::values_equal(&left, item)),
                )),
                other => Err(EvalisError::type_error(format!(
                    "Cannot use in operator with a {} on the right side, expected a list",
                    other.kind()
                ))),
            },
        }
    }
}
