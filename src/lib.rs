//! Evalis - a small, safe expression language
//!
//! Expressions are parsed once into an immutable AST and evaluated against
//! arbitrary JSON-like data. Evaluation is pure: no I/O, no mutation of the
//! context, and a single AST may be evaluated concurrently from many threads.
//!
//! ```
//! use evalis::{evaluate_expression, EvaluatorOptions, Value};
//!
//! let context: Value = serde_json::from_str(r#"{"items": [1, 2, 3]}"#).unwrap();
//! let result = evaluate_expression("[x * 2 for x in items]", &context, EvaluatorOptions::default());
//! assert_eq!(result.unwrap(), Value::from(vec![2, 4, 6]));
//! ```

pub mod ast;
pub mod builder;
pub mod cache;
pub mod coerce;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod parser;

// CLI-only modules
#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod repl;

use std::sync::Arc;
use tracing::debug;

// Re-export commonly used types
pub use ast::{BinaryOperator, EvalisNode, UnaryOperator, Value, ValueKind};
pub use builder::AstBuilder;
pub use cache::AstCache;
pub use error::{EvalisError, SyntaxMessage};
pub use evaluator::{Evaluator, EvaluatorOptions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the expression language accepted by this crate
pub const EXPRESSION_VERSION: &str = "1";

/// Words that cannot be used as identifiers
pub const RESERVED_KEYWORDS: [&str; 8] = ["and", "or", "not", "in", "for", "true", "false", "null"];

/// Outcome of [`parse_ast`]: an AST or the syntax diagnostics
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    Ast(EvalisNode),
    Errors(Vec<SyntaxMessage>),
}

impl ParseResult {
    pub fn ast(&self) -> Option<&EvalisNode> {
        match self {
            ParseResult::Ast(node) => Some(node),
            ParseResult::Errors(_) => None,
        }
    }

    /// Diagnostics; empty on success
    pub fn errors(&self) -> &[SyntaxMessage] {
        match self {
            ParseResult::Ast(_) => &[],
            ParseResult::Errors(errors) => errors,
        }
    }

    pub fn into_result(self) -> Result<EvalisNode, Vec<SyntaxMessage>> {
        match self {
            ParseResult::Ast(node) => Ok(node),
            ParseResult::Errors(errors) => Err(errors),
        }
    }
}

/// Parse an expression into an AST
///
/// Never fails at the call level: syntax errors come back as
/// [`ParseResult::Errors`] with one entry per diagnostic.
pub fn parse_ast(expression: &str) -> ParseResult {
    into_parse_result(build_ast(expression))
}

/// Parse and build, keeping builder failures distinct from syntax errors
fn build_ast(expression: &str) -> Result<EvalisNode, EvalisError> {
    let tree = parser::parse_tree(expression).map_err(|errors| {
        debug!(errors = errors.len(), "expression failed to parse");
        EvalisError::Syntax { errors }
    })?;

    AstBuilder::new().build(tree)
}

/// Flatten a build result into diagnostics
///
/// A builder failure becomes one diagnostic at 1:0 whose message keeps its
/// `[Evalis::UNKNOWN]` prefix.
fn into_parse_result(built: Result<EvalisNode, EvalisError>) -> ParseResult {
    match built {
        Ok(node) => ParseResult::Ast(node),
        Err(EvalisError::Syntax { errors }) => ParseResult::Errors(errors),
        Err(other) => ParseResult::Errors(vec![SyntaxMessage {
            line: 1,
            column: 0,
            message: other.to_string(),
        }]),
    }
}

/// Evaluate a previously built AST
pub fn evaluate_ast(
    ast: &EvalisNode,
    context: &Value,
    options: EvaluatorOptions,
) -> Result<Value, EvalisError> {
    Evaluator::new(options).evaluate(ast, context)
}

/// Parse and evaluate in one step
///
/// A failed parse yields [`EvalisError::Syntax`] carrying every diagnostic.
pub fn evaluate_expression(
    expression: &str,
    context: &Value,
    options: EvaluatorOptions,
) -> Result<Value, EvalisError> {
    let ast = build_ast(expression)?;
    evaluate_ast(&ast, context, options)
}

/// Evaluation engine pairing an [`Evaluator`] with an optional [`AstCache`]
///
/// Use this when the same expressions are evaluated repeatedly; parsing goes
/// through the cache while evaluation always runs fresh.
#[derive(Debug, Clone)]
pub struct Evalis {
    evaluator: Evaluator,
    cache: Option<AstCache>,
}

impl Evalis {
    /// Create an engine with a cache sized from `EVALIS_CACHE_SIZE`
    pub fn new(options: EvaluatorOptions) -> Self {
        Self {
            evaluator: Evaluator::new(options),
            cache: AstCache::from_env(),
        }
    }

    /// Create an engine that parses on every call
    pub fn without_cache(options: EvaluatorOptions) -> Self {
        Self {
            evaluator: Evaluator::new(options),
            cache: None,
        }
    }

    /// Use the given cache; clones of an `AstCache` share entries
    pub fn with_cache(mut self, cache: AstCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Parse an expression, consulting the cache when enabled
    pub fn parse(&self, expression: &str) -> Result<Arc<EvalisNode>, EvalisError> {
        match &self.cache {
            Some(cache) => cache.get_or_parse(expression, build_ast),
            None => build_ast(expression).map(Arc::new),
        }
    }

    pub fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, EvalisError> {
        let ast = self.parse(expression)?;
        self.evaluator.evaluate(&ast, context)
    }

    /// Evaluate one expression against many contexts in parallel
    pub fn evaluate_batch(
        &self,
        expression: &str,
        contexts: &[Value],
    ) -> Result<Vec<Result<Value, EvalisError>>, EvalisError> {
        let ast = self.parse(expression)?;
        Ok(self.evaluator.evaluate_batch(&ast, contexts))
    }

    pub fn options(&self) -> &EvaluatorOptions {
        self.evaluator.options()
    }

    pub fn set_options(&mut self, options: EvaluatorOptions) {
        self.evaluator = Evaluator::new(options);
    }

    pub fn cache(&self) -> Option<&AstCache> {
        self.cache.as_ref()
    }
}

impl Default for Evalis {
    fn default() -> Self {
        Self::new(EvaluatorOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::num::NonZeroUsize;

    fn json(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    fn eval(expr: &str, ctx: &str) -> Result<Value, EvalisError> {
        evaluate_expression(expr, &json(ctx), EvaluatorOptions::default())
    }

    #[test]
    fn test_parse_result_accessors() {
        let ok = parse_ast("1 + 2");
        assert!(ok.ast().is_some());
        assert!(ok.errors().is_empty());

        let bad = parse_ast("1 +");
        assert!(bad.ast().is_none());
        assert_eq!(bad.errors().len(), 1);
        assert!(bad.into_result().is_err());
    }

    #[test]
    fn test_evaluate_expression_end_to_end() {
        assert_eq!(eval("1 + 2 * 3", "{}").unwrap(), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3", "{}").unwrap(), Value::Int(9));
        assert_eq!(eval("\"a\" + 1", "{}").unwrap(), Value::from("a1"));
        assert_eq!(eval("null + null", "{}").unwrap(), Value::Null);
        assert_eq!(eval("3 in list", r#"{"list": [1, 2, 3]}"#).unwrap(), Value::Bool(true));
        assert_eq!(
            eval("not (4 in list)", r#"{"list": [1, 2, 3]}"#).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval(r#""a\"b\\c""#, "{}").unwrap(),
            Value::from("a\"b\\c")
        );
    }

    #[test]
    fn test_syntax_error_carries_diagnostics() {
        let err = eval("a ==", "{}").unwrap_err();
        assert_eq!(err.code(), error::CODE_SYNTAX_ERROR);
        match err {
            EvalisError::Syntax { errors } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].line, 1);
                assert_eq!(errors[0].column, 4);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_failure_keeps_unknown_code() {
        let result = into_parse_result(Err(EvalisError::internal("Missing operand in or_expr")));
        let errors = result.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!((errors[0].line, errors[0].column), (1, 0));
        assert_eq!(
            errors[0].message,
            "[Evalis::UNKNOWN] Missing operand in or_expr"
        );

        let syntax = vec![SyntaxMessage {
            line: 2,
            column: 3,
            message: "expected expression".to_string(),
        }];
        let result = into_parse_result(Err(EvalisError::Syntax {
            errors: syntax.clone(),
        }));
        assert_eq!(result.errors(), syntax.as_slice());
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let deep = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        let result = parse_ast(&deep);
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].message.contains("nests deeper than"));

        let err = eval(&deep, "{}").unwrap_err();
        assert_eq!(err.code(), error::CODE_SYNTAX_ERROR);

        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(eval(&shallow, "{}").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_long_chains_evaluate() {
        let roles = (0..1000)
            .map(|i| format!("role == \"r{}\"", i))
            .collect::<Vec<_>>()
            .join(" or ");
        assert_eq!(eval(&roles, r#"{"role": "r999"}"#).unwrap(), Value::Bool(true));
        assert_eq!(eval(&roles, r#"{"role": "r1000"}"#).unwrap(), Value::Bool(false));

        let sum = vec!["1"; 1000].join(" + ");
        assert_eq!(eval(&sum, "{}").unwrap(), Value::Int(1000));

        let nots = format!("{}0", "not ".repeat(1000));
        assert_eq!(eval(&nots, "{}").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_evaluate_ast_reuses_tree() {
        let ast = parse_ast("user.age >= 18").into_result().unwrap();
        let adult = json(r#"{"user": {"age": 30}}"#);
        let minor = json(r#"{"user": {"age": 12}}"#);

        let options = EvaluatorOptions::default();
        assert_eq!(evaluate_ast(&ast, &adult, options).unwrap(), Value::Bool(true));
        assert_eq!(evaluate_ast(&ast, &minor, options).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_reserved_keywords_rejected_as_identifiers() {
        for keyword in RESERVED_KEYWORDS {
            let expr = format!("{}.field", keyword);
            assert!(
                parse_ast(&expr).ast().map_or(true, |node| !matches!(
                    node,
                    EvalisNode::Reference { root, .. } if root == keyword
                )),
                "{} parsed as an identifier",
                keyword
            );
        }
    }

    #[test]
    fn test_engine_uses_cache() {
        let cache = AstCache::new(NonZeroUsize::new(4).unwrap());
        let engine = Evalis::without_cache(EvaluatorOptions::default()).with_cache(cache.clone());
        let ctx = json(r#"{"n": 2}"#);

        assert_eq!(engine.evaluate("n * 21", &ctx).unwrap(), Value::Int(42));
        assert_eq!(engine.evaluate("n * 21", &ctx).unwrap(), Value::Int(42));

        let metrics = cache.metrics_snapshot();
        assert_eq!((metrics.hits, metrics.misses), (1, 1));
    }

    #[test]
    fn test_engine_options() {
        let mut engine = Evalis::without_cache(EvaluatorOptions::default());
        let ctx = json("{}");
        assert!(engine.evaluate("missing.key", &ctx).is_err());

        engine.set_options(EvaluatorOptions::default().with_null_on_bad_access(true));
        assert!(engine.options().should_null_on_bad_access);
        assert_eq!(engine.evaluate("missing.key", &ctx).unwrap(), Value::Null);
        assert!(engine.cache().is_none());
    }

    #[test]
    fn test_engine_batch() {
        let engine = Evalis::without_cache(EvaluatorOptions::default());
        let contexts = vec![json(r#"{"a": 1}"#), json(r#"{"a": "x"}"#), json("{}")];
        let results = engine.evaluate_batch("a + 1", &contexts).unwrap();

        assert_eq!(results[0], Ok(Value::Int(2)));
        assert_eq!(results[1], Ok(Value::from("x1")));
        assert!(results[2].is_err());
        assert!(engine.evaluate_batch("a +", &contexts).is_err());
    }
}
