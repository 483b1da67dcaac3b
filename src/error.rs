//! Error handling and formatting for Evalis
//!
//! Every evaluation failure is an [`EvalisError`] carrying a stable code, so
//! callers can branch on the kind of failure and users can grep for it.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const CODE_UNKNOWN: &str = "UNKNOWN";
pub const CODE_SYNTAX_ERROR: &str = "SYNTAX_ERROR";
pub const CODE_TYPE_ERROR: &str = "TYPE_ERROR";
pub const CODE_ACCESS_ERROR: &str = "ACCESS_ERROR";

/// A single diagnostic reported while parsing an expression
///
/// Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxMessage {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for SyntaxMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Errors raised while building or evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalisError {
    /// The expression did not parse
    #[error("[Evalis::SYNTAX_ERROR] {}", syntax_summary(.errors))]
    Syntax { errors: Vec<SyntaxMessage> },

    /// Operand kinds are incompatible with the operator
    #[error("[Evalis::TYPE_ERROR] {message}")]
    Type { message: String },

    /// A reference could not be resolved against the context
    #[error("[Evalis::ACCESS_ERROR] {message}")]
    Access { message: String },

    /// Malformed parse tree or AST
    #[error("[Evalis::UNKNOWN] {message}")]
    Internal { message: String },

    /// The expression nests deeper than the evaluator will recurse
    #[error("[Evalis::UNKNOWN] Expression nesting exceeds the limit of {limit} levels")]
    TooDeep { limit: usize },
}

impl EvalisError {
    pub fn type_error(message: impl Into<String>) -> Self {
        EvalisError::Type {
            message: message.into(),
        }
    }

    pub fn access(message: impl Into<String>) -> Self {
        EvalisError::Access {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EvalisError::Internal {
            message: message.into(),
        }
    }

    /// Stable classification code
    pub fn code(&self) -> &'static str {
        match self {
            EvalisError::Syntax { .. } => CODE_SYNTAX_ERROR,
            EvalisError::Type { .. } => CODE_TYPE_ERROR,
            EvalisError::Access { .. } => CODE_ACCESS_ERROR,
            EvalisError::Internal { .. } | EvalisError::TooDeep { .. } => CODE_UNKNOWN,
        }
    }

    /// Whether `shouldNullOnBadAccess` may replace this error with null
    pub fn is_bad_access(&self) -> bool {
        matches!(self, EvalisError::Access { .. })
    }
}

fn syntax_summary(errors: &[SyntaxMessage]) -> String {
    let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!(
        "Syntax errors found while trying to evaluate the expression:\n{}\n",
        lines.join("\n")
    )
}

/// Render syntax diagnostics with the offending line and a caret
pub fn format_syntax_errors(errors: &[SyntaxMessage], input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut output = String::new();

    for error in errors {
        output.push_str(&format!(
            "{} {}\n",
            "Syntax error:".red().bold(),
            error.message
        ));
        output.push_str(&format!(
            "  {} {}:{}\n",
            "-->".blue().bold(),
            "expression".dimmed(),
            format!("{}:{}", error.line, error.column).cyan()
        ));

        if error.line > 0 && error.line <= lines.len() {
            output.push_str(&format!("   {}\n", "|".blue()));
            output.push_str(&format!(
                " {} | {}\n",
                format!("{:3}", error.line).blue().bold(),
                lines[error.line - 1]
            ));
            let indicator = format!("{}^", " ".repeat(error.column));
            output.push_str(&format!("   {} {}\n", "|".blue(), indicator.red().bold()));
        }

        if let Some(hint) = error_hint(lines.get(error.line.saturating_sub(1)).copied()) {
            output.push_str(&format!("  {} {}\n", "Hint:".yellow().bold(), hint));
        }
    }

    output
}

/// Get a helpful hint based on common mistakes in the offending line
fn error_hint(line: Option<&str>) -> Option<&'static str> {
    let line = line?.trim();

    if line.matches('"').count() % 2 == 1 {
        return Some("Unterminated string literal; strings use double quotes");
    }
    if line.matches('[').count() > line.matches(']').count() {
        return Some("Missing closing bracket ']'");
    }
    if line.matches('(').count() > line.matches(')').count() {
        return Some("Missing closing parenthesis ')'");
    }
    if line.contains("&&") || line.contains("||") {
        return Some("Use 'and' / 'or' for logical operators");
    }
    if line.contains('!') && !line.contains("!=") {
        return Some("Use 'not' for negation");
    }
    let comparison = ["==", "!=", ">=", "<="];
    if line.contains('=') && !comparison.iter().any(|op| line.contains(op)) {
        return Some("Use '==' for equality comparison, not '='");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = EvalisError::type_error("Cannot use + operator with types map and number");
        assert_eq!(
            err.to_string(),
            "[Evalis::TYPE_ERROR] Cannot use + operator with types map and number"
        );
        assert_eq!(err.code(), CODE_TYPE_ERROR);
        assert!(!err.is_bad_access());
        assert!(EvalisError::access("Key not found: x").is_bad_access());
        assert_eq!(EvalisError::internal("boom").code(), CODE_UNKNOWN);

        let deep = EvalisError::TooDeep { limit: 8 };
        assert_eq!(deep.code(), CODE_UNKNOWN);
        assert!(!deep.is_bad_access());
        assert_eq!(
            deep.to_string(),
            "[Evalis::UNKNOWN] Expression nesting exceeds the limit of 8 levels"
        );
    }

    #[test]
    fn test_syntax_error_joins_messages() {
        let err = EvalisError::Syntax {
            errors: vec![
                SyntaxMessage {
                    line: 1,
                    column: 4,
                    message: "expected expr".to_string(),
                },
                SyntaxMessage {
                    line: 2,
                    column: 0,
                    message: "unexpected ']'".to_string(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("[Evalis::SYNTAX_ERROR]"));
        assert!(text.contains("1:4: expected expr\n2:0: unexpected ']'"));
        assert_eq!(err.code(), CODE_SYNTAX_ERROR);
    }

    #[test]
    fn test_format_syntax_errors_points_at_column() {
        colored::control::set_override(false);
        let errors = vec![SyntaxMessage {
            line: 1,
            column: 4,
            message: "expected expr".to_string(),
        }];
        let output = format_syntax_errors(&errors, "1 + (2");
        assert!(output.contains("Syntax error: expected expr"));
        assert!(output.contains("  1 | 1 + (2"));
        assert!(output.contains("|     ^"));
        assert!(output.contains("Missing closing parenthesis"));
    }

    #[test]
    fn test_hint_for_assignment() {
        assert_eq!(
            error_hint(Some("a = 1")),
            Some("Use '==' for equality comparison, not '='")
        );
        assert_eq!(error_hint(Some("a == 1")), None);
        assert_eq!(error_hint(None), None);
    }
}
