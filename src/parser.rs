//! Pest parser for Evalis expressions
//!
//! The grammar lives in `src/grammar.pest`. This module only runs the
//! generated parser and turns its failures into [`SyntaxMessage`]s; building
//! the AST from the parse tree is the job of [`crate::builder`].

use crate::error::SyntaxMessage;
use pest::error::{Error as PestError, LineColLocation};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct EvalisParser;

/// Deepest bracket nesting accepted by [`parse_tree`]
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parse an expression into its top-level `parse` pair
pub fn parse_tree(input: &str) -> Result<Pair<'_, Rule>, Vec<SyntaxMessage>> {
    check_nesting(input).map_err(|e| vec![e])?;

    let mut pairs = EvalisParser::parse(Rule::parse, input).map_err(|e| vec![to_message(e)])?;

    // `parse` always produces exactly one pair on success
    pairs.next().ok_or_else(|| {
        vec![SyntaxMessage {
            line: 1,
            column: 0,
            message: "empty parse tree".to_string(),
        }]
    })
}

/// Reject input whose `(` and `[` nesting exceeds [`MAX_NESTING_DEPTH`]
///
/// Runs before the generated parser, which recurses once per grammar level
/// for every bracket. Brackets inside string literals are skipped.
fn check_nesting(input: &str) -> Result<(), SyntaxMessage> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let (mut line, mut column) = (1, 0);

    for ch in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else {
            match ch {
                '"' => in_string = true,
                '(' | '[' => {
                    depth += 1;
                    if depth > MAX_NESTING_DEPTH {
                        return Err(SyntaxMessage {
                            line,
                            column,
                            message: format!(
                                "expression nests deeper than {} levels",
                                MAX_NESTING_DEPTH
                            ),
                        });
                    }
                }
                ')' | ']' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }

        if ch == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }

    Ok(())
}

/// Convert a pest error into a diagnostic with a 0-based column
fn to_message(error: PestError<Rule>) -> SyntaxMessage {
    let (line, col) = match error.line_col {
        LineColLocation::Pos((line, col)) => (line, col),
        LineColLocation::Span((line, col), _) => (line, col),
    };

    let error = error.renamed_rules(format_rule_name);

    SyntaxMessage {
        line,
        column: col.saturating_sub(1),
        message: error.variant.message().into_owned(),
    }
}

/// Format a rule name to be more user-friendly
fn format_rule_name(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input".to_string(),
        Rule::expr => "expression".to_string(),
        Rule::identifier => "identifier".to_string(),
        Rule::number => "number".to_string(),
        Rule::string => "string".to_string(),
        Rule::boolean => "boolean (true/false)".to_string(),
        Rule::null => "null".to_string(),
        Rule::literal => "literal".to_string(),
        Rule::list_comprehension => "list comprehension".to_string(),
        Rule::paren_expr => "parenthesized expression".to_string(),
        Rule::reference => "reference".to_string(),
        Rule::for_kw => "'for'".to_string(),
        Rule::in_op => "'in'".to_string(),
        Rule::and_op => "'and'".to_string(),
        Rule::or_op => "'or'".to_string(),
        Rule::not_op => "'not'".to_string(),
        Rule::equality_op => "'==' or '!='".to_string(),
        Rule::relational_op => "comparison operator".to_string(),
        Rule::additive_op => "'+' or '-'".to_string(),
        Rule::multiplicative_op => "'*' or '/'".to_string(),
        _ => format!("{:?}", rule).replace('_', " "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_expression() {
        let pair = parse_tree("user.name == \"Amy\" and not (x > 1)").unwrap();
        assert_eq!(pair.as_rule(), Rule::parse);
    }

    #[test]
    fn test_parse_empty() {
        let errors = parse_tree("").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].column, 0);
    }

    #[test]
    fn test_error_position_is_zero_based() {
        let errors = parse_tree("1 +").unwrap_err();
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].column, 3);
        assert!(errors[0].message.starts_with("expected"));
    }

    #[test]
    fn test_error_on_second_line() {
        let errors = parse_tree("a and\n  b or").unwrap_err();
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn test_keywords_are_not_identifiers() {
        assert!(parse_tree("for").is_err());
        assert!(parse_tree("in + 1").is_err());
        assert!(parse_tree("notes and android").is_ok());
        assert!(parse_tree("true_value").is_ok());
    }

    #[test]
    fn test_nesting_limit() {
        let within = format!(
            "{}1{}",
            "(".repeat(MAX_NESTING_DEPTH),
            ")".repeat(MAX_NESTING_DEPTH)
        );
        assert!(parse_tree(&within).is_ok());

        let deep = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        let errors = parse_tree(&deep).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].column, MAX_NESTING_DEPTH);
        assert!(errors[0].message.contains("nests deeper than"));
    }

    #[test]
    fn test_nesting_ignores_brackets_in_strings() {
        let quoted = format!("\"{}\" + \"\\\"(\"", "(".repeat(1000));
        assert!(parse_tree(&quoted).is_ok());
    }

    #[test]
    fn test_long_chains_parse() {
        let chain = vec!["x"; 1000].join(" or ");
        assert!(parse_tree(&chain).is_ok());

        let nots = format!("{}x", "not ".repeat(1000));
        assert!(parse_tree(&nots).is_ok());
    }

    #[test]
    fn test_unterminated_string() {
        assert!(parse_tree("\"abc").is_err());
        assert!(parse_tree(r#""a\"b""#).is_ok());
    }
}
