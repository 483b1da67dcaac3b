//! Evalis CLI - evaluate expressions from the command line

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use evalis::cli::{self, format_value};
use evalis::context::{load_context_file, parse_context_str, ContextFormat};
use evalis::error::{format_syntax_errors, EvalisError};
use evalis::{parse_ast, Evalis, EvaluatorOptions, ParseResult, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "evalis")]
#[command(about = "Evalis - a small, safe expression language", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression against a context
    Eval {
        /// Expression to evaluate
        expr: String,

        /// Context file (.json, .yaml, .yml or .toml)
        #[arg(short, long, conflicts_with = "json")]
        context: Option<PathBuf>,

        /// Inline JSON context
        #[arg(long)]
        json: Option<String>,

        /// Resolve failed lookups to null instead of failing
        #[arg(long)]
        null_on_bad_access: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Parse an expression and display its AST
    Parse {
        /// Expression to parse
        expr: String,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Evaluate an expression against every context in a JSON array file
    Batch {
        /// Expression to evaluate
        expr: String,

        /// JSON file holding an array of contexts
        file: PathBuf,

        /// Resolve failed lookups to null instead of failing
        #[arg(long)]
        null_on_bad_access: bool,
    },

    /// Start interactive REPL (Read-Eval-Print Loop)
    Repl {
        /// Context file (.json, .yaml, .yml or .toml)
        #[arg(short, long)]
        context: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so results on stdout stay machine-readable
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Eval {
            expr,
            context,
            json,
            null_on_bad_access,
            format,
        } => {
            let context = load_context(context.as_deref(), json.as_deref())?;
            let options = options_with(null_on_bad_access);
            let engine = Evalis::without_cache(options);

            match engine.evaluate(&expr, &context) {
                Ok(value) => print_value(&value, format)?,
                Err(e) => exit_with(&e, &expr),
            }
        }

        Commands::Parse { expr, format } => match parse_ast(&expr) {
            ParseResult::Ast(ast) => match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ast)?),
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&ast)?),
                OutputFormat::Text => {
                    cli::success("Parse successful");
                    println!("\n{}", "AST:".bold());
                    println!("{:#?}", ast);
                }
            },
            ParseResult::Errors(errors) => {
                eprint!("{}", format_syntax_errors(&errors, &expr));
                std::process::exit(1);
            }
        },

        Commands::Batch {
            expr,
            file,
            null_on_bad_access,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read batch file: {}", file.display()))?;
            let contexts: Vec<Value> = serde_json::from_str(&content)
                .with_context(|| format!("Expected a JSON array of contexts in {}", file.display()))?;

            let engine = Evalis::without_cache(options_with(null_on_bad_access));
            let started = Instant::now();
            let results = match engine.evaluate_batch(&expr, &contexts) {
                Ok(results) => results,
                Err(e) => exit_with(&e, &expr),
            };
            debug!(
                contexts = contexts.len(),
                elapsed = %cli::format_duration(started.elapsed()),
                "batch evaluated"
            );

            let mut failures = 0;
            for result in results {
                match result {
                    Ok(value) => println!("{}", serde_json::to_string(&value)?),
                    Err(e) => {
                        failures += 1;
                        println!("{}", e);
                    }
                }
            }

            if failures > 0 {
                eprintln!(
                    "{} {} of {} context(s) failed",
                    "✗".red().bold(),
                    failures,
                    contexts.len()
                );
                std::process::exit(1);
            }
        }

        Commands::Repl { context } => {
            let context = load_context(context.as_deref(), None)?;
            evalis::repl::run_repl(context, EvaluatorOptions::from_env())?;
        }
    }

    Ok(())
}

/// Options from the environment, with the flag forcing null-on-bad-access on
fn options_with(null_on_bad_access: bool) -> EvaluatorOptions {
    let options = EvaluatorOptions::from_env();
    if null_on_bad_access {
        options.with_null_on_bad_access(true)
    } else {
        options
    }
}

/// Context from a file, inline JSON, or an empty map
fn load_context(path: Option<&Path>, json: Option<&str>) -> Result<Value> {
    match (path, json) {
        (Some(_), Some(_)) => bail!("--context and --json cannot be used together"),
        (Some(path), None) => load_context_file(path),
        (None, Some(json)) => parse_context_str(json, ContextFormat::Json),
        (None, None) => Ok(Value::Map(BTreeMap::new())),
    }
}

fn print_value(value: &Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Text => println!("{}", format_value(value)),
    }
    Ok(())
}

fn exit_with(error: &EvalisError, expr: &str) -> ! {
    match error {
        EvalisError::Syntax { errors } => eprint!("{}", format_syntax_errors(errors, expr)),
        other => cli::error(&other.to_string()),
    }
    std::process::exit(1);
}
