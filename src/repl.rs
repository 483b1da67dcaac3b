//! REPL (Read-Eval-Print Loop) for Evalis
//!
//! Provides an interactive shell for evaluating expressions against a
//! context loaded at startup.

use crate::cli::{self, format_value};
use crate::error::{format_syntax_errors, EvalisError};
use crate::{ast::Value, Evalis, EvaluatorOptions};
use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{history::FileHistory, CompletionType, Config, Editor};
use std::env;
use std::path::PathBuf;

/// What the loop should do after a `:` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Quit,
    Unknown(String),
}

/// State shared across REPL lines
#[derive(Debug)]
pub struct ReplSession {
    engine: Evalis,
    context: Value,
}

impl ReplSession {
    pub fn new(context: Value, options: EvaluatorOptions) -> Self {
        Self {
            engine: Evalis::new(options),
            context,
        }
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn options(&self) -> &EvaluatorOptions {
        self.engine.options()
    }

    /// Evaluate one input line against the session context
    pub fn evaluate(&self, input: &str) -> std::result::Result<Value, EvalisError> {
        self.engine.evaluate(input, &self.context)
    }

    /// Handle a `:` command
    pub fn handle_command(&mut self, input: &str) -> CommandOutcome {
        let mut parts = input.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let arg = parts.next();

        match (command, arg) {
            (":quit" | ":q" | ":exit", _) => return CommandOutcome::Quit,
            (":help" | ":h", _) => print_help(),
            (":context" | ":ctx", _) => match serde_json::to_string_pretty(&self.context) {
                Ok(json) => println!("{}", json),
                Err(e) => cli::error(&e.to_string()),
            },
            (":null", Some("on")) => self.set_null_on_bad_access(true),
            (":null", Some("off")) => self.set_null_on_bad_access(false),
            (":null", None) => cli::info(&format!(
                "null-on-bad-access is {}",
                on_off(self.options().should_null_on_bad_access)
            )),
            (":cache", _) => self.print_cache(),
            _ => return CommandOutcome::Unknown(input.to_string()),
        }

        CommandOutcome::Continue
    }

    fn set_null_on_bad_access(&mut self, enabled: bool) {
        let options = self.options().with_null_on_bad_access(enabled);
        self.engine.set_options(options);
        cli::success(&format!("null-on-bad-access {}", on_off(enabled)));
    }

    fn print_cache(&self) {
        match self.engine.cache() {
            Some(cache) => {
                let metrics = cache.metrics_snapshot();
                println!("{}", "AST cache:".cyan().bold());
                println!("  entries:   {}/{}", cache.len(), cache.capacity());
                println!("  hits:      {}", metrics.hits);
                println!("  misses:    {}", metrics.misses);
                println!("  evictions: {}", metrics.evictions);
                println!("  hit rate:  {:.1}%", metrics.hit_rate() * 100.0);
            }
            None => println!("{}", "AST cache disabled (EVALIS_CACHE_SIZE=0)".dimmed()),
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Run the interactive REPL
pub fn run_repl(context: Value, options: EvaluatorOptions) -> Result<()> {
    println!("{}", format!("Evalis REPL v{}", crate::VERSION).cyan().bold());
    println!("{}", "Type :help for help, :quit to exit".dimmed());
    println!();

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .auto_add_history(true)
        .build();

    let mut rl: Editor<(), FileHistory> = Editor::with_config(config)?;

    let history_path = get_history_path();
    if let Some(path) = &history_path {
        let _ = rl.load_history(path); // Ignore errors if history doesn't exist yet
    }

    let mut session = ReplSession::new(context, options);
    let mut line_number = 1;
    let mut multiline_buffer = String::new();

    loop {
        let prompt = if multiline_buffer.is_empty() {
            format!("evalis:{} ", line_number).green().bold().to_string()
        } else {
            "   ... ".yellow().bold().to_string()
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                // Lines ending with \ continue on the next line
                if let Some(head) = trimmed.strip_suffix('\\') {
                    multiline_buffer.push_str(head);
                    multiline_buffer.push('\n');
                    continue;
                }

                multiline_buffer.push_str(trimmed);
                let input = std::mem::take(&mut multiline_buffer);
                let input = input.trim();

                if input.is_empty() {
                    continue;
                }

                if input.starts_with(':') {
                    match session.handle_command(input) {
                        CommandOutcome::Quit => {
                            println!("{}", "Goodbye!".cyan());
                            break;
                        }
                        CommandOutcome::Unknown(command) => {
                            eprintln!("{} {}", "Unknown command:".red(), command);
                            println!("{}", "Type :help for available commands".dimmed());
                        }
                        CommandOutcome::Continue => {}
                    }
                    continue;
                }

                match session.evaluate(input) {
                    Ok(value) => {
                        println!("{}", format_value(&value));
                        line_number += 1;
                    }
                    Err(EvalisError::Syntax { errors }) => {
                        eprint!("{}", format_syntax_errors(&errors, input));
                    }
                    Err(e) => cli::error(&e.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                multiline_buffer.clear();
                println!("{}", "^C".dimmed());
                println!("{}", "Use :quit to exit".dimmed());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".cyan());
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red().bold(), err);
                break;
            }
        }
    }

    if let Some(path) = history_path {
        let _ = rl.save_history(&path); // Ignore errors on save
    }

    Ok(())
}

/// Get the history file path
fn get_history_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(".evalis_history"))
}

fn print_help() {
    println!("{}", "Evalis REPL Commands:".cyan().bold());
    println!("  {}  - Show this help message", ":help, :h".green());
    println!("  {}  - Exit the REPL", ":quit, :q, :exit".green());
    println!("  {}  - Show the evaluation context", ":context".green());
    println!("  {}  - Toggle null-on-bad-access", ":null on|off".green());
    println!("  {}  - Show AST cache metrics", ":cache".green());
    println!();
    println!("{}", "Features:".cyan().bold());
    println!(
        "  {} - Persistent command history (~/.evalis_history)",
        "Up/Down arrows".dimmed()
    );
    println!("  {} - Search history", "Ctrl-R".dimmed());
    println!(
        "  {} - Multi-line input (end line with \\)",
        "Backslash".dimmed()
    );
    println!();
    println!("{}", "Examples:".cyan().bold());
    println!("  {}  - Arithmetic", "2 + 2 * 3".dimmed());
    println!("  {}  - Look up context data", "user.name".dimmed());
    println!("  {}  - Membership", "\"admin\" in user.roles".dimmed());
    println!("  {}  - Comprehension", "[x * 2 for x in items]".dimmed());
}
