//! Evaluation contexts
//!
//! A context is any [`Value`]. Lookups follow two disciplines: integer
//! indices into lists and string keys into maps. List comprehensions never
//! touch the caller's context; they layer their loop variable on top of it
//! with a [`Scope`].

use crate::ast::Value;
use crate::error::EvalisError;
use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Layered view of a context used during evaluation
///
/// `Binding` shadows one name on top of its parent, so each comprehension
/// iteration sees its own loop variable without copying the base context.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Root(&'a Value),
    Binding {
        name: &'a str,
        value: &'a Value,
        parent: &'a Scope<'a>,
    },
}

impl<'a> Scope<'a> {
    pub fn root(context: &'a Value) -> Self {
        Scope::Root(context)
    }

    /// Create a child scope binding `name` to `value`
    pub fn bind<'b>(&'b self, name: &'b str, value: &'b Value) -> Scope<'b> {
        Scope::Binding {
            name,
            value,
            parent: self,
        }
    }

    /// Resolve a root identifier, innermost binding first
    pub fn resolve(&self, name: &str) -> Result<&'a Value, EvalisError> {
        match self {
            Scope::Root(context) => lookup_field(*context, name),
            Scope::Binding {
                name: bound,
                value,
                parent,
            } => {
                if *bound == name {
                    Ok(*value)
                } else {
                    parent.resolve(name)
                }
            }
        }
    }

    /// The caller's context underneath every binding
    pub fn base(&self) -> &'a Value {
        match self {
            Scope::Root(context) => *context,
            Scope::Binding { parent, .. } => parent.base(),
        }
    }
}

/// Look up `key` in `container`: index into a list, field of a map
pub fn lookup<'v>(container: &'v Value, key: &Value) -> Result<&'v Value, EvalisError> {
    match (container, key) {
        (Value::List(items), key) => {
            let index = list_index(key).ok_or_else(|| {
                EvalisError::access(format!("List index must be a non-negative integer, got {}", key))
            })?;
            items
                .get(index)
                .ok_or_else(|| EvalisError::access(format!("Index out of bounds: {}", index)))
        }
        (Value::Map(_), Value::String(name)) => lookup_field(container, name),
        (Value::Map(_), other) => Err(EvalisError::access(format!(
            "Map key must be a string, got {}",
            other.kind()
        ))),
        (other, key) => Err(EvalisError::access(format!(
            "Cannot access {} on {} value",
            key,
            other.kind()
        ))),
    }
}

/// Look up a string key; only maps have fields
pub fn lookup_field<'v>(container: &'v Value, name: &str) -> Result<&'v Value, EvalisError> {
    match container {
        Value::Map(map) => map
            .get(name)
            .ok_or_else(|| EvalisError::access(format!("Key not found: {}", name))),
        other => Err(EvalisError::access(format!(
            "Cannot access field '{}' on {} value",
            name,
            other.kind()
        ))),
    }
}

/// Integral, non-negative numbers index lists
fn list_index(key: &Value) -> Option<usize> {
    match key {
        Value::Int(i) => usize::try_from(*i).ok(),
        Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= usize::MAX as f64 => {
            Some(*f as usize)
        }
        _ => None,
    }
}

/// Supported context file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFormat {
    Json,
    Yaml,
    Toml,
}

impl ContextFormat {
    /// Pick a format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("json") => Ok(ContextFormat::Json),
            Some("yaml") | Some("yml") => Ok(ContextFormat::Yaml),
            Some("toml") => Ok(ContextFormat::Toml),
            _ => Err(anyhow!(
                "Unsupported context file '{}': expected .json, .yaml, .yml or .toml",
                path.display()
            )),
        }
    }
}

/// Parse a context document
pub fn parse_context_str(input: &str, format: ContextFormat) -> Result<Value> {
    let value = match format {
        ContextFormat::Json => serde_json::from_str(input).context("Invalid JSON context")?,
        ContextFormat::Yaml => serde_yaml::from_str(input).context("Invalid YAML context")?,
        ContextFormat::Toml => toml::from_str(input).context("Invalid TOML context")?,
    };
    Ok(value)
}

/// Load a context from a `.json`, `.yaml`/`.yml` or `.toml` file
pub fn load_context_file<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    let format = ContextFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file: {}", path.display()))?;
    parse_context_str(&content, format)
        .with_context(|| format!("Failed to load context file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn user_context() -> Value {
        serde_json::from_str(r#"{"user": {"name": "Amy", "tags": ["a", "b"]}, "x": 1}"#).unwrap()
    }

    #[test]
    fn test_lookup_disciplines() {
        let ctx = user_context();
        let user = lookup_field(&ctx, "user").unwrap();
        let tags = lookup(user, &Value::from("tags")).unwrap();

        assert_eq!(lookup(tags, &Value::Int(1)).unwrap(), &Value::from("b"));
        assert_eq!(lookup(tags, &Value::Float(0.0)).unwrap(), &Value::from("a"));
        assert!(lookup(tags, &Value::Int(2)).is_err());
        assert!(lookup(tags, &Value::Int(-1)).is_err());
        assert!(lookup(tags, &Value::from("0")).is_err());
        assert!(lookup(user, &Value::Int(0)).is_err());
        assert!(lookup(&Value::Int(3), &Value::from("a")).is_err());
        assert!(lookup(&Value::Null, &Value::from("a")).unwrap_err().is_bad_access());
    }

    #[test]
    fn test_scope_shadows_without_mutation() {
        let ctx = user_context();
        let root = Scope::root(&ctx);
        let shadow = Value::Int(99);
        let inner = root.bind("x", &shadow);

        assert_eq!(inner.resolve("x").unwrap(), &Value::Int(99));
        assert_eq!(root.resolve("x").unwrap(), &Value::Int(1));
        assert!(inner.resolve("user").is_ok());
        assert_eq!(inner.base(), &ctx);
        assert_eq!(ctx, user_context());
    }

    #[test]
    fn test_scope_over_list_context() {
        let ctx = Value::from(vec![1, 2]);
        let item = Value::from("v");
        let root = Scope::root(&ctx);
        let inner = root.bind("item", &item);

        assert_eq!(inner.resolve("item").unwrap(), &Value::from("v"));
        assert!(inner.resolve("other").is_err());
    }

    #[test]
    fn test_context_formats() {
        let yaml = parse_context_str("a:\n  - 1\n  - two\n", ContextFormat::Yaml).unwrap();
        let json = parse_context_str(r#"{"a": [1, "two"]}"#, ContextFormat::Json).unwrap();
        let toml = parse_context_str("a = [1, \"two\"]\n", ContextFormat::Toml).unwrap();
        assert_eq!(yaml, json);
        assert_eq!(toml, json);
        assert!(parse_context_str("{", ContextFormat::Json).is_err());
    }

    #[test]
    fn test_load_context_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(file, r#"{{"name": "evalis"}}"#).unwrap();
        file.flush().unwrap();

        let ctx = load_context_file(file.path()).unwrap();
        assert_eq!(lookup_field(&ctx, "name").unwrap(), &Value::from("evalis"));

        let unknown = NamedTempFile::with_suffix(".ini").unwrap();
        assert!(load_context_file(unknown.path()).is_err());
    }
}
