//! Variable interpolation for command templates.
//!
//! Command templates in the config use `${variable}` syntax. Run variables
//! (`org_alias`, `test_level`, `auth_file`, `reports_dir`, ...) are resolved
//! first, then the process environment.
//!
//! Every substituted value is shell-quoted so it stays a single word, which
//! means a `${variable}` should not itself be wrapped in quotes. Fragments
//! registered with [`InterpolationContext::set_fragment`] are inserted as-is.
//!
//! # Syntax
//!
//! - `${variable_name}` - replaced with variable value
//! - `$${escaped}` - produces literal `${escaped}` in output
//!
//! # Example
//!
//! ```yaml
//! deploy: "sf project deploy start --target-org ${org_alias} --test-level ${test_level}"
//! ```

use crate::error::{PromoteError, Result};
use crate::shell::quote_arg;
use std::collections::{HashMap, HashSet};

/// A segment of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// Variable reference: ${name}
    Variable(String),
}

/// Parse a string containing ${var} interpolations.
pub fn parse_interpolation(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current_literal = String::new();

    while let Some(c) = chars.next() {
        if c != '$' {
            current_literal.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                // Escaped: $$ becomes $
                chars.next();
                if chars.peek() == Some(&'{') {
                    // $${...} -> literal ${...}
                    chars.next();
                    current_literal.push_str("${");
                    for c in chars.by_ref() {
                        current_literal.push(c);
                        if c == '}' {
                            break;
                        }
                    }
                } else {
                    current_literal.push('$');
                }
            }
            Some('{') => {
                chars.next();

                if !current_literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut current_literal)));
                }

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                segments.push(Segment::Variable(var_name.trim().to_string()));
            }
            _ => current_literal.push(c),
        }
    }

    if !current_literal.is_empty() {
        segments.push(Segment::Literal(current_literal));
    }

    segments
}

/// Extract all variable names from an interpolated string.
pub fn extract_variables(input: &str) -> HashSet<String> {
    parse_interpolation(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Variable(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Context for variable resolution.
///
/// Variables are resolved in priority order:
/// 1. Run variables set by the pipeline
/// 2. Environment variables
#[derive(Debug, Default, Clone)]
pub struct InterpolationContext {
    /// Variables describing the current run.
    pub run: HashMap<String, String>,

    /// Environment variables.
    pub env: HashMap<String, String>,

    /// Run variables that are pre-built command-line fragments.
    fragments: HashSet<String>,
}

impl InterpolationContext {
    /// Create an empty context with the tool version set.
    pub fn new() -> Self {
        let mut run = HashMap::new();
        run.insert(
            "sfpromote_version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        Self {
            run,
            ..Default::default()
        }
    }

    /// Add environment variables from a HashMap.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Set a run variable.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fragments.remove(name);
        self.run.insert(name.to_string(), value.into());
    }

    /// Set a run variable that is substituted without quoting.
    ///
    /// Only for fragments assembled from validated values.
    pub fn set_fragment(&mut self, name: &str, value: impl Into<String>) {
        self.run.insert(name.to_string(), value.into());
        self.fragments.insert(name.to_string());
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.run.get(name).or_else(|| self.env.get(name)).cloned()
    }
}

/// Resolve all variables in a command template, quoting each value.
///
/// # Errors
///
/// Returns `ConfigValidationError` if any variable is not found in the context.
pub fn resolve_string(input: &str, context: &InterpolationContext) -> Result<String> {
    let mut result = String::new();

    for segment in parse_interpolation(input) {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Variable(name) => {
                let value =
                    context
                        .resolve(&name)
                        .ok_or_else(|| PromoteError::ConfigValidationError {
                            message: format!("Unresolved variable: ${{{}}}", name),
                        })?;
                if context.fragments.contains(&name) {
                    result.push_str(&value);
                } else {
                    result.push_str(&quote_arg(&value));
                }
            }
        }
    }

    Ok(result)
}
