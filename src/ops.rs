//! Config operations: dumping, lookup, linting, and result types.
//!
//! Provides the logic behind the introspection actions and the
//! `ConfigResult` enum that callers use to display results.

use std::fmt;

use crate::diag::{Diagnostics, Locus};
use crate::error::CfgError;
use crate::format::{self, FormatOptions};
use crate::path;
use crate::tree::Tree;
use crate::value::Value;

/// Result of a config operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigResult {
    /// Configuration text or a schema template.
    Text(String),
    /// JSON rendering of a tree.
    Json(String),
    /// The node found at a path.
    Value {
        path: String,
        value: Option<Value>,
        locus: Locus,
    },
    /// Outcome of a lint run, with every message in order.
    Lint {
        errors: usize,
        warnings: usize,
        messages: Vec<String>,
    },
}

impl ConfigResult {
    /// False only for a lint run that found errors.
    pub fn is_success(&self) -> bool {
        !matches!(self, ConfigResult::Lint { errors, .. } if *errors > 0)
    }
}

impl fmt::Display for ConfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigResult::Text(t) | ConfigResult::Json(t) => write!(f, "{t}"),
            ConfigResult::Value { path, value, locus } => {
                if !locus.is_internal() {
                    writeln!(f, "# {locus}")?;
                }
                match value {
                    Some(v) => write!(f, "{path} = {v}"),
                    None => write!(f, "{path}"),
                }
            }
            ConfigResult::Lint {
                errors,
                warnings,
                messages,
            } => {
                for m in messages {
                    writeln!(f, "{m}")?;
                }
                write!(f, "{errors} error(s), {warnings} warning(s)")
            }
        }
    }
}

/// Render a tree in configuration syntax.
pub fn dump(tree: &Tree) -> ConfigResult {
    ConfigResult::Text(format::format_tree(tree, FormatOptions::default()))
}

pub fn to_json(tree: &Tree) -> Result<ConfigResult, CfgError> {
    Ok(ConfigResult::Json(serde_json::to_string_pretty(tree)?))
}

/// Look up a path, with the node's value and where it was set.
pub fn get_value(tree: &Tree, path: &str) -> Result<ConfigResult, CfgError> {
    let id = path::find_node(tree, path)?;
    let node = tree.node(id);
    Ok(ConfigResult::Value {
        path: path.to_string(),
        value: node.label.clone(),
        locus: node.locus.clone(),
    })
}

pub fn lint(diag: &Diagnostics) -> ConfigResult {
    ConfigResult::Lint {
        errors: diag.error_count(),
        warnings: diag.warning_count(),
        messages: diag.iter().map(|d| d.to_string()).collect(),
    }
}
