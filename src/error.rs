use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CfgError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{count} syntax error(s) in {file}")]
    Syntax { file: String, count: usize },

    #[error("Configuration has {count} error(s)")]
    Invalid { count: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Duplicate entry '{name}' in section '{section}'")]
    DuplicateEntry { section: String, name: String },

    #[error("No such section: {0}")]
    NoSuchSection(String),

    #[error("Program name is required: call .program() on the loader")]
    ProgramRequired,

    #[error("Failed to serialize configuration tree: {0}")]
    Json(#[from] serde_json::Error),
}

impl CfgError {
    /// True for the "lookup found nothing" outcome, which callers usually treat
    /// as a normal result rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CfgError::NotFound(_))
    }
}

/// Why a label could not be turned into a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("expected string value")]
    NotAString,

    #[error("missing value")]
    MissingValue,

    #[error("expected list, but found array")]
    ExpectedList,

    #[error("not a number (stopped near `{rest}')")]
    NotANumber { rest: String },

    #[error("numeric overflow")]
    Overflow,

    #[error("value out of allowed range")]
    OutOfRange,

    #[error("not a boolean")]
    NotABoolean,

    #[error("not an IPv4 address")]
    NotAnIpv4,

    #[error("{0}")]
    InvalidCidr(String),

    #[error("cannot resolve hostname `{0}'")]
    UnresolvableHost(String),

    #[error("{0}")]
    Custom(String),
}

impl ConversionError {
    pub fn custom(msg: impl Into<String>) -> Self {
        ConversionError::Custom(msg.into())
    }
}
