// error.rs — Error types for the policy subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during policy operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A policy file or directory could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A rule or settings file is not valid TOML or violates the schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// An argument pattern is not a valid regular expression.
    #[error("invalid argument pattern '{pattern}': {source}")]
    InvalidArgsPattern {
        pattern: String,
        source: regex::Error,
    },

    /// A declared priority would leak out of its trust tier.
    #[error("declared priority {priority} is outside [0, 1000)")]
    PriorityOutOfRange { priority: f64 },

    /// A User-tier priority would reach the band held by interactive approvals.
    #[error("user-tier declared priority {priority} must be below 950")]
    ReservedPriority { priority: f64 },

    /// A runtime-appended rule's compiled priority lies outside the band it may use.
    #[error("rule priority {priority} is outside the permitted band {min}..{max}")]
    RulePriorityOutOfBand { priority: f64, min: f64, max: f64 },

    /// A rule entry combines fields that cannot be used together.
    #[error("invalid rule: {reason}")]
    InvalidRule { reason: String },

    /// A runtime-injected tool identity is empty, contains whitespace, or is a wildcard.
    #[error("invalid tool name '{name}': {reason}")]
    InvalidToolName { name: String, reason: String },

    /// The engine has not published its initial rule set yet.
    #[error("policy engine is not ready: rules are still loading")]
    NotReady,

    /// The engine already published its rule set; rules can only be appended.
    #[error("policy engine already loaded; use add_rule to append rules")]
    AlreadyLoaded,

    /// Loading was cancelled before the rule set was published.
    #[error("policy load cancelled")]
    LoadCancelled,

    /// The background load task failed to complete.
    #[error("policy load task failed: {0}")]
    LoadTask(String),
}
