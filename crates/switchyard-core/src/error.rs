//! Error types for Switchyard

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using SwitchyardError
pub type Result<T> = std::result::Result<T, SwitchyardError>;

/// Main error type for Switchyard core operations
#[derive(Debug, Error)]
pub enum SwitchyardError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Package graph errors
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid task name in the pipeline
    #[error("Invalid task name '{name}': {reason}")]
    InvalidTaskName { name: String, reason: String },

    /// Invalid concurrency setting
    #[error("Invalid concurrency value {0}: must be at least 1")]
    InvalidConcurrency(usize),

    /// Invalid dependency entry in the pipeline
    #[error("Invalid dependency '{dep}' of task '{task}': {reason}")]
    InvalidDependency {
        task: String,
        dep: String,
        reason: String,
    },

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error reading config
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Package graph errors
#[derive(Debug, Error)]
pub enum GraphError {
    /// Circular dependency between workspace packages
    #[error("Circular dependency detected among packages: {0}")]
    CyclicDependency(String),

    /// Empty package name
    #[error("Package name may not be empty")]
    EmptyPackageName,
}

impl SwitchyardError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
