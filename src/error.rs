//! Error types for the console engine.

use thiserror::Error;

/// Errors surfaced at the edges of the engine.
///
/// The calculators and the registry never produce these: missing or
/// malformed per-field data degrades to "unknown" instead.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The status document could not be decoded.
    #[error("Failed to parse status document: {0}")]
    Parse(String),

    /// Reading a snapshot or settings file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be loaded or deserialized.
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// A duration string such as "500ms" could not be parsed.
    #[error("Unknown duration format: {0}")]
    Duration(String),

    /// A namespace outside `http` / `stream`.
    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
