use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or corrupt persisted artifacts, or an unusable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A chunk without id or content, or an empty premise.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Embedding or classification backend failed to load or to answer.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A mutation could not be committed; the last committed state is intact.
    #[error("Partial write: {0}")]
    PartialWrite(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    MalformedInput,
    ModelUnavailable,
    DimensionMismatch,
    PartialWrite,
    Cancelled,
}

/// Structured error handed to callers at the user-facing boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::MalformedInput(_) => ErrorKind::MalformedInput,
            Error::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Error::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Error::PartialWrite(_) => ErrorKind::PartialWrite,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport { kind: self.kind(), message: self.to_string() }
    }

    /// Wrap a backend failure (embedding or NLI) keeping its context chain.
    pub fn model(err: anyhow::Error) -> Self {
        Error::ModelUnavailable(format!("{err:#}"))
    }

    pub fn config(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Config(format!("{context}: {err}"))
    }

    pub fn partial_write(context: &str, err: impl std::fmt::Display) -> Self {
        Error::PartialWrite(format!("{context}: {err}"))
    }
}

impl From<Error> for ErrorReport {
    fn from(err: Error) -> Self {
        err.report()
    }
}
