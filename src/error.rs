//! Error types shared by the casting functions and pipeline stages.
//!
//! Cast functions report [`CastError`]; everything that flows through a
//! pipeline is wrapped into [`Error`], which carries the column that failed
//! so a caller can tell which cell aborted the row. File wrappers and the CLI
//! layer add context on top of these with `anyhow`.

use thiserror::Error;

use crate::row::Column;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CastError {
    #[error("Failed to parse '{value}' as {target}")]
    Malformed { value: String, target: &'static str },
    #[error("Value '{value}' is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },
}

impl CastError {
    pub(crate) fn malformed(value: impl Into<String>, target: &'static str) -> Self {
        CastError::Malformed {
            value: value.into(),
            target,
        }
    }

    pub(crate) fn out_of_range(value: impl Into<String>, target: &'static str) -> Self {
        CastError::OutOfRange {
            value: value.into(),
            target,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Casting column {column}: {source}")]
    Coercion {
        column: Column,
        #[source]
        source: CastError,
    },
    #[error("Invalid pipeline configuration: {0}")]
    Configuration(String),
    #[error("Deserializing record: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
