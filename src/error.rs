//! Error types for the mutation runner.
//!
//! Two families that never mix: configuration errors are raised synchronously
//! while the runner is being set up, operation failures only ever travel
//! through observable state and the error callback.

use crate::document::{DocumentError, OperationKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Setup-time faults. Fatal; surfaced before any trigger is possible.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(
        "The runner requires a mutation, but a {kind} was passed. Use the matching component for {kind} operations."
    )]
    WrongOperationKind { kind: OperationKind },

    #[error("Could not find an executing client. Supply a client handle when constructing the runner.")]
    MissingClient,

    #[error("Invalid operation document: {0}")]
    InvalidDocument(#[from] DocumentError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for RunnerError {
    fn from(err: config::ConfigError) -> Self {
        RunnerError::ConfigError(err.to_string())
    }
}

/// A single error entry reported by the remote executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }
}

/// Typed failure of a remote operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationFailure {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation error: {}", join_messages(.0))]
    Execution(Vec<ErrorDetail>),

    #[error("Client error: {0}")]
    Client(String),
}

impl OperationFailure {
    /// Messages of every underlying error, in order.
    pub fn messages(&self) -> Vec<String> {
        match self {
            OperationFailure::Network(message) | OperationFailure::Client(message) => {
                vec![message.clone()]
            }
            OperationFailure::Execution(errors) => {
                errors.iter().map(|e| e.message.clone()).collect()
            }
        }
    }
}

fn join_messages(errors: &[ErrorDetail]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
