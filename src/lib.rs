//! Mutation Runner: ordered orchestration of remote mutations
//!
//! Wraps a single side-effecting remote operation behind a trigger and an
//! observable state. Overlapping triggers are allowed; only the most recently
//! issued call may update the observed state, while every call still runs its
//! completion or error callback exactly once.

pub mod cli;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod runner;
pub mod state;

pub use client::{ClientHandle, MutationClient, MutationRequest, MutationResponse, RefetchQuery};
pub use document::{Document, DocumentClassifier, OperationKind, SourceClassifier};
pub use error::{OperationFailure, RunnerError};
pub use runner::{MutationConfig, MutationOptions, MutationRunner, Trigger};
pub use state::{CallToken, MutationResult, MutationState};
