//! Observable state of a runner and the call tokens that guard it.

use crate::error::OperationFailure;
use serde_json::Value;

/// Snapshot of the sequence counter taken when a call is issued.
///
/// The epoch advances whenever the executing client changes, so a token
/// issued against an old client never equals one issued against the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallToken {
    pub epoch: u64,
    pub seq: u64,
}

/// Monotonic counter owned by a single runner.
#[derive(Debug, Default)]
pub(crate) struct SequenceCounter {
    epoch: u64,
    seq: u64,
}

impl SequenceCounter {
    pub(crate) fn next(&mut self) -> CallToken {
        self.seq += 1;
        self.current()
    }

    pub(crate) fn current(&self) -> CallToken {
        CallToken {
            epoch: self.epoch,
            seq: self.seq,
        }
    }

    pub(crate) fn is_current(&self, token: CallToken) -> bool {
        self.current() == token
    }

    /// Start a fresh sequence for a new client.
    pub(crate) fn reset(&mut self) {
        self.epoch += 1;
        self.seq = 0;
    }
}

/// What the host observes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationState {
    pub called: bool,
    pub loading: bool,
    pub data: Option<Value>,
    pub error: Option<OperationFailure>,
}

impl MutationState {
    /// State after a trigger, before the outcome is known.
    pub(crate) fn pending() -> Self {
        Self {
            called: true,
            loading: true,
            data: None,
            error: None,
        }
    }

    /// `None` until the first trigger.
    pub fn result(&self) -> Option<MutationResult> {
        if !self.called {
            return None;
        }
        Some(if self.loading {
            MutationResult::Loading
        } else if let Some(error) = &self.error {
            MutationResult::Failed(error.clone())
        } else {
            MutationResult::Succeeded(self.data.clone())
        })
    }
}

/// Consistent view over [`MutationState`] handed to renderers.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationResult {
    Loading,
    /// `None` data when the operation returned nothing or results are ignored.
    Succeeded(Option<Value>),
    Failed(OperationFailure),
}

impl MutationResult {
    pub fn is_loading(&self) -> bool {
        matches!(self, MutationResult::Loading)
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            MutationResult::Succeeded(data) => data.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&OperationFailure> {
        match self {
            MutationResult::Failed(error) => Some(error),
            _ => None,
        }
    }
}
