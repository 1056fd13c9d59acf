//! Retry controller state machine
//!
//! Two states: `Collecting` loops back to retrieval, `Done` is terminal.
//! Each evaluation either increments the retry counter or terminates, so
//! a run performs at most `max_retries + 1` retrieval rounds.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::rag::state::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    #[default]
    Collecting,
    Done,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Done)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Collecting => f.write_str("COLLECTING"),
            LoopState::Done => f.write_str("DONE"),
        }
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    RetriesExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryController {
    n_target: usize,
    max_retries: u32,
}

impl RetryController {
    pub fn new(n_target: usize, max_retries: u32) -> Self {
        Self { n_target, max_retries }
    }

    pub fn n_target(&self) -> usize {
        self.n_target
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Why the loop must stop now, if it must
    pub fn stop_reason(&self, state: &RunState) -> Option<StopReason> {
        if state.validated_documents.len() >= self.n_target {
            Some(StopReason::TargetReached)
        } else if state.retry_count >= self.max_retries {
            Some(StopReason::RetriesExhausted)
        } else {
            None
        }
    }

    /// Transition after a validator pass
    ///
    /// Returns `Done` when the target is met or retries are exhausted;
    /// otherwise increments `retry_count` and stays `Collecting`.
    pub fn evaluate(&self, state: &mut RunState) -> LoopState {
        match self.stop_reason(state) {
            Some(reason) => {
                info!(
                    validated = state.validated_documents.len(),
                    retries = state.retry_count,
                    reason = ?reason,
                    "retrieval loop done"
                );
                LoopState::Done
            }
            None => {
                state.retry_count += 1;
                info!(
                    validated = state.validated_documents.len(),
                    retry = state.retry_count,
                    "retrying retrieval"
                );
                LoopState::Collecting
            }
        }
    }
}
