//! Per-operation lifecycle: Pending -> Running -> {Succeeded, Failed}.
//!
//! There is no retry edge. A failed operation is terminal and the caller
//! must dispatch a new one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LuminousError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn can_move_to(&self, next: OperationState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Tracks the state of a single dispatched operation
#[derive(Debug, Clone)]
pub struct OperationTracker {
    id: Uuid,
    state: OperationState,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: OperationState::Pending,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn start(&mut self) -> Result<(), LuminousError> {
        self.transition(OperationState::Running)
    }

    /// Move to Succeeded or Failed depending on `success`
    pub fn finish(&mut self, success: bool) -> Result<(), LuminousError> {
        if success {
            self.transition(OperationState::Succeeded)
        } else {
            self.transition(OperationState::Failed)
        }
    }

    fn transition(&mut self, next: OperationState) -> Result<(), LuminousError> {
        if !self.state.can_move_to(next) {
            return Err(LuminousError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}
