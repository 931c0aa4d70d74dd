//! Progress events for operation visibility.
//!
//! Emitted by the dispatcher at fixed checkpoints and for every line a
//! subprocess streams. Transient: nothing here is persisted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Percent value meaning "no meaningful percentage"
pub const INDETERMINATE: f32 = -1.0;

/// Fixed checkpoints reported for every executed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    Started,
    Prepared,
    Running,
    Processing,
    Finished,
}

impl Checkpoint {
    pub fn percent(&self) -> f32 {
        match self {
            Self::Started => 0.0,
            Self::Prepared => 20.0,
            Self::Running => 50.0,
            Self::Processing => 80.0,
            Self::Finished => 100.0,
        }
    }
}

/// One progress update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Operation this event belongs to
    pub operation_id: Uuid,
    pub message: String,
    /// 0..=100, or [`INDETERMINATE`]
    pub percent: f32,
}

impl ProgressEvent {
    pub fn new(operation_id: Uuid, message: impl Into<String>, percent: f32) -> Self {
        Self {
            operation_id,
            message: message.into(),
            percent,
        }
    }

    pub fn checkpoint(operation_id: Uuid, checkpoint: Checkpoint, message: impl Into<String>) -> Self {
        Self::new(operation_id, message, checkpoint.percent())
    }

    /// A line of subprocess output
    pub fn output_line(operation_id: Uuid, line: impl Into<String>) -> Self {
        Self::new(operation_id, line, INDETERMINATE)
    }

    pub fn is_indeterminate(&self) -> bool {
        self.percent < 0.0
    }

    /// Format for debug display
    pub fn format_debug(&self) -> String {
        if self.is_indeterminate() {
            format!("[lumi] {}", self.message)
        } else {
            format!("[lumi {:>3.0}%] {}", self.percent, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_format() {
        let id = Uuid::new_v4();
        let event = ProgressEvent::checkpoint(id, Checkpoint::Running, "Installing firefox");
        assert_eq!(event.percent, 50.0);
        assert!(event.format_debug().contains("50%"));
        assert!(event.format_debug().contains("Installing firefox"));

        let line = ProgressEvent::output_line(id, "copying path");
        assert!(line.is_indeterminate());
        assert_eq!(line.format_debug(), "[lumi] copying path");
    }

    #[test]
    fn test_checkpoints_ascend() {
        let all = [
            Checkpoint::Started,
            Checkpoint::Prepared,
            Checkpoint::Running,
            Checkpoint::Processing,
            Checkpoint::Finished,
        ];
        assert!(all.windows(2).all(|w| w[0].percent() < w[1].percent()));
    }
}
