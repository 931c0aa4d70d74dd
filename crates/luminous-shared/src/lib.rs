//! Shared types for Luminous Nix components.
//!
//! The data model passed between the parser, the dispatcher and front-ends.

pub mod error;
pub mod intent;
pub mod operation;
pub mod progress;
pub mod result;

pub use error::LuminousError;
pub use intent::{Intent, IntentKind, IntentType, RebuildMode};
pub use operation::{OperationState, OperationTracker};
pub use progress::{Checkpoint, ProgressEvent, INDETERMINATE};
pub use result::{OperationResult, Response};
