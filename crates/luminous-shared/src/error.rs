//! Error types for Luminous Nix.

use thiserror::Error;

use crate::operation::OperationState;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LuminousError {
    #[error("Invalid operation transition: {from} -> {to}")]
    InvalidTransition {
        from: OperationState,
        to: OperationState,
    },
}
