//! Finite-state machines for the AI-assisted workflows.
//!
//! Each machine owns its status enum and legal-transition graph. The reducer
//! calls into these types and turns a [`WorkflowError`] into the owning
//! slice's `error` field.

mod change;
mod constitution;
mod review;

use thiserror::Error;

pub use change::{Change, ChangeStatus, GenerationKind};
pub use constitution::{ConstitutionStatus, ConstitutionWorkflow};
pub use review::{CommentTarget, ReviewContent, ReviewKind, ReviewSession, ReviewStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Invalid {machine} transition from {from} to {to}")]
    InvalidTransition {
        machine: &'static str,
        from: String,
        to: String,
    },

    #[error("{0}")]
    Precondition(String),

    #[error("Review session {0} is closed")]
    SessionClosed(String),

    #[error("Comment not found: {0}")]
    CommentNotFound(String),

    #[error("Generation produced no output")]
    EmptyOutput,
}

impl WorkflowError {
    pub(crate) fn transition(
        machine: &'static str,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            machine,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}
