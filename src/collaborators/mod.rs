//! Seams to the outside world: AI completion, shell commands, terminals.
//!
//! Each trait has a thin process-backed implementation. The scheduler only
//! talks to the traits, so tests swap in in-memory fakes.

mod ai;
mod prompts;
mod pty;
mod runner;

use thiserror::Error;

pub use ai::{AiClient, ClaudeCli};
pub use prompts::PromptRenderer;
pub use pty::{ProcessPty, PtyEvent, PtyInput, PtySession, PtySpawner};
pub use runner::{CommandEvent, CommandRunner, ShellRunner};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected output from {program}: {message}")]
    Parse { program: String, message: String },

    #[error("Terminal {step} failed: {message}")]
    Terminal { step: &'static str, message: String },

    #[error("Prompt template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl CollaboratorError {
    pub(crate) fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub(crate) fn failed(
        program: impl Into<String>,
        status: std::process::ExitStatus,
        stderr: &[u8],
    ) -> Self {
        Self::CommandFailed {
            program: program.into(),
            status: status
                .code()
                .map(|c| format!("code {c}"))
                .unwrap_or_else(|| "signal".to_string()),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }

    pub(crate) fn pty(step: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Terminal {
            step,
            message: error.to_string(),
        }
    }

    pub(crate) fn parse(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            program: program.into(),
            message: message.into(),
        }
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;
