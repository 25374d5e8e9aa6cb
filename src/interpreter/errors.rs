//! Shell Errors
//!
//! Every failure a command line can produce. Parse and resolution errors are
//! raised before any execution context is acquired; runtime errors come back
//! from a context and are recoverable. The shell loop turns any of these into
//! a stderr diagnostic and `success = false`.

use thiserror::Error;

use crate::fs::FsError;
use crate::interpreter::types::JobId;
use crate::parser::SyntaxError;
use crate::vm::context::ContextId;
use crate::vm::types::RuntimeError;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// No builtin or executable on the search path matches the name
    #[error("{name}: command not found")]
    Resolution { name: String },

    /// The file does not start with the bytecode magic header
    #[error("{path}: invalid code")]
    InvalidCode { path: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("{name}: {message}")]
    Builtin { name: String, message: String },

    /// Reserved builtin name with no handler in this shell
    #[error("{name}: not supported")]
    Unsupported { name: String },

    /// The context's worker went away mid-run
    #[error("execution context {id} is gone")]
    ContextLost { id: ContextId },

    #[error("failed to start execution context: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("job is not suspended")]
    NotSuspended,

    #[error("job is already running")]
    AlreadyRunning,

    #[error("{0}: no such job")]
    NoSuchJob(JobId),
}

impl ShellError {
    pub fn builtin(name: &str, message: impl Into<String>) -> Self {
        ShellError::Builtin {
            name: name.to_string(),
            message: message.into(),
        }
    }
}
