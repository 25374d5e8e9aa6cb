//! Engine Types
//!
//! The script engine is an external collaborator: the shell only needs to hand
//! it a program, let it talk to an `Invocation`, and reset it between uses.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::vm::context::Invocation;

/// Leading bytes of every loadable precompiled program.
pub const BYTECODE_MAGIC: &[u8; 8] = b"RITE0300";

/// Check whether `bytes` starts with the bytecode magic header.
pub fn has_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(BYTECODE_MAGIC)
}

/// An error captured from a program run. Displayed as `"<message> (<kind>)"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({kind})")]
pub struct RuntimeError {
    pub message: String,
    pub kind: String,
}

impl RuntimeError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
        }
    }

    /// The run was aborted while parked (context reset or terminated).
    pub fn interrupted() -> Self {
        Self::new("Interrupt", "execution interrupted")
    }
}

/// What a context is asked to run.
#[derive(Clone, PartialEq, Eq)]
pub enum Program {
    /// Precompiled code, magic header included
    Bytecode(Vec<u8>),
    /// Source text the engine compiles first
    Source(String),
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Program::Bytecode(b) => write!(f, "Bytecode({} bytes)", b.len()),
            Program::Source(s) => write!(f, "Source({:?})", s),
        }
    }
}

/// An isolated interpreter instance.
///
/// `run` is called on the context's own worker thread. Engines call
/// [`Invocation::checkpoint`] at safe points so that the context can be parked
/// there; an `Err` from `checkpoint` must be propagated out of `run`.
pub trait Engine: Send {
    /// Compile source text into loadable bytecode.
    fn compile(&mut self, source: &str) -> Result<Vec<u8>, RuntimeError>;

    /// Load and run bytecode to completion.
    fn run(&mut self, bytecode: &[u8], io: &mut Invocation<'_>) -> Result<(), RuntimeError>;

    /// Drop all program state so the instance can be reused.
    fn reset(&mut self);
}

/// Creates engine instances for new contexts.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Box<dyn Engine>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Box<dyn Engine> + Send + Sync,
{
    fn create(&self) -> Box<dyn Engine> {
        self()
    }
}

pub type SharedEngineFactory = Arc<dyn EngineFactory>;
