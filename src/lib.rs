//! embsh - command-execution engine of an embedded shell
//!
//! This library turns a typed command line into running programs: it parses
//! the line, wires pipeline stages together through in-memory buffers, and
//! runs external programs in a bounded pool of script-execution contexts with
//! suspend/resume job control.

pub mod ast;
pub mod fs;
pub mod interpreter;
pub mod parser;
pub mod shell;
pub mod vm;

pub use ast::types::*;
pub use interpreter::{ExecResult, JobId, PoolStats, ShellError};
pub use parser::{parse, Parser, SyntaxError};
pub use shell::{ConfigError, JobInfo, Shell, ShellConfig, ShellOptions};
pub use vm::{Engine, EngineFactory, PauseSignal, RuntimeError};
