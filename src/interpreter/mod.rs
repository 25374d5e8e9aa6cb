//! Interpreter module
//!
//! Turns a parsed command line into running commands:
//!
//! - `pipe_buffer`: line buffers between stages
//! - `context_pool`: bounded pool of execution contexts
//! - `job`: one external command bound to a context
//! - `builtins` / `builtin_dispatch`: builtin-or-executable dispatch
//! - `pipeline_execution`: staged, buffered pipelines with redirections

pub mod builtin_dispatch;
pub mod builtins;
pub mod command_resolution;
pub mod context_pool;
pub mod errors;
pub mod job;
pub mod pipe_buffer;
pub mod pipeline_execution;
pub mod types;

pub use builtin_dispatch::{Dispatcher, Resolved, StageOutcome};
pub use builtins::Builtin;
pub use command_resolution::{find_executable, resolve_command, DEFAULT_PATH};
pub use context_pool::{lock_pool, ContextPool, PoolStats, SharedPool};
pub use errors::ShellError;
pub use job::Job;
pub use pipe_buffer::PipeBuffer;
pub use pipeline_execution::{execute_pipeline, resume_pipeline, PipelineResult, SuspendedPipeline};
pub use types::*;
