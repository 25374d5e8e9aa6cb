//! Interpreter Types
//!
//! Values passed between the orchestrator, the dispatcher, builtins and jobs.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::fs::FileSystem;
use crate::interpreter::context_pool::SharedPool;
use crate::interpreter::pipe_buffer::PipeBuffer;
use crate::vm::types::{RuntimeError, SharedEngineFactory};

/// Per-invocation state handed to a command by value.
///
/// Each dispatch gets its own copy, so a nested invocation can never see or
/// clobber its caller's arguments.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    /// Argument vector; `argv[0]` is the command name as typed
    pub argv: Vec<String>,
    /// Standard input of this stage
    pub stdin: PipeBuffer,
    /// Working directory at dispatch time
    pub cwd: String,
}

impl InvocationContext {
    /// An invocation with empty, closed stdin.
    pub fn new(argv: Vec<String>, cwd: impl Into<String>) -> Self {
        Self {
            argv,
            stdin: PipeBuffer::from_text(""),
            cwd: cwd.into(),
        }
    }

    pub fn with_stdin(mut self, stdin: PipeBuffer) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    /// Arguments after the command name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// Job-table number shown to the user, as in `[1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// How a job run ended (for now).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed { output: String },
    Failed { output: String, error: RuntimeError },
    Suspended { output: String },
}

impl JobStatus {
    pub fn output(&self) -> &str {
        match self {
            JobStatus::Completed { output }
            | JobStatus::Failed { output, .. }
            | JobStatus::Suspended { output } => output,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, JobStatus::Suspended { .. })
    }
}

/// Result of running a line or a single command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    /// Set when the line stopped on a suspended job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended_job: Option<JobId>,
}

impl ExecResult {
    pub fn new(stdout: String, stderr: String, success: bool) -> Self {
        Self { stdout, stderr, success, suspended_job: None }
    }

    /// Success result with no output
    pub fn ok() -> Self {
        Self::new(String::new(), String::new(), true)
    }

    /// Success result with stdout
    pub fn output(stdout: impl Into<String>) -> Self {
        Self::new(stdout.into(), String::new(), true)
    }

    /// Failure result with stderr message
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::new(String::new(), stderr.into(), false)
    }
}

impl Default for ExecResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// Shared collaborators every command execution needs.
#[derive(Clone)]
pub struct ExecEnv {
    pub fs: Arc<dyn FileSystem>,
    /// Ordered directories scanned for executables
    pub search_path: Vec<String>,
    /// Session pool; `None` gives each job a private context
    pub pool: Option<SharedPool>,
    pub engines: SharedEngineFactory,
}

impl fmt::Debug for ExecEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecEnv")
            .field("search_path", &self.search_path)
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

/// Mutable session state builtins may change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub cwd: String,
    pub home: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self { cwd: "/".to_string(), home: "/".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_args() {
        let inv = InvocationContext::new(vec!["head".into(), "-n".into(), "1".into()], "/tmp");
        assert_eq!(inv.name(), "head");
        assert_eq!(inv.args(), ["-n", "1"]);
        assert!(inv.stdin.is_closed());
    }

    #[test]
    fn test_invocation_without_argv() {
        let inv = InvocationContext::default();
        assert_eq!(inv.name(), "");
        assert!(inv.args().is_empty());
    }

    #[test]
    fn test_job_status_output() {
        let status = JobStatus::Failed {
            output: "partial".into(),
            error: RuntimeError::new("E", "m"),
        };
        assert_eq!(status.output(), "partial");
        assert!(!status.is_suspended());
    }

    #[test]
    fn test_exec_result_json_skips_missing_job() {
        let json = serde_json::to_string(&ExecResult::output("hi\n")).unwrap();
        assert_eq!(json, r#"{"stdout":"hi\n","stderr":"","success":true}"#);
    }
}
