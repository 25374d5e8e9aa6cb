//! Command Dispatch
//!
//! Decides whether a command name is a builtin or an external executable and
//! runs it. Resolution is split from running so a pipeline can resolve every
//! stage before any of them starts.

use tracing::debug;

use crate::interpreter::builtins::Builtin;
use crate::interpreter::errors::ShellError;
use crate::interpreter::job::Job;
use crate::interpreter::types::{ExecEnv, ExecResult, InvocationContext, JobStatus, SessionState};
use crate::vm::context::PauseSignal;

/// A command name bound to what will run it.
#[derive(Debug)]
pub enum Resolved {
    Builtin(Builtin),
    External(Job),
}

/// What running one command produced.
#[derive(Debug)]
pub enum StageOutcome {
    Done(ExecResult),
    /// The job parked at a checkpoint and still holds its context.
    Suspended { job: Job, output: String },
}

/// Dispatch context containing dependencies needed to run commands
pub struct Dispatcher<'a> {
    env: &'a ExecEnv,
    session: &'a mut SessionState,
    pause: &'a PauseSignal,
}

impl<'a> Dispatcher<'a> {
    pub fn new(env: &'a ExecEnv, session: &'a mut SessionState, pause: &'a PauseSignal) -> Self {
        Self { env, session, pause }
    }

    pub fn session(&self) -> &SessionState {
        &*self.session
    }

    /// Builtins first, then the search path.
    pub async fn resolve(&self, argv: &[String]) -> Result<Resolved, ShellError> {
        let name = argv.first().map(String::as_str).unwrap_or("");
        if let Some(builtin) = Builtin::from_name(name) {
            return Ok(Resolved::Builtin(builtin));
        }
        let job = Job::new(self.env, argv.to_vec(), &self.session.cwd).await?;
        Ok(Resolved::External(job))
    }

    pub async fn run(
        &mut self,
        resolved: Resolved,
        invocation: InvocationContext,
    ) -> Result<StageOutcome, ShellError> {
        match resolved {
            Resolved::Builtin(builtin) => {
                debug!(builtin = builtin.name(), "dispatching builtin");
                let result = builtin.run(self.env, self.session, &invocation).await?;
                Ok(StageOutcome::Done(result))
            }
            Resolved::External(mut job) => {
                debug!(job = job.display_name(), path = job.path(), "dispatching job");
                let status = job.exec(invocation, self.pause.clone()).await?;
                Ok(outcome_of(job, status))
            }
        }
    }

    /// Resolve and run `invocation.argv` in one step.
    pub async fn exec(&mut self, invocation: InvocationContext) -> Result<StageOutcome, ShellError> {
        let resolved = self.resolve(&invocation.argv).await?;
        self.run(resolved, invocation).await
    }
}

/// Map a job status onto a stage outcome; runtime errors become stderr text.
pub fn outcome_of(job: Job, status: JobStatus) -> StageOutcome {
    match status {
        JobStatus::Completed { output } => StageOutcome::Done(ExecResult::output(output)),
        JobStatus::Failed { output, error } => {
            StageOutcome::Done(ExecResult::new(output, format!("{}\n", error), false))
        }
        JobStatus::Suspended { output } => StageOutcome::Suspended { job, output },
    }
}
