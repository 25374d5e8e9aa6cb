//! Jobs
//!
//! A job is one attempt to run an external executable. The path is resolved
//! when the job is built; a context is bound only between acquire and
//! release, and release runs exactly once on every exit path (including
//! `Drop`).

use tracing::{debug, warn};

use crate::interpreter::command_resolution::resolve_command;
use crate::interpreter::context_pool::lock_pool;
use crate::interpreter::errors::ShellError;
use crate::interpreter::types::{ExecEnv, InvocationContext, JobStatus};
use crate::vm::context::{ContextId, ContextState, Event, ExecutionContext, PauseSignal, RunHandle};
use crate::vm::loader::load_executable;

pub struct Job {
    display_name: String,
    path: String,
    argv: Vec<String>,
    env: ExecEnv,
    bound: Option<ExecutionContext>,
    run: Option<RunHandle>,
}

impl Job {
    /// Resolve `argv[0]` on the search path. Fails with
    /// [`ShellError::Resolution`] before any context is touched.
    pub async fn new(env: &ExecEnv, argv: Vec<String>, cwd: &str) -> Result<Self, ShellError> {
        let name = argv.first().cloned().unwrap_or_default();
        let path = resolve_command(env.fs.as_ref(), cwd, &env.search_path, &name).await?;
        debug!(command = %name, path = %path, "resolved job");
        Ok(Self {
            display_name: name,
            path,
            argv,
            env: env.clone(),
            bound: None,
            run: None,
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The bound context, if the job currently holds one.
    pub fn context_id(&self) -> Option<ContextId> {
        self.bound.as_ref().map(ExecutionContext::id)
    }

    pub fn is_suspended(&self) -> bool {
        self.run.is_some()
            && self
                .bound
                .as_ref()
                .is_some_and(|ctx| ctx.state() == ContextState::Suspended)
    }

    fn acquire(&self) -> Result<ExecutionContext, ShellError> {
        match &self.env.pool {
            Some(pool) => lock_pool(pool).acquire(),
            None => ExecutionContext::spawn(ContextId::next_temporary(), self.env.engines.as_ref()),
        }
    }

    /// Acquire a context, load the executable into it and run until it
    /// completes or suspends. Only a pause raised after this call reaches
    /// the job.
    pub async fn exec(
        &mut self,
        invocation: InvocationContext,
        pause: PauseSignal,
    ) -> Result<JobStatus, ShellError> {
        if self.bound.is_some() {
            return Err(ShellError::AlreadyRunning);
        }

        let ctx = self.acquire()?;
        self.bound = Some(ctx.clone());
        debug!(job = %self.display_name, context = %ctx.id(), "starting job");

        let invocation = InvocationContext {
            argv: self.argv.clone(),
            ..invocation
        };
        pause.clear();
        match load_executable(self.env.fs.as_ref(), &ctx, &self.path, invocation, pause).await {
            Ok(run) => {
                self.run = Some(run);
                self.wait().await
            }
            Err(err) => {
                self.release_context();
                Err(err)
            }
        }
    }

    /// Re-arm the pause signal and continue a suspended job in the context it
    /// was parked in. A pause left over from before the call is dropped.
    pub async fn resume(&mut self, pause: PauseSignal) -> Result<JobStatus, ShellError> {
        if !self.is_suspended() {
            return Err(ShellError::NotSuspended);
        }
        let Some(ctx) = self.bound.clone() else {
            return Err(ShellError::NotSuspended);
        };

        debug!(job = %self.display_name, context = %ctx.id(), "resuming job");
        pause.clear();
        if let Err(err) = ctx.resume(pause) {
            self.release_context();
            return Err(err);
        }
        self.wait().await
    }

    async fn wait(&mut self) -> Result<JobStatus, ShellError> {
        let Some(run) = self.run.as_mut() else {
            return Err(ShellError::NotSuspended);
        };
        let context = run.context();

        match run.next_event().await {
            Some(Event::Suspended { output }) => {
                debug!(job = %self.display_name, context = %context, "job suspended");
                Ok(JobStatus::Suspended { output })
            }
            Some(Event::Completed { output, error }) => {
                self.release_context();
                match error {
                    None => Ok(JobStatus::Completed { output }),
                    Some(error) => {
                        warn!(job = %self.display_name, %error, "job failed");
                        Ok(JobStatus::Failed { output, error })
                    }
                }
            }
            None => {
                self.release_context();
                Err(ShellError::ContextLost { id: context })
            }
        }
    }

    /// Give the bound context back. Safe to call any number of times.
    pub fn release_context(&mut self) {
        self.run = None;
        let Some(ctx) = self.bound.take() else {
            return;
        };
        match &self.env.pool {
            Some(pool) => {
                lock_pool(pool).release(&ctx);
            }
            None => ctx.terminate(),
        }
        debug!(job = %self.display_name, context = %ctx.id(), "released job context");
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.release_context();
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.display_name)
            .field("path", &self.path)
            .field("context", &self.context_id())
            .finish()
    }
}
