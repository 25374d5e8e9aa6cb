//! Pipeline Execution
//!
//! Handles execution of command pipelines (cmd1 | cmd2 | cmd3).
//!
//! Every stage is resolved before the first one starts, so a typo anywhere in
//! the pipeline runs nothing. Stages then run strictly in order, each fully
//! buffered: stage *i* reads the closed output of stage *i-1*.
//!
//! A stage that suspends keeps the stages after it. Its output is held back
//! until it completes on resume, then the waiting stages run over all of it.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::ast::types::{CommandNode, RedirectionKind, RedirectionNode, AST};
use crate::interpreter::builtin_dispatch::{outcome_of, Dispatcher, Resolved, StageOutcome};
use crate::interpreter::errors::ShellError;
use crate::interpreter::job::Job;
use crate::interpreter::pipe_buffer::PipeBuffer;
use crate::interpreter::types::{ExecEnv, ExecResult, InvocationContext, SessionState};
use crate::vm::context::PauseSignal;

/// A stage that has been resolved but not started.
#[derive(Debug)]
struct PendingStage {
    node: CommandNode,
    target: Resolved,
}

/// A pipeline parked at a suspended stage.
#[derive(Debug)]
pub struct SuspendedPipeline {
    job: Job,
    node: CommandNode,
    /// Output of the suspended stage kept for the next stage or a redirect
    held: String,
    downstream: VecDeque<PendingStage>,
}

impl SuspendedPipeline {
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Stages that will run once the suspended one completes.
    pub fn waiting_stages(&self) -> usize {
        self.downstream.len()
    }

    /// The suspended stage and everything after it, as typed.
    pub fn command(&self) -> String {
        std::iter::once(&self.node)
            .chain(self.downstream.iter().map(|stage| &stage.node))
            .map(|node| node.argv().join(" "))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Only a final stage without an output redirect writes straight out.
    fn streams_to_caller(&self) -> bool {
        self.downstream.is_empty() && !has_output_redirect(&self.node)
    }

    fn take_partial(&mut self, output: String, stdout: &mut String) {
        if self.streams_to_caller() {
            stdout.push_str(&output);
        } else {
            self.held.push_str(&output);
        }
    }
}

/// Result of executing a pipeline.
#[derive(Debug)]
pub struct PipelineResult {
    pub result: ExecResult,
    pub suspended: Option<SuspendedPipeline>,
}

/// Pipeline execution state.
#[derive(Debug, Default)]
struct PipelineState {
    /// Stdin for the next stage
    stdin: PipeBuffer,
    stdout: String,
    stderr: String,
    /// Success of the most recent stage
    success: bool,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            stdin: PipeBuffer::from_text(""),
            success: true,
            ..Default::default()
        }
    }

    fn fail(&mut self, err: &ShellError) {
        self.stderr.push_str(&format!("{}\n", err));
        self.success = false;
    }

    /// Keep a finished stage's status and return its stdout.
    fn absorb(&mut self, result: ExecResult) -> String {
        self.stderr.push_str(&result.stderr);
        self.success = result.success;
        result.stdout
    }

    /// Route a stage's output to the next stage, or to the final stdout.
    fn record_output(&mut self, output: String, is_last: bool) {
        if is_last {
            self.stdout.push_str(&output);
        } else {
            self.stdin = PipeBuffer::from_text(&output);
        }
    }

    async fn complete_stage(
        &mut self,
        env: &ExecEnv,
        cwd: &str,
        node: &CommandNode,
        output: String,
        is_last: bool,
    ) {
        match apply_output_redirects(env, cwd, node, output).await {
            Ok(Some(output)) => self.record_output(output, is_last),
            Ok(None) => self.record_output(String::new(), is_last),
            Err(err) => {
                self.fail(&err);
                self.record_output(String::new(), is_last);
            }
        }
    }

    fn suspend(
        &mut self,
        job: Job,
        node: CommandNode,
        output: String,
        downstream: VecDeque<PendingStage>,
    ) -> SuspendedPipeline {
        let mut parked = SuspendedPipeline {
            job,
            node,
            held: String::new(),
            downstream,
        };
        parked.take_partial(output, &mut self.stdout);
        self.success = true;
        parked
    }

    fn finish(self, suspended: Option<SuspendedPipeline>) -> PipelineResult {
        PipelineResult {
            result: ExecResult::new(self.stdout, self.stderr, self.success),
            suspended,
        }
    }
}

/// Run a parsed command line.
pub async fn execute_pipeline(
    env: &ExecEnv,
    session: &mut SessionState,
    pause: &PauseSignal,
    ast: &AST,
) -> PipelineResult {
    let mut dispatcher = Dispatcher::new(env, session, pause);
    let mut state = PipelineState::new();

    let mut pending = VecDeque::with_capacity(ast.stages().len());
    for node in ast.stages() {
        match dispatcher.resolve(&node.argv()).await {
            Ok(target) => pending.push_back(PendingStage {
                node: node.clone(),
                target,
            }),
            Err(err) => {
                debug!(%err, "pipeline aborted during resolution");
                state.fail(&err);
                return state.finish(None);
            }
        }
    }

    let suspended = run_stages(env, &mut dispatcher, &mut state, pending).await;
    state.finish(suspended)
}

/// Continue a suspended pipeline. The parked stage runs to its next
/// suspension or to completion; once complete, the stages waiting on it run
/// over its whole output.
pub async fn resume_pipeline(
    env: &ExecEnv,
    session: &mut SessionState,
    pause: &PauseSignal,
    parked: SuspendedPipeline,
) -> Result<PipelineResult, ShellError> {
    let SuspendedPipeline {
        mut job,
        node,
        mut held,
        downstream,
    } = parked;
    let status = job.resume(pause.clone()).await?;
    let mut state = PipelineState::new();

    match outcome_of(job, status) {
        StageOutcome::Suspended { job, output } => {
            let mut parked = SuspendedPipeline {
                job,
                node,
                held,
                downstream,
            };
            parked.take_partial(output, &mut state.stdout);
            Ok(state.finish(Some(parked)))
        }
        StageOutcome::Done(result) => {
            held.push_str(&state.absorb(result));
            let mut dispatcher = Dispatcher::new(env, session, pause);
            let cwd = dispatcher.session().cwd.clone();
            let is_last = downstream.is_empty();
            state.complete_stage(env, &cwd, &node, held, is_last).await;

            let suspended = run_stages(env, &mut dispatcher, &mut state, downstream).await;
            Ok(state.finish(suspended))
        }
    }
}

async fn run_stages(
    env: &ExecEnv,
    dispatcher: &mut Dispatcher<'_>,
    state: &mut PipelineState,
    mut pending: VecDeque<PendingStage>,
) -> Option<SuspendedPipeline> {
    while let Some(PendingStage { node, target }) = pending.pop_front() {
        let is_last = pending.is_empty();
        let stdin = std::mem::take(&mut state.stdin);

        let stdin = match apply_input_redirects(env, dispatcher.session(), &node, stdin).await {
            Ok(stdin) => stdin,
            Err(err) => {
                state.fail(&err);
                state.record_output(String::new(), is_last);
                continue;
            }
        };

        let invocation = InvocationContext {
            argv: node.argv(),
            stdin,
            cwd: dispatcher.session().cwd.clone(),
        };

        let output = match dispatcher.run(target, invocation).await {
            Ok(StageOutcome::Done(result)) => state.absorb(result),
            Ok(StageOutcome::Suspended { job, output }) => {
                debug!(job = job.display_name(), waiting = pending.len(), "pipeline suspended");
                return Some(state.suspend(job, node, output, pending));
            }
            Err(err) => {
                warn!(command = %node.argv().join(" "), %err, "pipeline stage failed");
                state.fail(&err);
                String::new()
            }
        };

        let cwd = dispatcher.session().cwd.clone();
        state.complete_stage(env, &cwd, &node, output, is_last).await;
    }
    None
}

fn has_output_redirect(node: &CommandNode) -> bool {
    node.redirects
        .iter()
        .any(|r| matches!(r.kind, RedirectionKind::Output | RedirectionKind::Append))
}

/// `<` replaces stdin with a file; `<<` feeds the target text itself.
async fn apply_input_redirects(
    env: &ExecEnv,
    session: &SessionState,
    stage: &CommandNode,
    mut stdin: PipeBuffer,
) -> Result<PipeBuffer, ShellError> {
    for redirect in &stage.redirects {
        match redirect.kind {
            RedirectionKind::Input => {
                let path = env.fs.resolve_path(&session.cwd, &redirect.target.value);
                let content = env.fs.read_file(&path).await?;
                stdin = PipeBuffer::from_text(&content);
            }
            RedirectionKind::HereDoc => {
                stdin = PipeBuffer::from_text(&format!("{}\n", redirect.target.value));
            }
            RedirectionKind::Output | RedirectionKind::Append => {}
        }
    }
    Ok(stdin)
}

/// Write `output` to the last `>`/`>>` target. Earlier targets are still
/// created (and truncated for `>`). Returns the output if it was not
/// redirected.
async fn apply_output_redirects(
    env: &ExecEnv,
    cwd: &str,
    stage: &CommandNode,
    output: String,
) -> Result<Option<String>, ShellError> {
    let targets: Vec<&RedirectionNode> = stage
        .redirects
        .iter()
        .filter(|r| matches!(r.kind, RedirectionKind::Output | RedirectionKind::Append))
        .collect();

    let Some((last, earlier)) = targets.split_last() else {
        return Ok(Some(output));
    };

    for redirect in earlier {
        write_target(env, cwd, redirect, "").await?;
    }
    write_target(env, cwd, last, &output).await?;
    Ok(None)
}

async fn write_target(
    env: &ExecEnv,
    cwd: &str,
    redirect: &RedirectionNode,
    content: &str,
) -> Result<(), ShellError> {
    let path = env.fs.resolve_path(cwd, &redirect.target.value);
    match redirect.kind {
        RedirectionKind::Append => env.fs.append_file(&path, content.as_bytes()).await?,
        _ => env.fs.write_file(&path, content.as_bytes()).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::context_pool::lock_pool;
    use crate::interpreter::test_support::env_with;
    use crate::parser::parse;

    async fn run(env: &ExecEnv, line: &str) -> PipelineResult {
        let mut session = SessionState::default();
        let pause = PauseSignal::new();
        let ast = parse(line).unwrap().unwrap();
        execute_pipeline(env, &mut session, &pause, &ast).await
    }

    async fn head_env() -> ExecEnv {
        env_with(
            &[
                ("/bin/head", "head $2"),
                ("/bin/cat", "cat"),
                ("/bin/upcase", "print X\ncat"),
                ("/bin/boom", "puts partial\nraise RuntimeError boom"),
            ],
            Some(2),
        )
        .await
    }

    #[tokio::test]
    async fn test_echo_into_head() {
        let env = head_env().await;
        let out = run(&env, "echo hello | head -n 1").await;
        assert_eq!(out.result.stdout, "hello\n");
        assert!(out.result.success);
        assert!(out.suspended.is_none());
        assert!(lock_pool(env.pool.as_ref().unwrap()).in_use_ids().is_empty());
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let env = head_env().await;
        let out = run(&env, "echo one | upcase | upcase").await;
        assert_eq!(out.result.stdout, "XXone\n");
    }

    #[tokio::test]
    async fn test_resolution_failure_runs_nothing() {
        let env = head_env().await;
        let out = run(&env, "echo hi > /out.txt | nosuchcmd | cat").await;
        assert_eq!(out.result.stderr, "nosuchcmd: command not found\n");
        assert!(!out.result.success);
        assert!(!env.fs.exists("/out.txt").await);
        assert!(lock_pool(env.pool.as_ref().unwrap()).in_use_ids().is_empty());
    }

    #[tokio::test]
    async fn test_runtime_error_does_not_stop_pipeline() {
        let env = head_env().await;
        let out = run(&env, "boom | cat").await;
        assert_eq!(out.result.stdout, "partial\n");
        assert_eq!(out.result.stderr, "boom (RuntimeError)\n");
        assert!(out.result.success);
    }

    #[tokio::test]
    async fn test_output_redirects() {
        let env = head_env().await;
        let out = run(&env, "echo first > /a.txt").await;
        assert_eq!(out.result.stdout, "");
        run(&env, "echo second >> /a.txt").await;
        assert_eq!(env.fs.read_file("/a.txt").await.unwrap(), "first\nsecond\n");

        run(&env, "echo x > /b.txt > /c.txt").await;
        assert_eq!(env.fs.read_file("/b.txt").await.unwrap(), "");
        assert_eq!(env.fs.read_file("/c.txt").await.unwrap(), "x\n");
    }

    #[tokio::test]
    async fn test_redirected_stage_feeds_empty_stdin() {
        let env = head_env().await;
        let out = run(&env, "echo hidden > /f.txt | cat").await;
        assert_eq!(out.result.stdout, "");
    }

    #[tokio::test]
    async fn test_input_redirects() {
        let env = head_env().await;
        env.fs.write_file("/in.txt", b"l1\nl2\nl3\n").await.unwrap();
        let out = run(&env, "head -n 2 < /in.txt").await;
        assert_eq!(out.result.stdout, "l1\nl2\n");

        let out = run(&env, "cat << 'inline text'").await;
        assert_eq!(out.result.stdout, "inline text\n");
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let env = head_env().await;
        let out = run(&env, "cat < /missing").await;
        assert!(out.result.stderr.contains("ENOENT"));
        assert!(!out.result.success);
    }

    #[tokio::test]
    async fn test_suspension_holds_downstream() {
        let env = env_with(&[("/bin/steps", "puts a\nstop\nputs b"), ("/bin/cat", "cat")], Some(2)).await;
        let mut session = SessionState::default();
        let pause = PauseSignal::new();

        let ast = parse("steps | cat > /out.txt").unwrap().unwrap();
        let out = execute_pipeline(&env, &mut session, &pause, &ast).await;
        assert_eq!(out.result.stdout, "");
        let parked = out.suspended.expect("pipeline should be suspended");
        assert_eq!(parked.job().display_name(), "steps");
        assert_eq!(parked.waiting_stages(), 1);
        assert_eq!(parked.command(), "steps | cat");
        assert!(!env.fs.exists("/out.txt").await);
        assert_eq!(lock_pool(env.pool.as_ref().unwrap()).in_use_ids().len(), 1);

        let out = resume_pipeline(&env, &mut session, &pause, parked).await.unwrap();
        assert!(out.suspended.is_none());
        assert_eq!(out.result.stdout, "");
        assert_eq!(env.fs.read_file("/out.txt").await.unwrap(), "a\nb\n");
        assert!(lock_pool(env.pool.as_ref().unwrap()).in_use_ids().is_empty());
    }

    #[tokio::test]
    async fn test_downstream_sees_only_finished_output() {
        let env = env_with(
            &[("/bin/gen", "puts a\nstop\nputs b\nstop\nputs c"), ("/bin/head", "head $2")],
            Some(2),
        )
        .await;
        let mut session = SessionState::default();
        let pause = PauseSignal::new();

        let ast = parse("gen | head -n 2").unwrap().unwrap();
        let out = execute_pipeline(&env, &mut session, &pause, &ast).await;
        assert_eq!(out.result.stdout, "");
        let parked = out.suspended.unwrap();

        let out = resume_pipeline(&env, &mut session, &pause, parked).await.unwrap();
        assert_eq!(out.result.stdout, "");
        let parked = out.suspended.expect("second stop parks again");

        let out = resume_pipeline(&env, &mut session, &pause, parked).await.unwrap();
        assert_eq!(out.result.stdout, "a\nb\n");
        assert!(out.result.success);
        assert!(out.suspended.is_none());
    }

    #[tokio::test]
    async fn test_final_stage_streams_partial_output() {
        let env = env_with(&[("/bin/steps", "puts a\nstop\nputs b")], Some(1)).await;
        let mut session = SessionState::default();
        let pause = PauseSignal::new();

        let ast = parse("echo in | steps").unwrap().unwrap();
        let out = execute_pipeline(&env, &mut session, &pause, &ast).await;
        assert_eq!(out.result.stdout, "a\n");
        let parked = out.suspended.unwrap();
        assert_eq!(parked.waiting_stages(), 0);

        drop(parked);
        assert!(lock_pool(env.pool.as_ref().unwrap()).in_use_ids().is_empty());
    }
}
