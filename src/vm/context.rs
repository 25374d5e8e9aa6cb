//! Execution Contexts
//!
//! An execution context is one engine instance living on its own worker
//! thread. The shell talks to it through a request channel; each run reports
//! back through its own event channel:
//!
//! ```text
//!   ExecutionContext ──Run/Resume/Reset/Terminate──▶ worker thread (Engine)
//!   RunHandle        ◀──────Suspended/Completed───── worker thread
//! ```
//!
//! Suspension is cooperative: the engine calls `Invocation::checkpoint()` at
//! safe points, or `Invocation::suspend()` to stop itself. When the pause
//! signal is raised the worker reports
//! `Suspended`, then parks on the request channel until it is resumed, reset
//! or terminated. Handles are cheap clones; the worker is told to exit when
//! the last handle goes away.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::interpreter::errors::ShellError;
use crate::interpreter::types::InvocationContext;
use crate::vm::types::{Engine, EngineFactory, Program, RuntimeError};

/// Identity of a context: a slot in the fixed pool, or an overflow/private one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextId {
    Pooled(usize),
    Temporary(u64),
}

impl ContextId {
    pub fn is_pooled(&self) -> bool {
        matches!(self, ContextId::Pooled(_))
    }

    /// A fresh id for a context outside the fixed pool.
    pub fn next_temporary() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ContextId::Temporary(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextId::Pooled(i) => write!(f, "pool#{}", i),
            ContextId::Temporary(n) => write!(f, "tmp#{}", n),
        }
    }
}

/// Lifecycle state reported by a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Idle,
    Running,
    Suspended,
    Finished,
    Terminated,
}

/// External pause request. Raising it parks whichever context reaches its
/// next checkpoint first.
#[derive(Debug, Clone, Default)]
pub struct PauseSignal(Arc<AtomicBool>);

impl PauseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consume a pending pause request.
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

enum Request {
    Run {
        program: Program,
        invocation: InvocationContext,
        pause: PauseSignal,
        events: UnboundedSender<Event>,
    },
    Resume {
        pause: PauseSignal,
    },
    Reset,
    Terminate,
}

/// Progress reported by a running context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Parked at a checkpoint; `output` is what was written since the last event.
    Suspended { output: String },
    /// Run finished; `error` holds the captured runtime error, if any.
    Completed {
        output: String,
        error: Option<RuntimeError>,
    },
}

/// Receiving end for the events of one run.
pub struct RunHandle {
    context: ContextId,
    events: UnboundedReceiver<Event>,
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle").field("context", &self.context).finish()
    }
}

impl RunHandle {
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Wait for the next event. `None` means the worker went away.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }
}

type SharedState = Arc<Mutex<ContextState>>;

fn set_state(state: &SharedState, value: ContextState) {
    *state.lock().unwrap_or_else(|e| e.into_inner()) = value;
}

fn get_state(state: &SharedState) -> ContextState {
    *state.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abort {
    Reset,
    Terminate,
}

/// The suspend handler installed for one run.
struct Parker<'a> {
    pause: PauseSignal,
    requests: &'a mut UnboundedReceiver<Request>,
    events: UnboundedSender<Event>,
    state: &'a SharedState,
    abort: Option<Abort>,
}

impl Parker<'_> {
    fn park(&mut self, partial: String) -> Result<(), RuntimeError> {
        set_state(self.state, ContextState::Suspended);
        let _ = self.events.send(Event::Suspended { output: partial });

        loop {
            match self.requests.blocking_recv() {
                Some(Request::Resume { pause }) => {
                    self.pause = pause;
                    set_state(self.state, ContextState::Running);
                    return Ok(());
                }
                Some(Request::Reset) => {
                    self.abort = Some(Abort::Reset);
                    return Err(RuntimeError::interrupted());
                }
                Some(Request::Terminate) | None => {
                    self.abort = Some(Abort::Terminate);
                    return Err(RuntimeError::interrupted());
                }
                Some(Request::Run { .. }) => {
                    // Dropping the request closes its event channel.
                    warn!("run request rejected: context is parked");
                }
            }
        }
    }
}

/// What a running program sees: its arguments, stdin, stdout and checkpoints.
pub struct Invocation<'a> {
    ctx: InvocationContext,
    output: String,
    parker: Parker<'a>,
}

impl<'a> Invocation<'a> {
    fn new(ctx: InvocationContext, parker: Parker<'a>) -> Self {
        Self {
            ctx,
            output: String::new(),
            parker,
        }
    }

    /// Argument vector, program name at index 0.
    pub fn argv(&self) -> &[String] {
        &self.ctx.argv
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.ctx.argv.get(index).map(String::as_str)
    }

    pub fn cwd(&self) -> &str {
        &self.ctx.cwd
    }

    /// Next stdin line, terminator included. `None` at end of input.
    pub fn read_line(&mut self) -> Option<String> {
        self.ctx.stdin.next_line()
    }

    pub fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Safe point: parks here if a pause was requested.
    ///
    /// Returns `Err` when the context was reset or terminated while parked;
    /// the engine must stop running and return that error.
    pub fn checkpoint(&mut self) -> Result<(), RuntimeError> {
        if self.parker.abort.is_some() {
            return Err(RuntimeError::interrupted());
        }
        if !self.parker.pause.take() {
            return Ok(());
        }
        self.suspend()
    }

    /// Park unconditionally, as if a pause had been requested.
    pub fn suspend(&mut self) -> Result<(), RuntimeError> {
        if self.parker.abort.is_some() {
            return Err(RuntimeError::interrupted());
        }
        let partial = std::mem::take(&mut self.output);
        self.parker.park(partial)
    }
}

fn execute(
    engine: &mut dyn Engine,
    program: Program,
    io: &mut Invocation<'_>,
) -> Result<(), RuntimeError> {
    match program {
        Program::Bytecode(bytecode) => engine.run(&bytecode, io),
        Program::Source(source) => {
            let bytecode = engine.compile(&source)?;
            engine.run(&bytecode, io)
        }
    }
}

fn worker_main(
    id: ContextId,
    mut engine: Box<dyn Engine>,
    mut requests: UnboundedReceiver<Request>,
    state: SharedState,
) {
    while let Some(request) = requests.blocking_recv() {
        match request {
            Request::Run { program, invocation, pause, events } => {
                set_state(&state, ContextState::Running);
                let parker = Parker {
                    pause,
                    requests: &mut requests,
                    events: events.clone(),
                    state: &state,
                    abort: None,
                };
                let mut io = Invocation::new(invocation, parker);
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    execute(engine.as_mut(), program, &mut io)
                }))
                .unwrap_or_else(|_| Err(RuntimeError::new("Panic", "engine panicked")));

                let abort = io.parker.abort;
                let output = io.output;
                match abort {
                    Some(Abort::Terminate) => break,
                    Some(Abort::Reset) => {
                        engine.reset();
                        set_state(&state, ContextState::Idle);
                        continue;
                    }
                    None => {}
                }

                set_state(&state, ContextState::Finished);
                let _ = events.send(Event::Completed {
                    output,
                    error: result.err(),
                });
            }
            Request::Resume { .. } => debug!(context = %id, "resume ignored: nothing is parked"),
            Request::Reset => {
                engine.reset();
                set_state(&state, ContextState::Idle);
            }
            Request::Terminate => break,
        }
    }
    drop(requests);
    set_state(&state, ContextState::Terminated);
    debug!(context = %id, "execution context exited");
}

struct ContextInner {
    id: ContextId,
    requests: UnboundedSender<Request>,
    state: SharedState,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Terminate);
    }
}

/// Handle to an execution context. Clones refer to the same context.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    /// Start a worker thread with a fresh engine.
    pub fn spawn(id: ContextId, engines: &dyn EngineFactory) -> Result<Self, ShellError> {
        let engine = engines.create();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ContextState::Idle));
        let worker_state = state.clone();

        thread::Builder::new()
            .name(format!("ctx-{}", id))
            .spawn(move || worker_main(id, engine, rx, worker_state))?;

        debug!(context = %id, "spawned execution context");
        Ok(Self {
            inner: Arc::new(ContextInner { id, requests: tx, state }),
        })
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn state(&self) -> ContextState {
        get_state(&self.inner.state)
    }

    /// Hand a program to the context. Progress arrives on the returned handle.
    pub fn run(
        &self,
        program: Program,
        invocation: InvocationContext,
        pause: PauseSignal,
    ) -> Result<RunHandle, ShellError> {
        let (events, rx) = mpsc::unbounded_channel();
        set_state(&self.inner.state, ContextState::Running);
        if let Err(err) = self.send(Request::Run { program, invocation, pause, events }) {
            set_state(&self.inner.state, ContextState::Terminated);
            return Err(err);
        }
        Ok(RunHandle { context: self.id(), events: rx })
    }

    /// Unpark a suspended run, re-arming its pause signal.
    pub fn resume(&self, pause: PauseSignal) -> Result<(), ShellError> {
        self.send(Request::Resume { pause })
    }

    /// Abort any parked run and clear engine state.
    pub fn reset(&self) {
        let _ = self.inner.requests.send(Request::Reset);
    }

    /// Stop the worker. Pending and parked runs are abandoned.
    pub fn terminate(&self) {
        let _ = self.inner.requests.send(Request::Terminate);
    }

    fn send(&self, request: Request) -> Result<(), ShellError> {
        self.inner
            .requests
            .send(request)
            .map_err(|_| ShellError::ContextLost { id: self.id() })
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// Run an engine on the calling thread with no suspension support.
#[cfg(test)]
pub(crate) fn run_detached(
    engine: &mut dyn Engine,
    program: Program,
    invocation: InvocationContext,
) -> (Result<(), RuntimeError>, String) {
    let (_tx, mut rx) = mpsc::unbounded_channel();
    let (events, _events_rx) = mpsc::unbounded_channel();
    let state = Arc::new(Mutex::new(ContextState::Running));
    let parker = Parker {
        pause: PauseSignal::new(),
        requests: &mut rx,
        events,
        state: &state,
        abort: None,
    };
    let mut io = Invocation::new(invocation, parker);
    let result = execute(engine, program, &mut io);
    (result, io.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::line_vm::{LineVm, LineVmFactory};
    use std::time::Duration;

    fn invocation(argv: &[&str]) -> InvocationContext {
        InvocationContext::new(argv.iter().map(|s| s.to_string()).collect(), "/")
    }

    async fn wait_for_state(ctx: &ExecutionContext, want: ContextState) {
        for _ in 0..200 {
            if ctx.state() == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("context never reached {:?}, last {:?}", want, ctx.state());
    }

    #[test]
    fn test_context_id_display() {
        assert_eq!(ContextId::Pooled(2).to_string(), "pool#2");
        assert!(ContextId::Pooled(0).is_pooled());
        assert!(!ContextId::next_temporary().is_pooled());
    }

    #[test]
    fn test_temporary_ids_are_unique() {
        assert_ne!(ContextId::next_temporary(), ContextId::next_temporary());
    }

    #[test]
    fn test_pause_signal_take_consumes() {
        let pause = PauseSignal::new();
        assert!(!pause.take());
        pause.raise();
        assert!(pause.is_raised());
        assert!(pause.take());
        assert!(!pause.is_raised());
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let ctx = ExecutionContext::spawn(ContextId::next_temporary(), &LineVmFactory).unwrap();
        let mut run = ctx
            .run(Program::Source("puts hi $1".into()), invocation(&["x", "there"]), PauseSignal::new())
            .unwrap();
        assert_eq!(
            run.next_event().await,
            Some(Event::Completed { output: "hi there\n".into(), error: None })
        );
        assert_eq!(ctx.state(), ContextState::Finished);
    }

    #[tokio::test]
    async fn test_runtime_error_is_captured() {
        let ctx = ExecutionContext::spawn(ContextId::next_temporary(), &LineVmFactory).unwrap();
        let mut run = ctx
            .run(Program::Source("puts a\nraise ArgumentError bad".into()), invocation(&["x"]), PauseSignal::new())
            .unwrap();
        match run.next_event().await {
            Some(Event::Completed { output, error: Some(err) }) => {
                assert_eq!(output, "a\n");
                assert_eq!(err.to_string(), "bad (ArgumentError)");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_suspend_and_resume_same_context() {
        let ctx = ExecutionContext::spawn(ContextId::next_temporary(), &LineVmFactory).unwrap();
        let pause = PauseSignal::new();
        pause.raise();
        let mut run = ctx
            .run(Program::Source("puts a\nyield\nputs b".into()), invocation(&["x"]), pause.clone())
            .unwrap();

        assert_eq!(run.next_event().await, Some(Event::Suspended { output: "a\n".into() }));
        assert_eq!(ctx.state(), ContextState::Suspended);

        ctx.resume(pause).unwrap();
        assert_eq!(
            run.next_event().await,
            Some(Event::Completed { output: "b\n".into(), error: None })
        );
    }

    #[tokio::test]
    async fn test_program_can_suspend_itself() {
        let ctx = ExecutionContext::spawn(ContextId::next_temporary(), &LineVmFactory).unwrap();
        let pause = PauseSignal::new();
        let mut run = ctx
            .run(Program::Source("puts a\nstop\nputs b".into()), invocation(&["x"]), pause.clone())
            .unwrap();

        assert_eq!(run.next_event().await, Some(Event::Suspended { output: "a\n".into() }));
        assert!(!pause.is_raised());
        ctx.resume(pause).unwrap();
        assert_eq!(
            run.next_event().await,
            Some(Event::Completed { output: "b\n".into(), error: None })
        );
    }

    #[tokio::test]
    async fn test_reset_while_parked_returns_to_idle() {
        let ctx = ExecutionContext::spawn(ContextId::next_temporary(), &LineVmFactory).unwrap();
        let pause = PauseSignal::new();
        pause.raise();
        let mut run = ctx
            .run(Program::Source("spin".into()), invocation(&["x"]), pause)
            .unwrap();
        assert!(matches!(run.next_event().await, Some(Event::Suspended { .. })));

        ctx.reset();
        assert_eq!(run.next_event().await, None);
        wait_for_state(&ctx, ContextState::Idle).await;
    }

    #[tokio::test]
    async fn test_terminate_stops_worker() {
        let ctx = ExecutionContext::spawn(ContextId::next_temporary(), &LineVmFactory).unwrap();
        ctx.terminate();
        wait_for_state(&ctx, ContextState::Terminated).await;
        assert!(matches!(
            ctx.run(Program::Source("puts x".into()), invocation(&["x"]), PauseSignal::new()),
            Err(ShellError::ContextLost { .. })
        ));
    }

    #[test]
    fn test_run_detached() {
        let mut vm = LineVm::default();
        let (result, output) = run_detached(&mut vm, Program::Source("puts $0".into()), invocation(&["prog"]));
        assert!(result.is_ok());
        assert_eq!(output, "prog\n");
    }
}
