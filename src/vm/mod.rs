//! Script engine integration
//!
//! - `types`: the `Engine` seam, runtime errors and the bytecode magic
//! - `context`: worker-thread execution contexts with suspend/resume
//! - `loader`: magic-checked loading of executables
//! - `line_vm`: the built-in line-oriented engine

pub mod types;
pub mod context;
pub mod loader;
pub mod line_vm;

pub use types::{has_magic, Engine, EngineFactory, Program, RuntimeError, SharedEngineFactory, BYTECODE_MAGIC};
pub use context::{ContextId, ContextState, Event, ExecutionContext, Invocation, PauseSignal, RunHandle};
pub use loader::load_executable;
pub use line_vm::{assemble, LineVm, LineVmFactory};
