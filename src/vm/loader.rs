//! Loading executables into contexts.

use tracing::debug;

use crate::fs::FileSystem;
use crate::interpreter::errors::ShellError;
use crate::interpreter::types::InvocationContext;
use crate::vm::context::{ExecutionContext, PauseSignal, RunHandle};
use crate::vm::types::{has_magic, Program};

/// Read `path`, check its bytecode header and start it on `context`.
///
/// Files that do not start with the magic header are rejected with
/// [`ShellError::InvalidCode`] before the context is touched.
pub async fn load_executable(
    fs: &dyn FileSystem,
    context: &ExecutionContext,
    path: &str,
    invocation: InvocationContext,
    pause: PauseSignal,
) -> Result<RunHandle, ShellError> {
    let bytes = fs.read_file_buffer(path).await?;
    if !has_magic(&bytes) {
        return Err(ShellError::InvalidCode { path: path.to_string() });
    }
    debug!(path, context = %context.id(), size = bytes.len(), "loading executable");
    context.run(Program::Bytecode(bytes), invocation, pause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::vm::context::{ContextId, Event};
    use crate::vm::line_vm::{assemble, LineVmFactory};

    #[tokio::test]
    async fn test_load_runs_bytecode() {
        let fs = InMemoryFs::new();
        fs.write_file("/bin/hello", &assemble("puts hello $1").unwrap()).await.unwrap();
        let ctx = ExecutionContext::spawn(ContextId::next_temporary(), &LineVmFactory).unwrap();

        let inv = InvocationContext::new(vec!["hello".into(), "you".into()], "/");
        let mut run = load_executable(&fs, &ctx, "/bin/hello", inv, PauseSignal::new())
            .await
            .unwrap();
        assert_eq!(
            run.next_event().await,
            Some(Event::Completed { output: "hello you\n".into(), error: None })
        );
    }

    #[tokio::test]
    async fn test_load_rejects_plain_text() {
        let fs = InMemoryFs::new();
        fs.write_file("/bin/script", b"#!/bin/sh\necho hi\n").await.unwrap();
        let ctx = ExecutionContext::spawn(ContextId::next_temporary(), &LineVmFactory).unwrap();

        let inv = InvocationContext::new(vec!["script".into()], "/");
        match load_executable(&fs, &ctx, "/bin/script", inv, PauseSignal::new()).await {
            Err(err) => assert_eq!(err.to_string(), "/bin/script: invalid code"),
            Ok(run) => panic!("plain text was started on {}", run.context()),
        }
        assert_eq!(ctx.state(), crate::vm::context::ContextState::Idle);
    }
}
