//! ruby / irb - run script code directly
//!
//! Both run in a private one-shot context, outside the session pool, and
//! cannot be suspended.
//!
//! - `ruby -e CODE [ARGS]` compiles and runs CODE
//! - `ruby FILE [ARGS]` runs FILE; bytecode if it carries the magic header,
//!   source otherwise
//! - `ruby` alone reads the program from stdin
//! - `irb` runs each stdin line as its own program, reporting errors per line

use crate::interpreter::errors::ShellError;
use crate::interpreter::pipe_buffer::PipeBuffer;
use crate::interpreter::types::{ExecEnv, ExecResult, InvocationContext};
use crate::vm::context::{ContextId, Event, ExecutionContext, PauseSignal};
use crate::vm::types::{has_magic, Program, RuntimeError};

/// Run one program on `ctx` and wait for it to finish.
async fn run_to_completion(
    ctx: &ExecutionContext,
    program: Program,
    invocation: InvocationContext,
) -> Result<(String, Option<RuntimeError>), ShellError> {
    let pause = PauseSignal::new();
    let mut run = ctx.run(program, invocation, pause.clone())?;
    let mut output = String::new();
    loop {
        match run.next_event().await {
            Some(Event::Suspended { output: partial }) => {
                output.push_str(&partial);
                ctx.resume(pause.clone())?;
            }
            Some(Event::Completed { output: rest, error }) => {
                output.push_str(&rest);
                return Ok((output, error));
            }
            None => return Err(ShellError::ContextLost { id: ctx.id() }),
        }
    }
}

fn one_shot(env: &ExecEnv) -> Result<ExecutionContext, ShellError> {
    ExecutionContext::spawn(ContextId::next_temporary(), env.engines.as_ref())
}

fn report(output: String, error: Option<RuntimeError>) -> ExecResult {
    match error {
        None => ExecResult::output(output),
        Some(err) => ExecResult::new(output, format!("{}\n", err), false),
    }
}

pub async fn handle_ruby(env: &ExecEnv, inv: &InvocationContext) -> Result<ExecResult, ShellError> {
    let args = inv.args();
    let (program, argv, stdin) = match args.first().map(String::as_str) {
        Some("-e") => {
            let code = args
                .get(1)
                .ok_or_else(|| ShellError::builtin("ruby", "-e requires an argument"))?;
            let mut argv = vec!["-e".to_string()];
            argv.extend_from_slice(&args[2..]);
            (Program::Source(code.clone()), argv, inv.stdin.clone())
        }
        Some(file) => {
            let path = env.fs.resolve_path(&inv.cwd, file);
            let bytes = env.fs.read_file_buffer(&path).await.map_err(|_| {
                ShellError::builtin("ruby", format!("No such file or directory -- {}", file))
            })?;
            let program = if has_magic(&bytes) {
                Program::Bytecode(bytes)
            } else {
                Program::Source(String::from_utf8_lossy(&bytes).into_owned())
            };
            (program, args.to_vec(), inv.stdin.clone())
        }
        None => {
            let source = inv.stdin.clone().drain_to_string();
            (Program::Source(source), vec!["-".to_string()], PipeBuffer::from_text(""))
        }
    };

    let ctx = one_shot(env)?;
    let invocation = InvocationContext {
        argv,
        stdin,
        cwd: inv.cwd.clone(),
    };
    let result = run_to_completion(&ctx, program, invocation).await;
    ctx.terminate();
    let (output, error) = result?;
    Ok(report(output, error))
}

pub async fn handle_irb(env: &ExecEnv, inv: &InvocationContext) -> Result<ExecResult, ShellError> {
    let ctx = one_shot(env)?;
    let mut stdin = inv.stdin.clone();
    let mut result = ExecResult::ok();

    while let Some(line) = stdin.next_line() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let invocation = InvocationContext::new(vec!["irb".to_string()], inv.cwd.clone());
        match run_to_completion(&ctx, Program::Source(line.to_string()), invocation).await {
            Ok((output, error)) => {
                result.stdout.push_str(&output);
                if let Some(err) = error {
                    result.stderr.push_str(&format!("{}\n", err));
                }
            }
            Err(err) => {
                ctx.terminate();
                return Err(err);
            }
        }
    }

    ctx.terminate();
    Ok(result)
}
