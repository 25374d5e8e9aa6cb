//! Line VM
//!
//! A tiny line-oriented engine shipped with the shell so that executables,
//! `ruby -e` and `irb` work out of the box. One instruction per line:
//!
//! ```text
//!   puts WORDS        write WORDS and a newline
//!   print WORDS       write WORDS
//!   cat               copy stdin to stdout
//!   head N            copy the first N stdin lines
//!   args              write each argument on its own line
//!   raise KIND MSG    fail with a runtime error
//!   yield             safe point
//!   stop              suspend here
//!   spin              loop on safe points forever
//!   # ...             comment
//! ```
//!
//! `$0`..`$9` expand to positional arguments, `$@` and `$*` to all of them.
//! Bytecode is the magic header followed by the checked source.

use std::thread;
use std::time::Duration;

use crate::vm::context::Invocation;
use crate::vm::types::{has_magic, Engine, EngineFactory, RuntimeError, BYTECODE_MAGIC};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Instruction {
    Puts(Vec<String>),
    Print(Vec<String>),
    Cat,
    Head(String),
    Args,
    Raise(String, String),
    Yield,
    Stop,
    Spin,
}

fn parse_line(line: &str, lineno: usize) -> Result<Option<Instruction>, RuntimeError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace().map(str::to_string);
    let op = words.next().unwrap_or_default();
    let rest: Vec<String> = words.collect();

    let instruction = match op.as_str() {
        "puts" => Instruction::Puts(rest),
        "print" => Instruction::Print(rest),
        "cat" => Instruction::Cat,
        "args" => Instruction::Args,
        "yield" => Instruction::Yield,
        "stop" => Instruction::Stop,
        "spin" => Instruction::Spin,
        "head" => match rest.as_slice() {
            [n] => Instruction::Head(n.clone()),
            _ => return Err(syntax(lineno, "head takes one count")),
        },
        "raise" => match rest.split_first() {
            Some((kind, message)) => Instruction::Raise(kind.clone(), message.join(" ")),
            None => return Err(syntax(lineno, "raise needs an error kind")),
        },
        other => return Err(syntax(lineno, &format!("unknown instruction `{}'", other))),
    };
    Ok(Some(instruction))
}

fn syntax(lineno: usize, message: &str) -> RuntimeError {
    RuntimeError::new("SyntaxError", format!("line {}: {}", lineno, message))
}

fn parse_program(source: &str) -> Result<Vec<Instruction>, RuntimeError> {
    let mut program = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if let Some(instruction) = parse_line(line, i + 1)? {
            program.push(instruction);
        }
    }
    Ok(program)
}

fn expand(word: &str, argv: &[String]) -> String {
    match word {
        "$@" | "$*" => argv.get(1..).unwrap_or_default().join(" "),
        _ => match word.strip_prefix('$').and_then(|d| d.parse::<usize>().ok()) {
            Some(index) if word.len() == 2 => argv.get(index).cloned().unwrap_or_default(),
            _ => word.to_string(),
        },
    }
}

fn expand_words(words: &[String], argv: &[String]) -> String {
    words
        .iter()
        .map(|w| expand(w, argv))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The built-in engine.
#[derive(Debug, Default)]
pub struct LineVm {
    loaded: Vec<Instruction>,
}

impl LineVm {
    fn step(&self, index: usize, io: &mut Invocation<'_>) -> Result<(), RuntimeError> {
        match &self.loaded[index] {
            Instruction::Puts(words) => {
                let text = expand_words(words, io.argv());
                io.write(&text);
                io.write("\n");
            }
            Instruction::Print(words) => {
                let text = expand_words(words, io.argv());
                io.write(&text);
            }
            Instruction::Cat => {
                while let Some(line) = io.read_line() {
                    io.write(&line);
                }
            }
            Instruction::Head(count) => {
                let count = expand(count, io.argv());
                let n: usize = count.parse().map_err(|_| {
                    RuntimeError::new("ArgumentError", format!("invalid line count: {}", count))
                })?;
                for _ in 0..n {
                    match io.read_line() {
                        Some(line) => io.write(&line),
                        None => break,
                    }
                }
            }
            Instruction::Args => {
                let args: Vec<String> = io.argv().iter().skip(1).cloned().collect();
                for arg in args {
                    io.write(&arg);
                    io.write("\n");
                }
            }
            Instruction::Raise(kind, message) => {
                return Err(RuntimeError::new(kind.clone(), message.clone()));
            }
            Instruction::Yield => io.checkpoint()?,
            Instruction::Stop => io.suspend()?,
            Instruction::Spin => loop {
                io.checkpoint()?;
                thread::sleep(Duration::from_millis(1));
            },
        }
        Ok(())
    }
}

impl Engine for LineVm {
    fn compile(&mut self, source: &str) -> Result<Vec<u8>, RuntimeError> {
        parse_program(source)?;
        let mut bytecode = BYTECODE_MAGIC.to_vec();
        bytecode.extend_from_slice(source.as_bytes());
        Ok(bytecode)
    }

    fn run(&mut self, bytecode: &[u8], io: &mut Invocation<'_>) -> Result<(), RuntimeError> {
        if !has_magic(bytecode) {
            return Err(RuntimeError::new("LoadError", "bytecode header mismatch"));
        }
        let source = std::str::from_utf8(&bytecode[BYTECODE_MAGIC.len()..])
            .map_err(|_| RuntimeError::new("LoadError", "bytecode is not valid text"))?;
        self.loaded = parse_program(source)?;

        for index in 0..self.loaded.len() {
            self.step(index, io)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.loaded.clear();
    }
}

/// Factory handing out [`LineVm`] engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineVmFactory;

impl EngineFactory for LineVmFactory {
    fn create(&self) -> Box<dyn Engine> {
        Box::new(LineVm::default())
    }
}

/// Assemble a program into bytecode without an engine instance.
pub fn assemble(source: &str) -> Result<Vec<u8>, RuntimeError> {
    LineVm::default().compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::pipe_buffer::PipeBuffer;
    use crate::interpreter::types::InvocationContext;
    use crate::vm::context::run_detached;
    use crate::vm::types::Program;

    fn run(source: &str, argv: &[&str], stdin: &str) -> (Result<(), RuntimeError>, String) {
        let mut ctx = InvocationContext::new(argv.iter().map(|s| s.to_string()).collect(), "/");
        ctx.stdin = PipeBuffer::from_text(stdin);
        run_detached(&mut LineVm::default(), Program::Source(source.into()), ctx)
    }

    #[test]
    fn test_compile_prepends_magic() {
        let bytecode = assemble("puts hi").unwrap();
        assert!(bytecode.starts_with(b"RITE0300"));
        assert_eq!(&bytecode[8..], b"puts hi");
    }

    #[test]
    fn test_compile_rejects_unknown_instruction() {
        let err = assemble("puts ok\nfrobnicate").unwrap_err();
        assert_eq!(err.kind, "SyntaxError");
        assert!(err.message.contains("line 2"));
    }

    #[test]
    fn test_puts_and_print() {
        let (result, out) = run("print a b\nputs c", &["p"], "");
        assert!(result.is_ok());
        assert_eq!(out, "a bc\n");
    }

    #[test]
    fn test_positional_expansion() {
        let (_, out) = run("puts $0 $2 $9\nputs $@", &["prog", "x", "y"], "");
        assert_eq!(out, "prog y \nx y\n");
    }

    #[test]
    fn test_head_reads_stdin() {
        let (_, out) = run("head $2", &["head", "-n", "2"], "one\ntwo\nthree\n");
        assert_eq!(out, "one\ntwo\n");
    }

    #[test]
    fn test_head_bad_count() {
        let (result, _) = run("head $1", &["head", "lots"], "");
        assert_eq!(result.unwrap_err().kind, "ArgumentError");
    }

    #[test]
    fn test_cat_and_args() {
        let (_, out) = run("cat\nargs", &["c", "a1", "a2"], "in\n");
        assert_eq!(out, "in\na1\na2\n");
    }

    #[test]
    fn test_raise_keeps_partial_output() {
        let (result, out) = run("puts before\nraise TypeError no good\nputs after", &["p"], "");
        assert_eq!(result.unwrap_err(), RuntimeError::new("TypeError", "no good"));
        assert_eq!(out, "before\n");
    }

    #[test]
    fn test_run_rejects_missing_magic() {
        let mut ctx = InvocationContext::new(vec!["p".into()], "/");
        ctx.stdin = PipeBuffer::from_text("");
        let (result, _) = run_detached(
            &mut LineVm::default(),
            Program::Bytecode(b"puts hi".to_vec()),
            ctx,
        );
        assert_eq!(result.unwrap_err().kind, "LoadError");
    }

    #[test]
    fn test_yield_without_pause_is_noop() {
        let (result, out) = run("puts a\nyield\nputs b", &["p"], "");
        assert!(result.is_ok());
        assert_eq!(out, "a\nb\n");
    }
}
