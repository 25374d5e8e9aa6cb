//! Abstract Syntax Tree (AST) Types for command lines
//!
//! A parsed line is either a single `CommandNode` or a `PipelineNode` of two
//! or more commands. Every word keeps its unquoted value and the raw span it
//! came from, so diagnostics can point back into the input.

use std::fmt;

// =============================================================================
// BASE TYPES
// =============================================================================

/// Byte range of a token in the original input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

impl Span {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Slice the raw text of this span out of `input`.
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.offset..self.end()]
    }
}

/// A word as the program sees it, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordNode {
    /// Value with surrounding quotes stripped
    pub value: String,
    /// Raw span, quotes included
    pub span: Span,
    pub quoted: bool,
}

impl WordNode {
    pub fn new(value: impl Into<String>, span: Span, quoted: bool) -> Self {
        Self {
            value: value.into(),
            span,
            quoted,
        }
    }
}

impl fmt::Display for WordNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectionKind {
    /// `>`
    Output,
    /// `>>`
    Append,
    /// `<`
    Input,
    /// `<<`
    HereDoc,
}

impl RedirectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectionKind::Output => ">",
            RedirectionKind::Append => ">>",
            RedirectionKind::Input => "<",
            RedirectionKind::HereDoc => "<<",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionNode {
    pub kind: RedirectionKind,
    pub target: WordNode,
}

// =============================================================================
// COMMANDS & PIPELINES
// =============================================================================

/// A simple command: name, arguments and redirections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandNode {
    pub name: WordNode,
    pub args: Vec<WordNode>,
    pub redirects: Vec<RedirectionNode>,
}

impl CommandNode {
    /// Argument vector with the command name at index 0.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.name)
            .chain(self.args.iter())
            .map(|w| w.value.clone())
            .collect()
    }

    /// Span covering the whole command, for diagnostics.
    pub fn span(&self) -> Span {
        let end = self
            .args
            .iter()
            .map(|w| w.span.end())
            .chain(self.redirects.iter().map(|r| r.target.span.end()))
            .max()
            .unwrap_or_else(|| self.name.span.end());
        Span::new(self.name.span.offset, end - self.name.span.offset)
    }
}

/// A pipeline: cmd1 | cmd2 | cmd3
///
/// Only built for two or more stages; a lone command is never wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineNode {
    pub stages: Vec<CommandNode>,
}

/// Root of a parsed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AST {
    Command(CommandNode),
    Pipeline(PipelineNode),
}

impl AST {
    /// The stages to run, in order.
    pub fn stages(&self) -> &[CommandNode] {
        match self {
            AST::Command(cmd) => std::slice::from_ref(cmd),
            AST::Pipeline(p) => &p.stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(value: &str, offset: usize) -> WordNode {
        WordNode::new(value, Span::new(offset, value.len()), false)
    }

    #[test]
    fn test_argv_includes_name() {
        let cmd = CommandNode {
            name: word("echo", 0),
            args: vec![word("a", 5), word("b", 7)],
            redirects: vec![],
        };
        assert_eq!(cmd.argv(), vec!["echo", "a", "b"]);
        assert_eq!(cmd.span(), Span::new(0, 8));
    }

    #[test]
    fn test_single_command_stages() {
        let cmd = CommandNode {
            name: word("pwd", 0),
            args: vec![],
            redirects: vec![],
        };
        let ast = AST::Command(cmd.clone());
        assert_eq!(ast.stages(), &[cmd]);
    }

    #[test]
    fn test_span_text() {
        let input = "echo \"hi\"";
        assert_eq!(Span::new(5, 4).text(input), "\"hi\"");
    }
}
