//! Parser Types and Constants
//!
//! Shared error type and limits used by the lexer and the parser.

use thiserror::Error;

use crate::ast::types::Span;

// Limits to keep a single line from exhausting memory
pub const MAX_INPUT_SIZE: usize = 64 * 1024;
pub const MAX_TOKENS: usize = 10_000;

/// A malformed command line. No part of the line may run once this is raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at {offset}: {message}")]
pub struct SyntaxError {
    pub message: String,
    /// Byte offset in the input where the problem was detected
    pub offset: usize,
    /// Raw span of the offending token, if there was one
    pub span: Option<Span>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
            span: None,
        }
    }

    pub fn with_span(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            offset: span.offset,
            span: Some(span),
        }
    }
}
