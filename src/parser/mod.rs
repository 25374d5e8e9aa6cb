//! Parser module for command lines
//!
//! This module contains the lexer and parser for shell input.

pub mod types;
pub mod lexer;
pub mod parser;

// Re-exports
pub use types::SyntaxError;
pub use lexer::{Lexer, Special, Token, TokenKind};
pub use parser::{parse, Parser};
