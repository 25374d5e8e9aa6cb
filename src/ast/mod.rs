//! Abstract Syntax Tree (AST) Types for command lines
//!
//! Architecture:
//!   Input → Lexer → Parser → AST → Dispatcher/Pipeline → Jobs

pub mod types;
