//! File System Module
//!
//! The volume abstraction the shell resolves commands and redirections against.
//! `InMemoryFs` is the default backend; embedders plug their own `FileSystem`.

pub mod types;
pub mod in_memory_fs;

pub use types::*;
pub use in_memory_fs::InMemoryFs;
