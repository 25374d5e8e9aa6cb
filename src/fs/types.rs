//! File System Types
//!
//! Core types and the trait the shell uses to reach the volume it runs on.
//! Command resolution, `cd` and redirections only go through this trait.

use async_trait::async_trait;
use thiserror::Error;

/// File system errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("ENOENT: no such file or directory, {operation} '{path}'")]
    NotFound { path: String, operation: String },

    #[error("EEXIST: file already exists, {operation} '{path}'")]
    AlreadyExists { path: String, operation: String },

    #[error("EISDIR: illegal operation on a directory, {operation} '{path}'")]
    IsDirectory { path: String, operation: String },
}

impl FsError {
    pub(crate) fn not_found(path: &str, operation: &str) -> Self {
        FsError::NotFound {
            path: path.to_string(),
            operation: operation.to_string(),
        }
    }

    pub(crate) fn already_exists(path: &str, operation: &str) -> Self {
        FsError::AlreadyExists {
            path: path.to_string(),
            operation: operation.to_string(),
        }
    }

    pub(crate) fn is_directory(path: &str, operation: &str) -> Self {
        FsError::IsDirectory {
            path: path.to_string(),
            operation: operation.to_string(),
        }
    }
}

/// What a path holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEntry {
    File(Vec<u8>),
    Directory,
}

impl FsEntry {
    pub fn stat(&self) -> FsStat {
        match self {
            FsEntry::File(content) => FsStat {
                is_file: true,
                is_directory: false,
                size: content.len() as u64,
            },
            FsEntry::Directory => FsStat {
                is_file: false,
                is_directory: true,
                size: 0,
            },
        }
    }
}

/// File status information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub size: u64,
}

/// Options for mkdir operation
#[derive(Debug, Clone, Default)]
pub struct MkdirOptions {
    pub recursive: bool,
}

/// The volume a shell session runs against.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Whole file as text; invalid utf8 is replaced.
    async fn read_file(&self, path: &str) -> Result<String, FsError> {
        let buf = self.read_file_buffer(path).await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    async fn read_file_buffer(&self, path: &str) -> Result<Vec<u8>, FsError>;

    /// Create or truncate `path`, then write `content`.
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    /// Append to `path`, creating it if needed.
    async fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    async fn exists(&self, path: &str) -> bool;

    async fn stat(&self, path: &str) -> Result<FsStat, FsError>;

    async fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError>;

    /// Absolute, normalized form of `path` relative to `base`.
    fn resolve_path(&self, base: &str, path: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_stat() {
        let file = FsEntry::File(b"RITE0300".to_vec()).stat();
        assert!(file.is_file);
        assert_eq!(file.size, 8);

        let dir = FsEntry::Directory.stat();
        assert!(dir.is_directory);
        assert!(!dir.is_file);
    }

    #[test]
    fn test_error_messages() {
        let err = FsError::not_found("/bin/x", "open");
        assert_eq!(err.to_string(), "ENOENT: no such file or directory, open '/bin/x'");
        let err = FsError::is_directory("/tmp", "write");
        assert_eq!(err.to_string(), "EISDIR: illegal operation on a directory, write '/tmp'");
    }
}
