//! In-Memory File System Implementation
//!
//! A pure in-memory volume for the shell. Executables live here as regular
//! files, so a session can run without touching the host disk. Every key in
//! the table is a normalized absolute path.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::*;

type Table = HashMap<String, FsEntry>;

/// In-memory virtual file system.
pub struct InMemoryFs {
    entries: RwLock<Table>,
}

impl InMemoryFs {
    /// A volume holding only `/`.
    pub fn new() -> Self {
        let mut entries = Table::new();
        entries.insert("/".to_string(), FsEntry::Directory);
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse `.`, `..` and repeated slashes. Relative input is taken from `/`.
pub(crate) fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

/// Create every missing directory above `path`.
fn make_parents(entries: &mut Table, path: &str) {
    let parent = parent_of(path);
    if parent == "/" || entries.contains_key(parent) {
        return;
    }
    make_parents(entries, parent);
    entries.insert(parent.to_string(), FsEntry::Directory);
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read_file_buffer(&self, path: &str) -> Result<Vec<u8>, FsError> {
        match self.entries.read().await.get(&normalize_path(path)) {
            Some(FsEntry::File(content)) => Ok(content.clone()),
            Some(FsEntry::Directory) => Err(FsError::is_directory(path, "read")),
            None => Err(FsError::not_found(path, "open")),
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let key = normalize_path(path);
        let mut entries = self.entries.write().await;
        if entries.get(&key) == Some(&FsEntry::Directory) {
            return Err(FsError::is_directory(path, "write"));
        }
        make_parents(&mut entries, &key);
        entries.insert(key, FsEntry::File(content.to_vec()));
        Ok(())
    }

    async fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let key = normalize_path(path);
        let mut entries = self.entries.write().await;
        match entries.get_mut(&key) {
            Some(FsEntry::File(existing)) => existing.extend_from_slice(content),
            Some(FsEntry::Directory) => return Err(FsError::is_directory(path, "write")),
            None => {
                make_parents(&mut entries, &key);
                entries.insert(key, FsEntry::File(content.to_vec()));
            }
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.entries.read().await.contains_key(&normalize_path(path))
    }

    async fn stat(&self, path: &str) -> Result<FsStat, FsError> {
        self.entries
            .read()
            .await
            .get(&normalize_path(path))
            .map(FsEntry::stat)
            .ok_or_else(|| FsError::not_found(path, "stat"))
    }

    async fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError> {
        let key = normalize_path(path);
        let mut entries = self.entries.write().await;
        match entries.get(&key) {
            Some(FsEntry::Directory) if options.recursive => return Ok(()),
            Some(_) => return Err(FsError::already_exists(path, "mkdir")),
            None => {}
        }
        if !entries.contains_key(parent_of(&key)) {
            if !options.recursive {
                return Err(FsError::not_found(path, "mkdir"));
            }
            make_parents(&mut entries, &key);
        }
        entries.insert(key, FsEntry::Directory);
        Ok(())
    }

    fn resolve_path(&self, base: &str, path: &str) -> String {
        if path.starts_with('/') {
            normalize_path(path)
        } else {
            normalize_path(&format!("{}/{}", base, path))
        }
    }
}
