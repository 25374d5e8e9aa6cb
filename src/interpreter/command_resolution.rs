//! Command Resolution
//!
//! Search-path lookup for external commands. Resolution is a pure
//! filesystem query and never touches an execution context.

use crate::fs::FileSystem;
use crate::interpreter::errors::ShellError;

/// Search path used when none is configured
pub const DEFAULT_PATH: &str = "/bin:/usr/bin";

/// Split a colon-separated search path into individual directories
pub fn split_path(path_env: &str) -> Vec<String> {
    path_env
        .split(':')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check if a command name contains a path separator (making it a path reference)
pub fn is_path_command(command_name: &str) -> bool {
    command_name.contains('/')
}

/// Build a full path from a directory and command name
pub fn build_command_path(dir: &str, command_name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, command_name)
    } else {
        format!("{}/{}", dir, command_name)
    }
}

async fn is_regular_file(fs: &dyn FileSystem, path: &str) -> bool {
    matches!(fs.stat(path).await, Ok(stat) if stat.is_file)
}

/// Find the file a command name refers to.
///
/// Names containing `/` are resolved against `cwd`; anything else is looked
/// up in each search-path directory in order, first match wins.
pub async fn find_executable(
    fs: &dyn FileSystem,
    cwd: &str,
    search_path: &[String],
    command_name: &str,
) -> Option<String> {
    if command_name.is_empty() {
        return None;
    }

    if is_path_command(command_name) {
        let resolved = fs.resolve_path(cwd, command_name);
        return is_regular_file(fs, &resolved).await.then_some(resolved);
    }

    for dir in search_path {
        let candidate = build_command_path(dir, command_name);
        if is_regular_file(fs, &candidate).await {
            return Some(candidate);
        }
    }
    None
}

/// Like [`find_executable`], failing with [`ShellError::Resolution`] on a miss.
pub async fn resolve_command(
    fs: &dyn FileSystem,
    cwd: &str,
    search_path: &[String],
    command_name: &str,
) -> Result<String, ShellError> {
    find_executable(fs, cwd, search_path, command_name)
        .await
        .ok_or_else(|| ShellError::Resolution {
            name: command_name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{InMemoryFs, MkdirOptions};

    fn search_path() -> Vec<String> {
        split_path(DEFAULT_PATH)
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/bin::/usr/bin:"), vec!["/bin", "/usr/bin"]);
    }

    #[test]
    fn test_build_command_path() {
        assert_eq!(build_command_path("/bin", "ls"), "/bin/ls");
        assert_eq!(build_command_path("/bin/", "ls"), "/bin/ls");
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let fs = InMemoryFs::new();
        fs.write_file("/bin/tool", b"a").await.unwrap();
        fs.write_file("/usr/bin/tool", b"b").await.unwrap();
        fs.write_file("/usr/bin/other", b"c").await.unwrap();

        assert_eq!(
            find_executable(&fs, "/", &search_path(), "tool").await.as_deref(),
            Some("/bin/tool")
        );
        assert_eq!(
            find_executable(&fs, "/", &search_path(), "other").await.as_deref(),
            Some("/usr/bin/other")
        );
    }

    #[tokio::test]
    async fn test_directories_do_not_match() {
        let fs = InMemoryFs::new();
        fs.mkdir("/bin/tool", &MkdirOptions { recursive: true }).await.unwrap();
        assert_eq!(find_executable(&fs, "/", &search_path(), "tool").await, None);
    }

    #[tokio::test]
    async fn test_path_command_relative_to_cwd() {
        let fs = InMemoryFs::new();
        fs.write_file("/home/user/run", b"x").await.unwrap();
        assert_eq!(
            find_executable(&fs, "/home/user", &[], "./run").await.as_deref(),
            Some("/home/user/run")
        );
        assert_eq!(find_executable(&fs, "/", &[], "./run").await, None);
    }

    #[tokio::test]
    async fn test_resolve_command_miss() {
        let fs = InMemoryFs::new();
        let err = resolve_command(&fs, "/", &search_path(), "nosuchcmd").await.unwrap_err();
        assert_eq!(err.to_string(), "nosuchcmd: command not found");
    }
}
