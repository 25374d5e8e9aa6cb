//! cd - Change directory builtin
//!
//! Supports:
//! - cd [dir] - change to directory (relative to the current one)
//! - cd, cd ~ - change to the configured home directory

use crate::interpreter::errors::ShellError;
use crate::interpreter::types::{ExecEnv, ExecResult, InvocationContext, SessionState};

pub async fn handle_cd(
    env: &ExecEnv,
    session: &mut SessionState,
    inv: &InvocationContext,
) -> Result<ExecResult, ShellError> {
    let target = match inv.args() {
        [] => session.home.clone(),
        [dir] if dir == "~" => session.home.clone(),
        [dir] => dir.clone(),
        _ => return Err(ShellError::builtin("cd", "too many arguments")),
    };

    let resolved = env.fs.resolve_path(&session.cwd, &target);
    match env.fs.stat(&resolved).await {
        Ok(stat) if stat.is_directory => {
            session.cwd = resolved;
            Ok(ExecResult::ok())
        }
        Ok(_) => Err(ShellError::builtin("cd", format!("{}: Not a directory", target))),
        Err(_) => Err(ShellError::builtin(
            "cd",
            format!("{}: No such file or directory", target),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MkdirOptions;
    use crate::interpreter::test_support::env_with;

    fn cd(args: &[&str]) -> InvocationContext {
        let mut argv = vec!["cd".to_string()];
        argv.extend(args.iter().map(|s| s.to_string()));
        InvocationContext::new(argv, "/")
    }

    #[tokio::test]
    async fn test_cd_relative_and_home() {
        let env = env_with(&[], None).await;
        env.fs.mkdir("/home/user/src", &MkdirOptions { recursive: true }).await.unwrap();
        let mut session = SessionState { cwd: "/home".into(), home: "/home/user".into() };

        handle_cd(&env, &mut session, &cd(&["user/src"])).await.unwrap();
        assert_eq!(session.cwd, "/home/user/src");

        handle_cd(&env, &mut session, &cd(&[".."])).await.unwrap();
        assert_eq!(session.cwd, "/home/user");

        session.cwd = "/".into();
        handle_cd(&env, &mut session, &cd(&[])).await.unwrap();
        assert_eq!(session.cwd, "/home/user");
    }

    #[tokio::test]
    async fn test_cd_root_is_not_home() {
        let env = env_with(&[], None).await;
        env.fs.mkdir("/home/user", &MkdirOptions { recursive: true }).await.unwrap();
        let mut session = SessionState { cwd: "/home/user".into(), home: "/home/user".into() };

        handle_cd(&env, &mut session, &cd(&["/"])).await.unwrap();
        assert_eq!(session.cwd, "/");

        handle_cd(&env, &mut session, &cd(&["~"])).await.unwrap();
        assert_eq!(session.cwd, "/home/user");
    }

    #[tokio::test]
    async fn test_cd_rejects_files_and_missing() {
        let env = env_with(&[("/bin/tool", "puts x")], None).await;
        let mut session = SessionState::default();

        let err = handle_cd(&env, &mut session, &cd(&["/bin/tool"])).await.unwrap_err();
        assert_eq!(err.to_string(), "cd: /bin/tool: Not a directory");

        let err = handle_cd(&env, &mut session, &cd(&["/nope"])).await.unwrap_err();
        assert_eq!(err.to_string(), "cd: /nope: No such file or directory");
        assert_eq!(session.cwd, "/");
    }
}
