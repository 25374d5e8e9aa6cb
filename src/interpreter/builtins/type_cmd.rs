//! type - describe how each name would be run

use crate::interpreter::builtins::is_builtin;
use crate::interpreter::command_resolution::find_executable;
use crate::interpreter::types::{ExecEnv, ExecResult, InvocationContext, SessionState};

pub async fn handle_type(
    env: &ExecEnv,
    session: &SessionState,
    inv: &InvocationContext,
) -> ExecResult {
    let mut stdout = String::new();
    let mut stderr = String::new();

    for name in inv.args() {
        if is_builtin(name) {
            stdout.push_str(&format!("{} is a shell builtin\n", name));
            continue;
        }
        match find_executable(env.fs.as_ref(), &session.cwd, &env.search_path, name).await {
            Some(path) => stdout.push_str(&format!("{} is {}\n", name, path)),
            None => stderr.push_str(&format!("type: {}: not found\n", name)),
        }
    }

    let success = stderr.is_empty();
    ExecResult::new(stdout, stderr, success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::test_support::env_with;

    #[tokio::test]
    async fn test_type_reports_each_name() {
        let env = env_with(&[("/bin/head", "head $2")], None).await;
        let inv = InvocationContext::new(
            vec!["type".into(), "cd".into(), "head".into(), "ghost".into()],
            "/",
        );
        let result = handle_type(&env, &SessionState::default(), &inv).await;
        assert_eq!(result.stdout, "cd is a shell builtin\nhead is /bin/head\n");
        assert_eq!(result.stderr, "type: ghost: not found\n");
        assert!(!result.success);
    }
}
