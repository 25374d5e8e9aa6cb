//! pwd - print the working directory

use crate::interpreter::types::{ExecResult, SessionState};

pub fn handle_pwd(session: &SessionState) -> ExecResult {
    ExecResult::output(format!("{}\n", session.cwd))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pwd() {
        let session = SessionState { cwd: "/home/user".into(), home: "/".into() };
        assert_eq!(handle_pwd(&session).stdout, "/home/user\n");
    }
}
