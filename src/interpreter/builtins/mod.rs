//! Builtin Commands
//!
//! The closed set of names the dispatcher handles in-process. Matching is
//! case-sensitive. Reserved names are recognized (so they never fall through
//! to a path search) but fail with "not supported".

use std::collections::HashMap;

use crate::interpreter::errors::ShellError;
use crate::interpreter::types::{ExecEnv, ExecResult, InvocationContext, SessionState};

pub mod cd_cmd;
pub mod echo_cmd;
pub mod free_cmd;
pub mod pwd_cmd;
pub mod ruby_cmd;
pub mod type_cmd;

pub use cd_cmd::handle_cd;
pub use echo_cmd::handle_echo;
pub use free_cmd::handle_free;
pub use pwd_cmd::handle_pwd;
pub use ruby_cmd::{handle_irb, handle_ruby};
pub use type_cmd::handle_type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Free,
    Irb,
    Ruby,
    Alias,
    Cd,
    Echo,
    Export,
    Exec,
    Exit,
    Fc,
    Help,
    History,
    Kill,
    Pwd,
    Type,
    Unset,
}

lazy_static::lazy_static! {
    static ref BUILTIN_NAMES: HashMap<&'static str, Builtin> =
        Builtin::ALL.iter().map(|b| (b.name(), *b)).collect();
}

impl Builtin {
    pub const ALL: [Builtin; 16] = [
        Builtin::Free,
        Builtin::Irb,
        Builtin::Ruby,
        Builtin::Alias,
        Builtin::Cd,
        Builtin::Echo,
        Builtin::Export,
        Builtin::Exec,
        Builtin::Exit,
        Builtin::Fc,
        Builtin::Help,
        Builtin::History,
        Builtin::Kill,
        Builtin::Pwd,
        Builtin::Type,
        Builtin::Unset,
    ];

    pub fn from_name(name: &str) -> Option<Builtin> {
        BUILTIN_NAMES.get(name).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Free => "free",
            Builtin::Irb => "irb",
            Builtin::Ruby => "ruby",
            Builtin::Alias => "alias",
            Builtin::Cd => "cd",
            Builtin::Echo => "echo",
            Builtin::Export => "export",
            Builtin::Exec => "exec",
            Builtin::Exit => "exit",
            Builtin::Fc => "fc",
            Builtin::Help => "help",
            Builtin::History => "history",
            Builtin::Kill => "kill",
            Builtin::Pwd => "pwd",
            Builtin::Type => "type",
            Builtin::Unset => "unset",
        }
    }

    /// Run the handler in-process. No execution context from the pool is used.
    pub async fn run(
        self,
        env: &ExecEnv,
        session: &mut SessionState,
        inv: &InvocationContext,
    ) -> Result<ExecResult, ShellError> {
        match self {
            Builtin::Echo => Ok(handle_echo(inv)),
            Builtin::Pwd => Ok(handle_pwd(session)),
            Builtin::Cd => handle_cd(env, session, inv).await,
            Builtin::Type => Ok(handle_type(env, session, inv).await),
            Builtin::Free => Ok(handle_free(env)),
            Builtin::Ruby => handle_ruby(env, inv).await,
            Builtin::Irb => handle_irb(env, inv).await,
            reserved => Err(ShellError::Unsupported {
                name: reserved.name().to_string(),
            }),
        }
    }
}

pub fn is_builtin(name: &str) -> bool {
    Builtin::from_name(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::test_support::env_with;

    #[test]
    fn test_name_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert_eq!(Builtin::from_name("echo"), Some(Builtin::Echo));
        assert_eq!(Builtin::from_name("ECHO"), None);
        assert!(!is_builtin("ls"));
    }

    #[tokio::test]
    async fn test_reserved_names_are_unsupported() {
        let env = env_with(&[], None).await;
        let mut session = SessionState::default();
        let inv = InvocationContext::new(vec!["history".into()], "/");
        let err = Builtin::History.run(&env, &mut session, &inv).await.unwrap_err();
        assert_eq!(err.to_string(), "history: not supported");
    }
}
