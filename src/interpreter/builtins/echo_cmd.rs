//! echo - write arguments to stdout

use crate::interpreter::types::{ExecResult, InvocationContext};

/// Arguments joined by single spaces, plus a newline.
pub fn handle_echo(inv: &InvocationContext) -> ExecResult {
    let mut out = inv.args().join(" ");
    out.push('\n');
    ExecResult::output(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_joins_arguments() {
        let inv = InvocationContext::new(vec!["echo".into(), "a".into(), "b c".into()], "/");
        assert_eq!(handle_echo(&inv).stdout, "a b c\n");
    }

    #[test]
    fn test_echo_without_arguments() {
        let inv = InvocationContext::new(vec!["echo".into()], "/");
        assert_eq!(handle_echo(&inv).stdout, "\n");
    }
}
