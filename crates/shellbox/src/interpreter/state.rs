//! Interpreter state types

/// Control flow signals raised by `break`, `continue`, `return` and `exit`.
///
/// Stored on the shell state by the signalling builtin; the evaluator
/// inspects it after every command and unwinds accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFlow {
    #[default]
    None,
    /// Break out of `n` enclosing loops.
    Break(u32),
    /// Continue the `n`th enclosing loop.
    Continue(u32),
    /// Return from the current function with a status.
    Return(i32),
    /// Terminate the whole script with a status.
    Exit(i32),
}

impl ControlFlow {
    pub fn is_none(&self) -> bool {
        matches!(self, ControlFlow::None)
    }
}

/// Result of executing a script through a session.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit code of the last command (or the failing construct).
    pub exit_code: i32,
}

impl ExecResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_flow_default_is_none() {
        assert!(ControlFlow::default().is_none());
        assert!(!ControlFlow::Break(1).is_none());
    }

    #[test]
    fn exec_result_success() {
        assert!(ExecResult::default().is_success());
        let failed = ExecResult {
            exit_code: 3,
            ..Default::default()
        };
        assert!(!failed.is_success());
    }
}
