//! Error types for Shellbox

use thiserror::Error;

use crate::limits::LimitExceeded;

/// Result type alias using Shellbox's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Shellbox error types.
///
/// Expansion, arithmetic and filesystem errors are recovered at the command
/// boundary (exit status plus a stderr line); syntax, limit and cancellation
/// errors terminate the current `run`.
#[derive(Error, Debug)]
pub enum Error {
    /// Lexing or parsing failure. Fatal for the current run; exit 2.
    #[error("syntax error near line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// Word-expansion failure (`${x:?msg}`, failglob, bad substring, ...).
    #[error("{0}")]
    Expansion(String),

    /// Arithmetic failure (division by zero, invalid token).
    #[error("arithmetic error: {0}")]
    Arith(String),

    /// Virtual filesystem failure.
    #[error("{0}")]
    Vfs(#[from] VfsError),

    /// Command name resolved to nothing. Exit 127.
    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// A resource limit was exceeded. Exit 124, terminates the run.
    #[error("limit exceeded: {0}")]
    Limit(#[from] LimitExceeded),

    /// The session's cancellation token fired. Exit 130.
    #[error("cancelled")]
    Cancelled,

    /// Broken pipe: the reading end of a pipeline stage has gone away.
    #[error("broken pipe")]
    BrokenPipe,

    /// Any other execution failure.
    #[error("execution error: {0}")]
    Execution(String),
}

impl Error {
    /// Exit status a script terminates with when this error escapes a run.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Syntax { .. } => 2,
            Error::CommandNotFound(_) => 127,
            Error::Limit(_) => 124,
            Error::Cancelled => 130,
            Error::BrokenPipe => 141,
            _ => 1,
        }
    }
}

/// Virtual filesystem error kinds.
///
/// Commands translate these to their conventional exit codes and messages;
/// the kinds mirror the POSIX errno values the operations would produce.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotDir,
    #[error("is a directory")]
    IsDir,
    #[error("file exists")]
    Exists,
    #[error("permission denied")]
    Permission,
    #[error("too many levels of symbolic links")]
    Loop,
    #[error("no space left on device")]
    NoSpace,
    #[error("directory not empty")]
    NotEmpty,
    #[error("invalid argument")]
    Invalid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_errors_exit_2() {
        let err = Error::Syntax {
            line: 3,
            message: "unexpected token".into(),
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn not_found_exits_127() {
        assert_eq!(Error::CommandNotFound("frobnicate".into()).exit_code(), 127);
    }

    #[test]
    fn vfs_error_message_matches_errno_text() {
        assert_eq!(VfsError::NotFound.to_string(), "no such file or directory");
        assert_eq!(VfsError::NoSpace.to_string(), "no space left on device");
    }
}
