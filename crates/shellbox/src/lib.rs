//! Shellbox - sandboxed bash interpreter for untrusted command strings
//!
//! Scripts execute entirely inside the hosting process: no subprocess is
//! ever spawned and no host file is touched. All filesystem effects land in
//! an in-memory virtual filesystem, pipelines run as cooperative tasks on
//! one thread, and hard resource limits bound every run.
//!
//! # Example
//!
//! ```rust
//! use shellbox::Shell;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> shellbox::Result<()> {
//!     let mut shell = Shell::new();
//!     let result = shell.exec("echo hello | tr a-z A-Z").await?;
//!     assert_eq!(result.stdout, "HELLO\n");
//!     assert_eq!(result.exit_code, 0);
//!     Ok(())
//! }
//! ```

mod builtins;
mod commands;
mod error;
mod expand;
mod fs;
mod interpreter;
mod limits;
mod parser;

pub use builtins::{Builtin, Context, Registry, Utility, UtilityContext};
pub use error::{Error, Result, VfsError};
pub use fs::{DirEntry, FileSystem, FileType, MemFs, Metadata};
pub use interpreter::{
    Attrs, ControlFlow, ExecResult, Input, Io, Output, ScopeStack, ShellOptions, ShellState,
    Value, Variable,
};
pub use limits::{ExecutionLimits, LimitExceeded};
pub use parser::{Parser, Script};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use interpreter::Interpreter;

/// A reusable shell session.
///
/// Variables, functions, aliases, the working directory and the filesystem
/// all persist between `exec` calls.
pub struct Shell {
    fs: Arc<dyn FileSystem>,
    interpreter: Interpreter,
    cancel: CancellationToken,
    limits: Arc<ExecutionLimits>,
    network_enabled: bool,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    /// A session with default filesystem, limits and command set.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ShellBuilder {
        ShellBuilder::default()
    }

    /// Execute a script, suspending cooperatively at pipe and sleep points.
    ///
    /// Syntax errors, limit trips and cancellation are reported through the
    /// result's `exit_code` (2, 124 and 130 respectively) with a diagnostic
    /// on `stderr`; `Err` is reserved for internal failures.
    pub async fn exec(&mut self, script: &str) -> Result<ExecResult> {
        let ast = match parser::Parser::new(script).parse() {
            Ok(ast) => ast,
            Err(e) => {
                return Ok(ExecResult {
                    stdout: String::new(),
                    stderr: format!("shellbox: {}\n", e),
                    exit_code: e.exit_code(),
                })
            }
        };

        {
            let mut counters = self.interpreter.counters.lock().expect("counters lock");
            counters.start(&self.limits);
        }
        self.interpreter.state.control = ControlFlow::None;

        let stdout = Output::capture();
        let stderr = Output::capture();
        let mut io = Io::new(Input::null(), stdout.clone(), stderr.clone());

        tracing::debug!(bytes = script.len(), "exec");
        let outcome =
            tokio::time::timeout(self.limits.timeout, self.interpreter.run_script(&ast, &mut io))
                .await;

        let exit_code = match outcome {
            Err(_) => {
                let message = format!(
                    "shellbox: {}\n",
                    LimitExceeded::WallClock(self.limits.timeout)
                );
                stderr.write_str(&message).await.ok();
                124
            }
            Ok(Ok(status)) => match self.interpreter.state.control {
                ControlFlow::Exit(code) => {
                    self.interpreter.state.control = ControlFlow::None;
                    code
                }
                _ => {
                    self.interpreter.state.control = ControlFlow::None;
                    status
                }
            },
            Ok(Err(e)) => {
                stderr.write_str(&format!("shellbox: {}\n", e)).await.ok();
                self.interpreter.state.control = ControlFlow::None;
                e.exit_code()
            }
        };
        self.interpreter.state.last_status = exit_code;

        Ok(ExecResult {
            stdout: String::from_utf8_lossy(&stdout.take_captured()).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.take_captured()).into_owned(),
            exit_code,
        })
    }

    /// Synchronous wrapper around [`exec`] for non-async callers. Must not
    /// be called from inside an async runtime.
    ///
    /// [`exec`]: Shell::exec
    pub fn run(&mut self, script: &str) -> Result<ExecResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| Error::Execution(format!("runtime: {}", e)))?;
        runtime.block_on(self.exec(script))
    }

    /// Token that aborts the current and future runs with exit 130.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handle to the session's filesystem.
    pub fn fs(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.fs)
    }

    /// Whether the session was built with network access enabled (consulted
    /// by network-facing utilities registered by the embedder).
    pub fn network_enabled(&self) -> bool {
        self.network_enabled
    }
}

/// Builder for a configured [`Shell`].
#[derive(Default)]
pub struct ShellBuilder {
    files: Vec<(PathBuf, Vec<u8>)>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    limits: Option<ExecutionLimits>,
    registry: Option<Registry>,
    network_enabled: bool,
}

impl ShellBuilder {
    /// Seed a file into the virtual filesystem (parents created).
    pub fn file(mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Set an exported environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Initial working directory (created if absent).
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Override the resource limits.
    pub fn limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Use a custom command registry (e.g. with injected utilities).
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Gate for network-facing utilities; off by default.
    pub fn network_enabled(mut self, enabled: bool) -> Self {
        self.network_enabled = enabled;
        self
    }

    pub fn build(self) -> Shell {
        let limits = Arc::new(self.limits.unwrap_or_default());
        let mem_fs = MemFs::with_quota(limits.max_vfs_bytes);
        for (path, content) in &self.files {
            // Seeding failures surface on first access instead.
            let _ = mem_fs.add_file(path, content, 0o644);
        }

        let cwd = self.cwd.unwrap_or_else(|| PathBuf::from("/home/user"));
        let _ = mem_fs.add_dir(&cwd);

        let fs: Arc<dyn FileSystem> = Arc::new(mem_fs);
        let registry = Arc::new(self.registry.unwrap_or_default());
        let cancel = CancellationToken::new();
        let mut interpreter = Interpreter::new(
            Arc::clone(&fs),
            registry,
            Arc::clone(&limits),
            cancel.clone(),
        );

        interpreter.state.cwd = cwd.clone();
        let mut env = self.env;
        env.entry("HOME".into()).or_insert_with(|| "/home/user".into());
        env.entry("PATH".into())
            .or_insert_with(|| "/usr/local/bin:/usr/bin:/bin".into());
        env.insert("PWD".into(), cwd.to_string_lossy().into_owned());
        for (key, value) in env {
            interpreter
                .state
                .scopes
                .set_local(&key, interpreter::Variable::exported(value));
        }

        Shell {
            fs,
            interpreter,
            cancel,
            limits,
            network_enabled: self.network_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_hello() {
        let mut shell = Shell::new();
        let result = shell.exec("echo hello").await.unwrap();
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn variable_expansion() {
        let mut shell = Shell::builder().env("GREETING", "hi there").build();
        let result = shell.exec("echo $GREETING").await.unwrap();
        assert_eq!(result.stdout, "hi there\n");
    }

    #[tokio::test]
    async fn state_persists_between_execs() {
        let mut shell = Shell::new();
        shell.exec("x=41").await.unwrap();
        let result = shell.exec("echo $((x + 1))").await.unwrap();
        assert_eq!(result.stdout, "42\n");
    }

    #[tokio::test]
    async fn seeded_files_visible() {
        let mut shell = Shell::builder()
            .file("/data/config.txt", "key=value\n")
            .build();
        let result = shell.exec("cat /data/config.txt").await.unwrap();
        assert_eq!(result.stdout, "key=value\n");
    }

    #[tokio::test]
    async fn syntax_error_exits_2() {
        let mut shell = Shell::new();
        let result = shell.exec("if true; then").await.unwrap();
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("syntax error"));
    }

    #[tokio::test]
    async fn cancellation_reports_130() {
        let mut shell = Shell::new();
        shell.cancellation_token().cancel();
        let result = shell.exec("echo never").await.unwrap();
        assert_eq!(result.exit_code, 130);
    }

    #[test]
    fn run_works_without_a_runtime() {
        let mut shell = Shell::new();
        let result = shell.run("echo sync").unwrap();
        assert_eq!(result.stdout, "sync\n");
    }
}
