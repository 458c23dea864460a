//! Command dispatch: builtins, utilities and the registry.
//!
//! Everything a script can run implements one of two contracts. A
//! [`Builtin`] receives the live shell state and may mutate it (`cd`,
//! `export`, `set`). A [`Utility`] gets a snapshot (env, cwd) plus the
//! filesystem and streams, and cannot touch shell state. The evaluator is
//! the only caller of either.

mod alias;
mod dirstack;
mod flow;
mod inspect;
mod navigation;
mod read;
mod test;
mod vars;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::fs::FileSystem;
use crate::interpreter::{jobs::JobTable, Io, ShellState};

/// Execution context for a builtin: full mutable access to the session.
pub struct Context<'a> {
    /// `argv[0]` is the command name.
    pub argv: Vec<String>,
    pub io: &'a mut Io,
    pub state: &'a mut ShellState,
    pub fs: &'a Arc<dyn FileSystem>,
    pub registry: &'a Registry,
    pub(crate) jobs: &'a mut JobTable,
}

impl Context<'_> {
    /// Arguments after the command name.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub async fn error(&mut self, message: impl AsRef<str>) -> Result<i32> {
        self.io
            .stderr
            .write_str(&format!("{}: {}\n", self.argv[0], message.as_ref()))
            .await?;
        Ok(1)
    }
}

/// Execution context for a utility: read-only view of the session.
pub struct UtilityContext<'a> {
    pub argv: Vec<String>,
    pub io: &'a mut Io,
    /// Exported environment snapshot.
    pub env: HashMap<String, String>,
    pub cwd: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub cancel: CancellationToken,
    /// Wall-clock budget left, for commands that sleep.
    pub remaining_time: Option<Duration>,
}

impl UtilityContext<'_> {
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// Resolve an operand path against the session cwd.
    pub fn path(&self, operand: &str) -> PathBuf {
        if operand.starts_with('/') {
            PathBuf::from(operand)
        } else {
            self.cwd.join(operand)
        }
    }

    /// Conventional failure: one stderr line, exit 1.
    pub async fn fail(&mut self, message: impl AsRef<str>) -> Result<i32> {
        self.io
            .stderr
            .write_str(&format!("{}: {}\n", self.argv[0], message.as_ref()))
            .await?;
        Ok(1)
    }
}

/// A command that may mutate shell state.
#[async_trait]
pub trait Builtin: Send + Sync {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32>;
}

/// A command that cannot mutate shell state.
#[async_trait]
pub trait Utility: Send + Sync {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32>;
}

/// Name → command tables. Builtins are fixed at construction; utilities can
/// be injected by the embedding application.
pub struct Registry {
    builtins: HashMap<&'static str, Box<dyn Builtin>>,
    utilities: HashMap<String, Box<dyn Utility>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// The standard registry: all core builtins plus the bundled utilities.
    pub fn new() -> Self {
        let mut registry = Self {
            builtins: HashMap::new(),
            utilities: HashMap::new(),
        };
        registry.install_builtins();
        crate::commands::install(&mut registry);
        registry
    }

    /// A registry with builtins only (no utilities).
    pub fn builtins_only() -> Self {
        let mut registry = Self {
            builtins: HashMap::new(),
            utilities: HashMap::new(),
        };
        registry.install_builtins();
        registry
    }

    fn install_builtins(&mut self) {
        self.add_builtin(":", flow::Colon);
        self.add_builtin("true", flow::True);
        self.add_builtin("false", flow::False);
        self.add_builtin("break", flow::Break);
        self.add_builtin("continue", flow::Continue);
        self.add_builtin("return", flow::Return);
        self.add_builtin("exit", flow::Exit);
        self.add_builtin("wait", flow::Wait);
        self.add_builtin("cd", navigation::Cd);
        self.add_builtin("pwd", navigation::Pwd);
        self.add_builtin("pushd", dirstack::Pushd);
        self.add_builtin("popd", dirstack::Popd);
        self.add_builtin("dirs", dirstack::Dirs);
        self.add_builtin("set", vars::Set);
        self.add_builtin("shopt", vars::Shopt);
        self.add_builtin("export", vars::Export);
        self.add_builtin("readonly", vars::Readonly);
        self.add_builtin("local", vars::Local);
        self.add_builtin("declare", vars::Declare);
        self.add_builtin("typeset", vars::Declare);
        self.add_builtin("unset", vars::Unset);
        self.add_builtin("shift", vars::Shift);
        self.add_builtin("let", vars::Let);
        self.add_builtin("umask", vars::Umask);
        self.add_builtin("alias", alias::Alias);
        self.add_builtin("unalias", alias::Unalias);
        self.add_builtin("test", test::Test);
        self.add_builtin("[", test::Test);
        self.add_builtin("type", inspect::Type);
        self.add_builtin("hash", inspect::Hash);
        self.add_builtin("read", read::Read);
        self.add_builtin("mapfile", read::Mapfile);
        self.add_builtin("readarray", read::Mapfile);
    }

    fn add_builtin(&mut self, name: &'static str, builtin: impl Builtin + 'static) {
        self.builtins.insert(name, Box::new(builtin));
    }

    /// Register (or replace) a utility command by name.
    pub fn register_utility(&mut self, name: impl Into<String>, utility: impl Utility + 'static) {
        self.utilities.insert(name.into(), Box::new(utility));
    }

    pub fn builtin_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.builtins.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn utility_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.utilities.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn builtin(&self, name: &str) -> Option<&dyn Builtin> {
        self.builtins.get(name).map(|b| b.as_ref())
    }

    pub(crate) fn utility(&self, name: &str) -> Option<&dyn Utility> {
        self.utilities.get(name).map(|u| u.as_ref())
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    #[test]
    fn core_builtins_present() {
        let registry = Registry::new();
        for name in [
            ":", "[", "alias", "break", "cd", "continue", "declare", "export", "false", "let",
            "local", "mapfile", "readarray", "readonly", "return", "set", "shift", "shopt",
            "test", "true", "type", "typeset", "unalias", "unset", "wait",
        ] {
            assert!(registry.builtin(name).is_some(), "missing builtin {}", name);
        }
    }

    #[test]
    fn utilities_installed_and_injectable() {
        let registry = Registry::new();
        for name in ["echo", "cat", "tr", "sort", "grep", "head"] {
            assert!(registry.utility(name).is_some(), "missing utility {}", name);
        }
        assert!(Registry::builtins_only().utility("echo").is_none());
    }
}
