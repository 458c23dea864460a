//! Bundled utility commands.
//!
//! Utilities are registered by name at session creation and dispatched
//! through the same contract as builtins, but they only see a snapshot of
//! the session (env, cwd) and the filesystem; they cannot mutate shell
//! state. Embedders can replace or extend the set through
//! [`Registry::register_utility`](crate::builtins::Registry::register_utility).

mod cat;
mod cuttr;
mod echo;
mod environ;
mod fileops;
mod grep;
mod headtail;
mod ls;
mod path;
mod printf;
mod seq;
mod sleep;
mod sortuniq;
mod textrev;
mod wc;
mod yes;

use crate::builtins::Registry;

pub(crate) use echo::interpret_escapes as echo_escapes;

/// Install the default utility set into a registry.
pub fn install(registry: &mut Registry) {
    registry.register_utility("echo", echo::Echo);
    registry.register_utility("printf", printf::Printf);
    registry.register_utility("cat", cat::Cat);
    registry.register_utility("ls", ls::Ls);
    registry.register_utility("mkdir", fileops::Mkdir);
    registry.register_utility("rmdir", fileops::Rmdir);
    registry.register_utility("rm", fileops::Rm);
    registry.register_utility("cp", fileops::Cp);
    registry.register_utility("mv", fileops::Mv);
    registry.register_utility("touch", fileops::Touch);
    registry.register_utility("ln", fileops::Ln);
    registry.register_utility("readlink", fileops::Readlink);
    registry.register_utility("chmod", fileops::Chmod);
    registry.register_utility("head", headtail::Head);
    registry.register_utility("tail", headtail::Tail);
    registry.register_utility("wc", wc::Wc);
    registry.register_utility("tr", cuttr::Tr);
    registry.register_utility("cut", cuttr::Cut);
    registry.register_utility("sort", sortuniq::Sort);
    registry.register_utility("uniq", sortuniq::Uniq);
    registry.register_utility("seq", seq::Seq);
    registry.register_utility("basename", path::Basename);
    registry.register_utility("dirname", path::Dirname);
    registry.register_utility("env", environ::Env);
    registry.register_utility("printenv", environ::Printenv);
    registry.register_utility("sleep", sleep::Sleep);
    registry.register_utility("grep", grep::Grep);
    registry.register_utility("tac", textrev::Tac);
    registry.register_utility("rev", textrev::Rev);
    registry.register_utility("yes", yes::Yes);
}
