//! Introspection builtins: `type`, `hash`

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::SPECIAL_FORMS;

pub struct Type;

#[async_trait]
impl Builtin for Type {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let mut status = 0;
        // `-t` prints just the kind word.
        let (terse, names) = match ctx.args().split_first() {
            Some((flag, rest)) if flag == "-t" => (true, rest.to_vec()),
            _ => (false, ctx.args().to_vec()),
        };
        for name in names {
            let kind = if ctx.state.aliases.contains_key(&name) {
                Some("alias")
            } else if ctx.state.functions.contains_key(&name) {
                Some("function")
            } else if SPECIAL_FORMS.contains(&name.as_str())
                || ctx.registry.builtin(&name).is_some()
            {
                Some("builtin")
            } else if ctx.registry.utility(&name).is_some() {
                Some("file")
            } else {
                None
            };
            match kind {
                Some(kind) if terse => {
                    ctx.io.stdout.write_str(&format!("{}\n", kind)).await?;
                }
                Some("alias") => {
                    let value = ctx.state.aliases[&name].clone();
                    ctx.io
                        .stdout
                        .write_str(&format!("{} is aliased to `{}'\n", name, value))
                        .await?;
                }
                Some("function") => {
                    ctx.io
                        .stdout
                        .write_str(&format!("{} is a function\n", name))
                        .await?;
                }
                Some("builtin") => {
                    ctx.io
                        .stdout
                        .write_str(&format!("{} is a shell builtin\n", name))
                        .await?;
                }
                Some(_) => {
                    ctx.io
                        .stdout
                        .write_str(&format!("{} is /usr/bin/{}\n", name, name))
                        .await?;
                }
                None => {
                    status = ctx.error(format!("{}: not found", name)).await?;
                }
            }
        }
        Ok(status)
    }
}

/// `hash` — command path caching has no meaning here; accept and succeed.
pub struct Hash;

#[async_trait]
impl Builtin for Hash {
    async fn invoke(&self, _ctx: &mut Context<'_>) -> Result<i32> {
        Ok(0)
    }
}
