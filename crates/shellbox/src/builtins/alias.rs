//! `alias` and `unalias`

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;

pub struct Alias;

#[async_trait]
impl Builtin for Alias {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        if ctx.args().is_empty() {
            let mut names: Vec<&String> = ctx.state.aliases.keys().collect();
            names.sort();
            let mut out = String::new();
            for name in names {
                out.push_str(&format!("alias {}='{}'\n", name, ctx.state.aliases[name]));
            }
            ctx.io.stdout.write_str(&out).await?;
            return Ok(0);
        }

        let mut status = 0;
        for arg in ctx.args().to_vec() {
            match arg.split_once('=') {
                Some((name, value)) => {
                    ctx.state
                        .aliases
                        .insert(name.to_string(), value.to_string());
                }
                None => match ctx.state.aliases.get(&arg) {
                    Some(value) => {
                        ctx.io
                            .stdout
                            .write_str(&format!("alias {}='{}'\n", arg, value))
                            .await?;
                    }
                    None => {
                        status = ctx.error(format!("{}: not found", arg)).await?;
                    }
                },
            }
        }
        Ok(status)
    }
}

pub struct Unalias;

#[async_trait]
impl Builtin for Unalias {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        if ctx.args().first().map(String::as_str) == Some("-a") {
            ctx.state.aliases.clear();
            return Ok(0);
        }
        let mut status = 0;
        for name in ctx.args().to_vec() {
            if ctx.state.aliases.remove(&name).is_none() {
                status = ctx.error(format!("{}: not found", name)).await?;
            }
        }
        Ok(status)
    }
}
