//! env and printenv utilities

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

pub struct Env;

#[async_trait]
impl Utility for Env {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut names: Vec<&String> = ctx.env.keys().collect();
        names.sort();
        let mut out = String::new();
        for name in names {
            out.push_str(&format!("{}={}\n", name, ctx.env[name]));
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}

pub struct Printenv;

#[async_trait]
impl Utility for Printenv {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        if ctx.args().is_empty() {
            let mut names: Vec<&String> = ctx.env.keys().collect();
            names.sort();
            let mut out = String::new();
            for name in names {
                out.push_str(&format!("{}={}\n", name, ctx.env[name]));
            }
            ctx.io.stdout.write_str(&out).await?;
            return Ok(0);
        }
        let mut status = 0;
        for name in ctx.args().to_vec() {
            match ctx.env.get(&name) {
                Some(value) => {
                    ctx.io.stdout.write_str(&format!("{}\n", value)).await?;
                }
                None => status = 1,
            }
        }
        Ok(status)
    }
}
