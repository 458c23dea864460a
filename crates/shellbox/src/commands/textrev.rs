//! tac and rev utilities

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

async fn slurp(ctx: &mut UtilityContext<'_>) -> Result<std::result::Result<String, String>> {
    let files = ctx.args().to_vec();
    if files.is_empty() {
        return Ok(Ok(ctx.io.stdin.read_to_string().await));
    }
    let mut text = String::new();
    for file in &files {
        if file == "-" {
            text.push_str(&ctx.io.stdin.read_to_string().await);
            continue;
        }
        match ctx.fs.read_file(&ctx.path(file)).await {
            Ok(content) => text.push_str(&String::from_utf8_lossy(&content)),
            Err(e) => return Ok(Err(format!("{}: {}", file, e))),
        }
    }
    Ok(Ok(text))
}

/// `tac` — lines in reverse order.
pub struct Tac;

#[async_trait]
impl Utility for Tac {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let text = match slurp(ctx).await? {
            Ok(text) => text,
            Err(message) => return ctx.fail(message).await,
        };
        let mut out = String::with_capacity(text.len());
        for line in text.lines().rev() {
            out.push_str(line);
            out.push('\n');
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}

/// `rev` — characters of each line reversed.
pub struct Rev;

#[async_trait]
impl Utility for Rev {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let text = match slurp(ctx).await? {
            Ok(text) => text,
            Err(message) => return ctx.fail(message).await,
        };
        let mut out = String::with_capacity(text.len());
        for line in text.lines() {
            out.extend(line.chars().rev());
            out.push('\n');
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}
