//! basename and dirname utilities

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

pub struct Basename;

#[async_trait]
impl Utility for Basename {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let operand = match ctx.args().first() {
            Some(operand) => operand.clone(),
            None => return ctx.fail("missing operand").await,
        };
        let trimmed = operand.trim_end_matches('/');
        let mut base = if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
        };
        // Optional suffix removal: `basename file.txt .txt`
        if let Some(suffix) = ctx.args().get(1) {
            if base.len() > suffix.len() {
                if let Some(stripped) = base.strip_suffix(suffix.as_str()) {
                    base = stripped.to_string();
                }
            }
        }
        ctx.io.stdout.write_str(&format!("{}\n", base)).await?;
        Ok(0)
    }
}

pub struct Dirname;

#[async_trait]
impl Utility for Dirname {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let operand = match ctx.args().first() {
            Some(operand) => operand.clone(),
            None => return ctx.fail("missing operand").await,
        };
        let trimmed = operand.trim_end_matches('/');
        let dir = match trimmed.rfind('/') {
            Some(0) => "/",
            Some(pos) => &trimmed[..pos],
            None => ".",
        };
        let dir = if trimmed.is_empty() && operand.starts_with('/') {
            "/"
        } else {
            dir
        };
        ctx.io.stdout.write_str(&format!("{}\n", dir)).await?;
        Ok(0)
    }
}
