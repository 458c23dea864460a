//! Directory navigation builtins: `cd`, `pwd`

use std::path::PathBuf;

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;

pub struct Cd;

#[async_trait]
impl Builtin for Cd {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let target = match ctx.args().first().map(String::as_str) {
            None | Some("~") => ctx
                .state
                .get_scalar("HOME")
                .unwrap_or_else(|| "/home/user".to_string()),
            Some("-") => match &ctx.state.prev_dir {
                Some(prev) => {
                    let prev = prev.to_string_lossy().into_owned();
                    ctx.io.stdout.write_str(&format!("{}\n", prev)).await?;
                    prev
                }
                None => return ctx.error("OLDPWD not set").await,
            },
            Some(path) => path.to_string(),
        };

        let path = ctx.state.absolute(&target);
        let resolved = match ctx.fs.resolve(&path).await {
            Ok(resolved) => resolved,
            Err(e) => return ctx.error(format!("{}: {}", target, e)).await,
        };
        match ctx.fs.stat(&resolved).await {
            Ok(meta) if meta.file_type.is_dir() => {
                ctx.state.prev_dir = Some(std::mem::replace(&mut ctx.state.cwd, resolved.clone()));
                ctx.state
                    .scopes
                    .set_scalar("PWD", resolved.to_string_lossy())?;
                if let Some(prev) = &ctx.state.prev_dir {
                    ctx.state
                        .scopes
                        .set_scalar("OLDPWD", prev.to_string_lossy())?;
                }
                Ok(0)
            }
            Ok(_) => ctx.error(format!("{}: not a directory", target)).await,
            Err(e) => ctx.error(format!("{}: {}", target, e)).await,
        }
    }
}

pub struct Pwd;

#[async_trait]
impl Builtin for Pwd {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let cwd: PathBuf = ctx.state.cwd.clone();
        ctx.io
            .stdout
            .write_str(&format!("{}\n", cwd.to_string_lossy()))
            .await?;
        Ok(0)
    }
}
