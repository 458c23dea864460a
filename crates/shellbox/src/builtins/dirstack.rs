//! Directory stack builtins: `pushd`, `popd`, `dirs`

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;

async fn print_stack(ctx: &mut Context<'_>) -> Result<()> {
    let mut entries = vec![ctx.state.cwd.to_string_lossy().into_owned()];
    entries.extend(
        ctx.state
            .dir_stack
            .iter()
            .rev()
            .map(|p| p.to_string_lossy().into_owned()),
    );
    ctx.io
        .stdout
        .write_str(&format!("{}\n", entries.join(" ")))
        .await?;
    Ok(())
}

async fn change_dir(ctx: &mut Context<'_>, target: &str) -> Result<bool> {
    let path = ctx.state.absolute(target);
    match ctx.fs.stat(&path).await {
        Ok(meta) if meta.file_type.is_dir() => {
            let resolved = ctx.fs.resolve(&path).await?;
            ctx.state.prev_dir = Some(std::mem::replace(&mut ctx.state.cwd, resolved));
            Ok(true)
        }
        _ => Ok(false),
    }
}

pub struct Pushd;

#[async_trait]
impl Builtin for Pushd {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        match ctx.args().first().cloned() {
            Some(target) => {
                let old = ctx.state.cwd.clone();
                if !change_dir(ctx, &target).await? {
                    return ctx.error(format!("{}: no such directory", target)).await;
                }
                ctx.state.dir_stack.push(old);
                print_stack(ctx).await?;
                Ok(0)
            }
            None => {
                // Swap the top two entries.
                let top = match ctx.state.dir_stack.pop() {
                    Some(top) => top,
                    None => return ctx.error("no other directory").await,
                };
                let old = ctx.state.cwd.clone();
                if !change_dir(ctx, &top.to_string_lossy()).await? {
                    ctx.state.dir_stack.push(top);
                    return ctx.error("failed to change directory").await;
                }
                ctx.state.dir_stack.push(old);
                print_stack(ctx).await?;
                Ok(0)
            }
        }
    }
}

pub struct Popd;

#[async_trait]
impl Builtin for Popd {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let top = match ctx.state.dir_stack.pop() {
            Some(top) => top,
            None => return ctx.error("directory stack empty").await,
        };
        if !change_dir(ctx, &top.to_string_lossy()).await? {
            return ctx.error("failed to change directory").await;
        }
        print_stack(ctx).await?;
        Ok(0)
    }
}

pub struct Dirs;

#[async_trait]
impl Builtin for Dirs {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        if ctx.args().first().map(String::as_str) == Some("-c") {
            ctx.state.dir_stack.clear();
            return Ok(0);
        }
        print_stack(ctx).await?;
        Ok(0)
    }
}
