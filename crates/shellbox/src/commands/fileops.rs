//! File manipulation utilities:
//! `mkdir rmdir rm cp mv touch ln readlink chmod`

use std::time::SystemTime;

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

fn split_flags<'a>(args: &'a [String], known: &[&str]) -> (Vec<&'a str>, Vec<&'a str>) {
    let mut flags = Vec::new();
    let mut operands = Vec::new();
    for arg in args {
        if known.contains(&arg.as_str()) {
            flags.push(arg.as_str());
        } else {
            operands.push(arg.as_str());
        }
    }
    (flags, operands)
}

pub struct Mkdir;

#[async_trait]
impl Utility for Mkdir {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let (flags, operands) = split_flags(&args, &["-p"]);
        let recursive = flags.contains(&"-p");
        if operands.is_empty() {
            return ctx.fail("missing operand").await;
        }
        for operand in operands {
            let path = ctx.path(operand);
            if let Err(e) = ctx.fs.mkdir(&path, recursive).await {
                return ctx
                    .fail(format!("cannot create directory '{}': {}", operand, e))
                    .await;
            }
        }
        Ok(0)
    }
}

pub struct Rmdir;

#[async_trait]
impl Utility for Rmdir {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        for operand in ctx.args().to_vec() {
            let path = ctx.path(&operand);
            if let Err(e) = ctx.fs.rmdir(&path).await {
                return ctx
                    .fail(format!("failed to remove '{}': {}", operand, e))
                    .await;
            }
        }
        Ok(0)
    }
}

pub struct Rm;

#[async_trait]
impl Utility for Rm {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let (flags, operands) = split_flags(&args, &["-r", "-R", "-f", "-rf", "-fr"]);
        let recursive = flags
            .iter()
            .any(|f| matches!(*f, "-r" | "-R" | "-rf" | "-fr"));
        let force = flags.iter().any(|f| matches!(*f, "-f" | "-rf" | "-fr"));
        if operands.is_empty() && !force {
            return ctx.fail("missing operand").await;
        }
        for operand in operands {
            let path = ctx.path(operand);
            let result = if recursive {
                ctx.fs.remove_tree(&path).await
            } else {
                ctx.fs.unlink(&path).await
            };
            if let Err(e) = result {
                if force {
                    continue;
                }
                return ctx
                    .fail(format!("cannot remove '{}': {}", operand, e))
                    .await;
            }
        }
        Ok(0)
    }
}

pub struct Cp;

#[async_trait]
impl Utility for Cp {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let (flags, operands) = split_flags(&args, &["-r", "-R", "-a"]);
        let recursive = !flags.is_empty();
        if operands.len() < 2 {
            return ctx.fail("missing file operand").await;
        }
        let (sources, dest) = operands.split_at(operands.len() - 1);
        let dest_path = ctx.path(dest[0]);
        let dest_is_dir = ctx
            .fs
            .stat(&dest_path)
            .await
            .map(|m| m.file_type.is_dir())
            .unwrap_or(false);
        if sources.len() > 1 && !dest_is_dir {
            return ctx.fail(format!("target '{}' is not a directory", dest[0])).await;
        }

        for source in sources {
            let src_path = ctx.path(source);
            let target = if dest_is_dir {
                let name = src_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                dest_path.join(name)
            } else {
                dest_path.clone()
            };
            let src_meta = match ctx.fs.stat(&src_path).await {
                Ok(meta) => meta,
                Err(e) => return ctx.fail(format!("cannot stat '{}': {}", source, e)).await,
            };
            let result = if src_meta.file_type.is_dir() {
                if !recursive {
                    return ctx
                        .fail(format!("-r not specified; omitting directory '{}'", source))
                        .await;
                }
                copy_tree(ctx, &src_path, &target).await
            } else {
                ctx.fs.copy(&src_path, &target).await
            };
            if let Err(e) = result {
                return ctx.fail(format!("cannot copy '{}': {}", source, e)).await;
            }
        }
        Ok(0)
    }
}

fn copy_tree<'a>(
    ctx: &'a UtilityContext<'_>,
    src: &'a std::path::Path,
    dst: &'a std::path::Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        ctx.fs.mkdir(dst, true).await?;
        for entry in ctx.fs.read_dir(src).await? {
            let child_src = src.join(&entry.name);
            let child_dst = dst.join(&entry.name);
            if entry.metadata.file_type.is_dir() {
                copy_tree(ctx, &child_src, &child_dst).await?;
            } else {
                ctx.fs.copy(&child_src, &child_dst).await?;
            }
        }
        Ok(())
    })
}

pub struct Mv;

#[async_trait]
impl Utility for Mv {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let operands: Vec<&str> = args
            .iter()
            .map(String::as_str)
            .filter(|a| *a != "-f")
            .collect();
        if operands.len() < 2 {
            return ctx.fail("missing file operand").await;
        }
        let (sources, dest) = operands.split_at(operands.len() - 1);
        let dest_path = ctx.path(dest[0]);
        let dest_is_dir = ctx
            .fs
            .stat(&dest_path)
            .await
            .map(|m| m.file_type.is_dir())
            .unwrap_or(false);
        if sources.len() > 1 && !dest_is_dir {
            return ctx.fail(format!("target '{}' is not a directory", dest[0])).await;
        }
        for source in sources {
            let src_path = ctx.path(source);
            let target = if dest_is_dir {
                let name = src_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                dest_path.join(name)
            } else {
                dest_path.clone()
            };
            if let Err(e) = ctx.fs.rename(&src_path, &target).await {
                return ctx.fail(format!("cannot move '{}': {}", source, e)).await;
            }
        }
        Ok(0)
    }
}

pub struct Touch;

#[async_trait]
impl Utility for Touch {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        if ctx.args().is_empty() {
            return ctx.fail("missing file operand").await;
        }
        for operand in ctx.args().to_vec() {
            let path = ctx.path(&operand);
            let result = if ctx.fs.exists(&path).await? {
                ctx.fs.utimes(&path, SystemTime::now()).await
            } else {
                ctx.fs.write_file(&path, b"").await
            };
            if let Err(e) = result {
                return ctx.fail(format!("cannot touch '{}': {}", operand, e)).await;
            }
        }
        Ok(0)
    }
}

pub struct Ln;

#[async_trait]
impl Utility for Ln {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let (flags, operands) = split_flags(&args, &["-s", "-f", "-sf", "-fs"]);
        let symbolic = flags.iter().any(|f| f.contains('s'));
        if operands.len() != 2 {
            return ctx.fail("expected source and link name").await;
        }
        let (target, link) = (operands[0], operands[1]);
        let link_path = ctx.path(link);
        if flags.iter().any(|f| f.contains('f')) && ctx.fs.exists(&link_path).await? {
            ctx.fs.unlink(&link_path).await.ok();
        }
        let result = if symbolic {
            // Symlink targets stay as written (possibly relative).
            ctx.fs.symlink(std::path::Path::new(target), &link_path).await
        } else {
            ctx.fs.hard_link(&ctx.path(target), &link_path).await
        };
        match result {
            Ok(()) => Ok(0),
            Err(e) => ctx.fail(format!("cannot link '{}': {}", link, e)).await,
        }
    }
}

pub struct Readlink;

#[async_trait]
impl Utility for Readlink {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        let (flags, operands) = split_flags(&args, &["-f"]);
        let canonical = flags.contains(&"-f");
        let operand = match operands.first() {
            Some(operand) => operand.to_string(),
            None => return ctx.fail("missing operand").await,
        };
        let path = ctx.path(&operand);
        let result = if canonical {
            ctx.fs.resolve(&path).await
        } else {
            ctx.fs.read_link(&path).await
        };
        match result {
            Ok(target) => {
                ctx.io
                    .stdout
                    .write_str(&format!("{}\n", target.to_string_lossy()))
                    .await?;
                Ok(0)
            }
            Err(_) => Ok(1),
        }
    }
}

pub struct Chmod;

#[async_trait]
impl Utility for Chmod {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let args = ctx.args().to_vec();
        if args.len() < 2 {
            return ctx.fail("missing operand").await;
        }
        let mode = match u32::from_str_radix(&args[0], 8) {
            Ok(mode) => mode,
            Err(_) => {
                return ctx
                    .fail(format!("invalid mode: '{}' (octal only)", args[0]))
                    .await
            }
        };
        for operand in &args[1..] {
            let path = ctx.path(operand);
            if let Err(e) = ctx.fs.chmod(&path, mode).await {
                return ctx
                    .fail(format!("changing permissions of '{}': {}", operand, e))
                    .await;
            }
        }
        Ok(0)
    }
}
