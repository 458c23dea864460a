//! ls utility

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;
use crate::fs::{FileType, Metadata};

/// `ls [-a] [-l] [-1] [path...]`
pub struct Ls;

#[async_trait]
impl Utility for Ls {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut all = false;
        let mut long = false;
        let mut operands = Vec::new();
        for arg in ctx.args() {
            match arg.as_str() {
                "-a" => all = true,
                "-l" => long = true,
                "-la" | "-al" => {
                    all = true;
                    long = true;
                }
                "-1" => {}
                other => operands.push(other.to_string()),
            }
        }
        if operands.is_empty() {
            operands.push(".".to_string());
        }

        let mut out = String::new();
        let show_headers = operands.len() > 1;
        for (i, operand) in operands.iter().enumerate() {
            let path = if operand == "." {
                ctx.cwd.clone()
            } else {
                ctx.path(operand)
            };
            let meta = match ctx.fs.stat(&path).await {
                Ok(meta) => meta,
                Err(e) => {
                    return ctx
                        .fail(format!("cannot access '{}': {}", operand, e))
                        .await
                }
            };
            if show_headers {
                if i > 0 {
                    out.push('\n');
                }
                out.push_str(&format!("{}:\n", operand));
            }
            if meta.file_type.is_dir() {
                let mut entries = ctx.fs.read_dir(&path).await?;
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                if all {
                    out.push_str(&format_entry(".", &meta, long));
                    out.push_str(&format_entry("..", &meta, long));
                }
                for entry in entries {
                    if !all && entry.name.starts_with('.') {
                        continue;
                    }
                    out.push_str(&format_entry(&entry.name, &entry.metadata, long));
                }
            } else {
                out.push_str(&format_entry(operand, &meta, long));
            }
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}

fn format_entry(name: &str, meta: &Metadata, long: bool) -> String {
    if !long {
        return format!("{}\n", name);
    }
    let kind = match meta.file_type {
        FileType::Directory => 'd',
        FileType::Symlink => 'l',
        FileType::File => '-',
    };
    format!(
        "{}{} {} {} {} {:>8} {}\n",
        kind,
        mode_string(meta.mode),
        meta.nlink,
        meta.uid,
        meta.gid,
        meta.size,
        name
    )
}

fn mode_string(mode: u32) -> String {
    let mut out = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 7;
        out.push(if bits & 4 != 0 { 'r' } else { '-' });
        out.push(if bits & 2 != 0 { 'w' } else { '-' });
        out.push(if bits & 1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_formatting() {
        assert_eq!(mode_string(0o755), "rwxr-xr-x");
        assert_eq!(mode_string(0o644), "rw-r--r--");
        assert_eq!(mode_string(0o000), "---------");
    }
}
