//! sort and uniq utilities

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

async fn read_lines(ctx: &mut UtilityContext<'_>, files: &[String]) -> Result<std::result::Result<Vec<String>, String>> {
    let mut text = String::new();
    if files.is_empty() {
        text = ctx.io.stdin.read_to_string().await;
    } else {
        for file in files {
            if file == "-" {
                text.push_str(&ctx.io.stdin.read_to_string().await);
                continue;
            }
            let path = ctx.path(file);
            match ctx.fs.read_file(&path).await {
                Ok(content) => text.push_str(&String::from_utf8_lossy(&content)),
                Err(e) => return Ok(Err(format!("{}: {}", file, e))),
            }
        }
    }
    Ok(Ok(text.lines().map(str::to_string).collect()))
}

/// `sort [-r] [-n] [-u] [file...]`
pub struct Sort;

#[async_trait]
impl Utility for Sort {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut reverse = false;
        let mut numeric = false;
        let mut unique = false;
        let mut files = Vec::new();
        for arg in ctx.args() {
            match arg.as_str() {
                "-r" => reverse = true,
                "-n" => numeric = true,
                "-u" => unique = true,
                "-rn" | "-nr" => {
                    reverse = true;
                    numeric = true;
                }
                other => files.push(other.to_string()),
            }
        }

        let mut lines = match read_lines(ctx, &files).await? {
            Ok(lines) => lines,
            Err(message) => return ctx.fail(message).await,
        };

        if numeric {
            lines.sort_by(|a, b| {
                let na = leading_number(a);
                let nb = leading_number(b);
                na.partial_cmp(&nb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.cmp(b))
            });
        } else {
            lines.sort();
        }
        if reverse {
            lines.reverse();
        }
        if unique {
            lines.dedup();
        }

        let mut out = String::new();
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}

fn leading_number(line: &str) -> f64 {
    let trimmed = line.trim_start();
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-'))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    trimmed[..end].parse().unwrap_or(0.0)
}

/// `uniq [-c] [-d] [-u] [file]` — adjacent duplicate filtering.
pub struct Uniq;

#[async_trait]
impl Utility for Uniq {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut count = false;
        let mut dups_only = false;
        let mut uniques_only = false;
        let mut files = Vec::new();
        for arg in ctx.args() {
            match arg.as_str() {
                "-c" => count = true,
                "-d" => dups_only = true,
                "-u" => uniques_only = true,
                other => files.push(other.to_string()),
            }
        }

        let lines = match read_lines(ctx, &files).await? {
            Ok(lines) => lines,
            Err(message) => return ctx.fail(message).await,
        };

        let mut groups: Vec<(String, usize)> = Vec::new();
        for line in lines {
            match groups.last_mut() {
                Some((prev, n)) if *prev == line => *n += 1,
                _ => groups.push((line, 1)),
            }
        }

        let mut out = String::new();
        for (line, n) in groups {
            if dups_only && n < 2 {
                continue;
            }
            if uniques_only && n > 1 {
                continue;
            }
            if count {
                out.push_str(&format!("{:>7} {}\n", n, line));
            } else {
                out.push_str(&line);
                out.push('\n');
            }
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}
