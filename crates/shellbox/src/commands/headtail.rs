//! head and tail utilities

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

async fn gather(ctx: &mut UtilityContext<'_>, files: &[String]) -> Result<std::result::Result<String, String>> {
    if files.is_empty() {
        return Ok(Ok(ctx.io.stdin.read_to_string().await));
    }
    let mut text = String::new();
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
    Ok(Ok(text))
}

fn parse_count(args: &[String]) -> (usize, Vec<String>) {
    let mut count = 10;
    let mut files = Vec::new();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-n" => {
                if let Some(n) = iter.next() {
                    count = n.trim_start_matches('-').parse().unwrap_or(10);
                }
            }
            a if a.starts_with("-n") => {
                count = a[2..].parse().unwrap_or(10);
            }
            a if a.starts_with('-') && a[1..].chars().all(|c| c.is_ascii_digit()) => {
                count = a[1..].parse().unwrap_or(10);
            }
            a => files.push(a.to_string()),
        }
    }
    (count, files)
}

pub struct Head;

#[async_trait]
impl Utility for Head {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let (count, files) = parse_count(ctx.args());

        // Stdin is consumed lazily: stop reading once enough lines arrived,
        // so an unbounded producer upstream sees a broken pipe.
        if files.is_empty() {
            let mut taken = 0;
            while taken < count {
                match ctx.io.stdin.read_line().await {
                    Some(line) => {
                        ctx.io.stdout.write_str(&format!("{}\n", line)).await?;
                        taken += 1;
                    }
                    None => break,
                }
            }
            return Ok(0);
        }

        let text = match gather(ctx, &files).await? {
            Ok(text) => text,
            Err(message) => return ctx.fail(message).await,
        };
        let mut out = String::new();
        for line in text.lines().take(count) {
            out.push_str(line);
            out.push('\n');
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}

pub struct Tail;

#[async_trait]
impl Utility for Tail {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let (count, files) = parse_count(ctx.args());
        let text = match gather(ctx, &files).await? {
            Ok(text) => text,
            Err(message) => return ctx.fail(message).await,
        };
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(count);
        let mut out = String::new();
        for line in &lines[start..] {
            out.push_str(line);
            out.push('\n');
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}
