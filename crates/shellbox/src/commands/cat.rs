//! cat utility

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

/// `cat [-n] [file...]` — `-` and no operands read stdin.
pub struct Cat;

#[async_trait]
impl Utility for Cat {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut number = false;
        let mut files: Vec<String> = Vec::new();
        for arg in ctx.args() {
            match arg.as_str() {
                "-n" => number = true,
                other => files.push(other.to_string()),
            }
        }
        if files.is_empty() {
            files.push("-".to_string());
        }

        let mut output = Vec::new();
        for file in &files {
            if file == "-" {
                output.extend(ctx.io.stdin.read_to_end().await);
            } else {
                let path = ctx.path(file);
                match ctx.fs.read_file(&path).await {
                    Ok(content) => output.extend(content),
                    Err(e) => return ctx.fail(format!("{}: {}", file, e)).await,
                }
            }
        }

        if number {
            let text = String::from_utf8_lossy(&output);
            let mut numbered = String::new();
            for (i, line) in text.lines().enumerate() {
                numbered.push_str(&format!("{:>6}\t{}\n", i + 1, line));
            }
            ctx.io.stdout.write_str(&numbered).await?;
        } else {
            ctx.io.stdout.write(&output).await?;
        }
        Ok(0)
    }
}
