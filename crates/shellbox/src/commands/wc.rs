//! wc utility

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

/// `wc [-l] [-w] [-c] [file...]`
pub struct Wc;

#[async_trait]
impl Utility for Wc {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut show_lines = false;
        let mut show_words = false;
        let mut show_bytes = false;
        let mut files = Vec::new();
        for arg in ctx.args() {
            match arg.as_str() {
                "-l" => show_lines = true,
                "-w" => show_words = true,
                "-c" | "-m" => show_bytes = true,
                other => files.push(other.to_string()),
            }
        }
        if !show_lines && !show_words && !show_bytes {
            show_lines = true;
            show_words = true;
            show_bytes = true;
        }

        let mut out = String::new();
        let mut totals = (0usize, 0usize, 0usize);
        let multiple = files.len() > 1;

        let inputs: Vec<(String, Vec<u8>)> = if files.is_empty() {
            vec![(String::new(), ctx.io.stdin.read_to_end().await)]
        } else {
            let mut inputs = Vec::new();
            for file in &files {
                let content = if file == "-" {
                    ctx.io.stdin.read_to_end().await
                } else {
                    match ctx.fs.read_file(&ctx.path(file)).await {
                        Ok(content) => content,
                        Err(e) => return ctx.fail(format!("{}: {}", file, e)).await,
                    }
                };
                inputs.push((file.clone(), content));
            }
            inputs
        };

        for (name, content) in &inputs {
            let text = String::from_utf8_lossy(content);
            let lines = text.matches('\n').count();
            let words = text.split_whitespace().count();
            let bytes = content.len();
            totals.0 += lines;
            totals.1 += words;
            totals.2 += bytes;
            out.push_str(&format_counts(
                lines, words, bytes, show_lines, show_words, show_bytes,
            ));
            if !name.is_empty() {
                out.push(' ');
                out.push_str(name);
            }
            out.push('\n');
        }
        if multiple {
            out.push_str(&format_counts(
                totals.0, totals.1, totals.2, show_lines, show_words, show_bytes,
            ));
            out.push_str(" total\n");
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}

fn format_counts(
    lines: usize,
    words: usize,
    bytes: usize,
    show_lines: bool,
    show_words: bool,
    show_bytes: bool,
) -> String {
    let mut parts = Vec::new();
    if show_lines {
        parts.push(format!("{:>7}", lines));
    }
    if show_words {
        parts.push(format!("{:>7}", words));
    }
    if show_bytes {
        parts.push(format!("{:>7}", bytes));
    }
    // A single selected count prints bare, the classic wc -l pipeline shape.
    if parts.len() == 1 {
        parts[0].trim_start().to_string()
    } else {
        parts.join("")
    }
}
