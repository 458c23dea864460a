//! `test` / `[` builtin.
//!
//! Classic POSIX test over already-expanded argv: string tests, integer
//! comparisons, file tests, `!`, `-a`/`-o` and parentheses. Unlike `[[`,
//! `=` compares strings literally (no glob matching).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::interpreter::cond_file_test;

pub struct Test;

#[async_trait]
impl Builtin for Test {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let mut args: Vec<String> = ctx.args().to_vec();
        if ctx.argv[0] == "[" {
            match args.pop() {
                Some(close) if close == "]" => {}
                _ => return ctx.error("missing `]'").await,
            }
        }
        let cwd = ctx.state.cwd.clone();
        match eval_test_args(ctx.fs, &cwd, &args).await {
            Ok(true) => Ok(0),
            Ok(false) => Ok(1),
            Err(e) => {
                ctx.io
                    .stderr
                    .write_str(&format!("{}: {}\n", ctx.argv[0], e))
                    .await?;
                Ok(2)
            }
        }
    }
}

/// Evaluate a `test` expression over expanded arguments.
pub(crate) async fn eval_test_args(
    fs: &Arc<dyn FileSystem>,
    cwd: &Path,
    args: &[String],
) -> Result<bool> {
    let mut parser = TestParser {
        fs: Arc::clone(fs),
        cwd: cwd.to_path_buf(),
        args: args.to_vec(),
        pos: 0,
    };
    if args.is_empty() {
        return Ok(false);
    }
    let value = parser.or_expr().await?;
    if parser.pos != parser.args.len() {
        return Err(Error::Execution("too many arguments".into()));
    }
    Ok(value)
}

struct TestParser {
    fs: Arc<dyn FileSystem>,
    cwd: std::path::PathBuf,
    args: Vec<String>,
    pos: usize,
}

impl TestParser {
    fn peek(&self) -> Option<&str> {
        self.args.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<String> {
        let arg = self.args.get(self.pos).cloned();
        if arg.is_some() {
            self.pos += 1;
        }
        arg
    }

    fn abs(&self, operand: &str) -> std::path::PathBuf {
        if operand.starts_with('/') {
            std::path::PathBuf::from(operand)
        } else {
            self.cwd.join(operand)
        }
    }

    fn or_expr<'a>(
        &'a mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let mut value = self.and_expr().await?;
            while self.peek() == Some("-o") {
                self.pos += 1;
                let rhs = self.and_expr().await?;
                value = value || rhs;
            }
            Ok(value)
        })
    }

    async fn and_expr(&mut self) -> Result<bool> {
        let mut value = self.unary_expr().await?;
        while self.peek() == Some("-a") {
            self.pos += 1;
            let rhs = self.unary_expr().await?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn unary_expr<'a>(
        &'a mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            match self.peek() {
                Some("!") => {
                    self.pos += 1;
                    Ok(!self.unary_expr().await?)
                }
                Some("(") => {
                    self.pos += 1;
                    let value = self.or_expr().await?;
                    if self.next().as_deref() != Some(")") {
                        return Err(Error::Execution("expected `)'".into()));
                    }
                    Ok(value)
                }
                _ => self.primary().await,
            }
        })
    }

    async fn primary(&mut self) -> Result<bool> {
        let first = self
            .next()
            .ok_or_else(|| Error::Execution("argument expected".into()))?;

        // Unary operator with operand — unless the next token is a binary
        // operator, in which case `first` is its left operand (3-arg rule).
        if first.len() == 2 && first.starts_with('-') && self.peek().is_some() {
            let will_be_binary = self.peek().map(is_binary).unwrap_or(false);
            if !will_be_binary {
                let operand = self.next().expect("peeked");
                match first.as_str() {
                    "-n" => return Ok(!operand.is_empty()),
                    "-z" => return Ok(operand.is_empty()),
                    "-t" => return Ok(false),
                    op => {
                        let path = self.abs(&operand);
                        if let Some(value) = cond_file_test(&self.fs, op, &path).await {
                            return Ok(value);
                        }
                        return Err(Error::Execution(format!("{}: unary operator expected", op)));
                    }
                }
            }
        }

        // Binary operator.
        if let Some(op) = self.peek().map(str::to_string) {
            if is_binary(&op) {
                self.pos += 1;
                let rhs = self
                    .next()
                    .ok_or_else(|| Error::Execution(format!("{}: argument expected", op)))?;
                return binary(&first, &op, &rhs);
            }
        }

        Ok(!first.is_empty())
    }
}

fn is_binary(op: &str) -> bool {
    matches!(
        op,
        "=" | "==" | "!=" | "<" | ">" | "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge"
    )
}

fn binary(lhs: &str, op: &str, rhs: &str) -> Result<bool> {
    match op {
        "=" | "==" => Ok(lhs == rhs),
        "!=" => Ok(lhs != rhs),
        "<" => Ok(lhs < rhs),
        ">" => Ok(lhs > rhs),
        _ => {
            let a = crate::interpreter::cond_parse_int(lhs)?;
            let b = crate::interpreter::cond_parse_int(rhs)?;
            Ok(match op {
                "-eq" => a == b,
                "-ne" => a != b,
                "-lt" => a < b,
                "-le" => a <= b,
                "-gt" => a > b,
                _ => a >= b,
            })
        }
    }
}
