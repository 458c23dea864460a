//! `[[ ... ]]` conditional evaluation.
//!
//! Operand words are pre-expanded twice: once plainly (operand value) and
//! once in pattern position (`==`/`!=` right-hand sides match as globs,
//! quoted parts literally). File tests and comparison primitives are shared
//! with the `test`/`[` builtin.

use std::path::Path;
use std::sync::Arc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::expand::glob::match_glob;
use crate::fs::FileSystem;
use crate::parser::Word;

use super::{Interpreter, Output};

struct CondToken {
    text: String,
    pattern: String,
}

pub(super) async fn eval_cond(
    interp: &mut Interpreter,
    words: &[Word],
    stderr: &Output,
) -> Result<bool> {
    let mut tokens = Vec::with_capacity(words.len());
    for word in words {
        let text = interp.expand_word_single(word, stderr).await?;
        let pattern = interp.expand_word_pattern(word, stderr).await?;
        tokens.push(CondToken { text, pattern });
    }
    let mut parser = CondParser {
        tokens,
        pos: 0,
        fs: Arc::clone(&interp.fs),
        interp,
    };
    let value = parser.or_expr().await?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::Execution("syntax error in conditional".into()));
    }
    Ok(value)
}

struct CondParser<'a> {
    tokens: Vec<CondToken>,
    pos: usize,
    fs: Arc<dyn FileSystem>,
    interp: &'a mut Interpreter,
}

impl CondParser<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(|t| t.text.as_str())
    }

    fn next(&mut self) -> Option<&CondToken> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn or_expr<'a>(
        &'a mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let mut value = self.and_expr().await?;
            while self.peek() == Some("||") {
                self.pos += 1;
                let rhs = self.and_expr().await?;
                value = value || rhs;
            }
            Ok(value)
        })
    }

    async fn and_expr(&mut self) -> Result<bool> {
        let mut value = self.unary_expr().await?;
        while self.peek() == Some("&&") {
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
                    if self.peek() != Some(")") {
                        return Err(Error::Execution("expected `)'".into()));
                    }
                    self.pos += 1;
                    Ok(value)
                }
                _ => self.primary().await,
            }
        })
    }

    async fn primary(&mut self) -> Result<bool> {
        let first = self
            .next()
            .ok_or_else(|| Error::Execution("expected expression".into()))?;
        let first_text = first.text.clone();

        // Unary operators.
        if first_text.len() == 2 && first_text.starts_with('-') {
            let op = first_text.clone();
            if let Some(operand) = self.tokens.get(self.pos) {
                let operand_text = operand.text.clone();
                // `-n`/`-z`/`-v` are string tests; the rest touch the VFS.
                let consumed = match op.as_str() {
                    "-n" => Some(!operand_text.is_empty()),
                    "-z" => Some(operand_text.is_empty()),
                    "-v" => Some(self.interp.state.scopes.is_set(&operand_text)),
                    "-t" => Some(false),
                    _ => None,
                };
                if let Some(value) = consumed {
                    self.pos += 1;
                    return Ok(value);
                }
                let path = self.interp.state.absolute(&operand_text);
                if let Some(value) = file_test(&self.fs, &op, &path).await {
                    self.pos += 1;
                    return Ok(value);
                }
            }
        }

        // Binary operator?
        if let Some(op_tok) = self.tokens.get(self.pos) {
            let op = op_tok.text.clone();
            if is_binary_op(&op) {
                self.pos += 1;
                let rhs = self
                    .next()
                    .ok_or_else(|| Error::Execution(format!("{}: missing operand", op)))?;
                let rhs_text = rhs.text.clone();
                let rhs_pattern = rhs.pattern.clone();
                return binary_test(
                    &self.fs,
                    self.interp,
                    &first_text,
                    &op,
                    &rhs_text,
                    &rhs_pattern,
                )
                .await;
            }
        }

        // Lone word: true when non-empty.
        Ok(!first_text.is_empty())
    }
}

fn is_binary_op(op: &str) -> bool {
    matches!(
        op,
        "==" | "=" | "!=" | "=~" | "<" | ">" | "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge"
            | "-nt" | "-ot" | "-ef"
    )
}

async fn binary_test(
    fs: &Arc<dyn FileSystem>,
    interp: &Interpreter,
    lhs: &str,
    op: &str,
    rhs: &str,
    rhs_pattern: &str,
) -> Result<bool> {
    match op {
        "==" | "=" => Ok(match_glob(rhs_pattern, lhs)),
        "!=" => Ok(!match_glob(rhs_pattern, lhs)),
        "=~" => {
            let re = Regex::new(rhs_pattern)
                .map_err(|_| Error::Execution(format!("invalid regex: {}", rhs)))?;
            Ok(re.is_match(lhs))
        }
        "<" => Ok(lhs < rhs),
        ">" => Ok(lhs > rhs),
        "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" => {
            let a = parse_int(lhs)?;
            let b = parse_int(rhs)?;
            Ok(match op {
                "-eq" => a == b,
                "-ne" => a != b,
                "-lt" => a < b,
                "-le" => a <= b,
                "-gt" => a > b,
                _ => a >= b,
            })
        }
        "-nt" | "-ot" => {
            let a = fs.stat(&interp.state.absolute(lhs)).await.ok();
            let b = fs.stat(&interp.state.absolute(rhs)).await.ok();
            Ok(match (a, b) {
                (Some(a), Some(b)) => {
                    if op == "-nt" {
                        a.modified > b.modified
                    } else {
                        a.modified < b.modified
                    }
                }
                (Some(_), None) => op == "-nt",
                (None, Some(_)) => op == "-ot",
                (None, None) => false,
            })
        }
        "-ef" => {
            let a = fs.resolve(&interp.state.absolute(lhs)).await.ok();
            let b = fs.resolve(&interp.state.absolute(rhs)).await.ok();
            Ok(a.is_some() && a == b)
        }
        _ => Err(Error::Execution(format!("unknown operator: {}", op))),
    }
}

pub(crate) fn parse_int(text: &str) -> Result<i64> {
    crate::expand::arith::parse_literal(text.trim())
        .ok_or_else(|| Error::Execution(format!("{}: integer expression expected", text)))
}

/// Shared file tests for `[[`, `test` and `[`.
pub(crate) async fn file_test(fs: &Arc<dyn FileSystem>, op: &str, path: &Path) -> Option<bool> {
    let meta = fs.stat(path).await.ok();
    let lmeta = fs.lstat(path).await.ok();
    let value = match op {
        "-e" | "-a" => meta.is_some(),
        "-f" => meta.map(|m| m.file_type.is_file()).unwrap_or(false),
        "-d" => meta.map(|m| m.file_type.is_dir()).unwrap_or(false),
        "-s" => meta.map(|m| m.size > 0).unwrap_or(false),
        "-L" | "-h" => lmeta.map(|m| m.file_type.is_symlink()).unwrap_or(false),
        "-r" => meta.map(|m| m.mode & 0o444 != 0).unwrap_or(false),
        "-w" => meta.map(|m| m.mode & 0o222 != 0).unwrap_or(false),
        "-x" => meta.map(|m| m.mode & 0o111 != 0).unwrap_or(false),
        "-p" | "-S" | "-b" | "-c" | "-g" | "-u" | "-k" | "-O" | "-G" => false,
        _ => return None,
    };
    Some(value)
}
