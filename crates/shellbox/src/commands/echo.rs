//! echo utility

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

/// `echo [-n] [-e] args...`
pub struct Echo;

#[async_trait]
impl Utility for Echo {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut newline = true;
        let mut escapes = false;
        let mut args: &[String] = ctx.args();

        // Flag parsing stops at the first non-flag word.
        while let Some(first) = args.first() {
            match first.as_str() {
                "-n" => newline = false,
                "-e" => escapes = true,
                "-E" => escapes = false,
                "-ne" | "-en" => {
                    newline = false;
                    escapes = true;
                }
                _ => break,
            }
            args = &args[1..];
        }

        let mut text = args.join(" ");
        if escapes {
            text = interpret_escapes(&text);
        }
        if newline {
            text.push('\n');
        }
        ctx.io.stdout.write_str(&text).await?;
        Ok(0)
    }
}

pub(crate) fn interpret_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('e') => out.push('\x1b'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('\\') => out.push('\\'),
            Some('0') => out.push('\0'),
            // `\c` suppresses everything after it.
            Some('c') => return out,
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes() {
        assert_eq!(interpret_escapes("a\\tb\\n"), "a\tb\n");
        assert_eq!(interpret_escapes("x\\cy"), "x");
        assert_eq!(interpret_escapes("\\q"), "\\q");
    }
}
