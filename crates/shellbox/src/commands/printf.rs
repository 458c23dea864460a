//! printf utility
//!
//! Supports the common directives: `%s %d %i %u %x %X %o %c %% %b` with
//! width/precision/zero-pad/left-align flags. The format string is reused
//! until all arguments are consumed, as POSIX requires.

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

pub struct Printf;

#[async_trait]
impl Utility for Printf {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let format = match ctx.args().first() {
            Some(format) => format.clone(),
            None => return ctx.fail("usage: printf format [arguments]").await,
        };
        let args: Vec<String> = ctx.args()[1..].to_vec();

        let mut out = String::new();
        let mut index = 0;
        loop {
            let consumed = render(&format, &args, &mut index, &mut out);
            if index >= args.len() || consumed == 0 {
                break;
            }
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}

/// Render the format once; returns how many arguments were consumed.
fn render(format: &str, args: &[String], index: &mut usize, out: &mut String) -> usize {
    let start = *index;
    let chars: Vec<char> = format.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                let c = match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' => '\\',
                    '0' => '\0',
                    other => {
                        out.push('\\');
                        other
                    }
                };
                out.push(c);
                i += 2;
            }
            '%' if i + 1 < chars.len() && chars[i + 1] == '%' => {
                out.push('%');
                i += 2;
            }
            '%' => {
                // %[flags][width][.precision]directive
                let mut j = i + 1;
                let mut left = false;
                let mut zero = false;
                while j < chars.len() && matches!(chars[j], '-' | '0' | '+' | ' ') {
                    match chars[j] {
                        '-' => left = true,
                        '0' => zero = true,
                        _ => {}
                    }
                    j += 1;
                }
                let mut width = String::new();
                while j < chars.len() && chars[j].is_ascii_digit() {
                    width.push(chars[j]);
                    j += 1;
                }
                let mut precision = String::new();
                if j < chars.len() && chars[j] == '.' {
                    j += 1;
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        precision.push(chars[j]);
                        j += 1;
                    }
                }
                let directive = match chars.get(j) {
                    Some(&d) => d,
                    None => {
                        out.push('%');
                        break;
                    }
                };
                let arg = args.get(*index).cloned().unwrap_or_default();
                if matches!(directive, 's' | 'd' | 'i' | 'u' | 'x' | 'X' | 'o' | 'c' | 'b') {
                    *index += 1;
                }
                let width: usize = width.parse().unwrap_or(0);
                let rendered = match directive {
                    's' => {
                        let mut s = arg;
                        if let Ok(p) = precision.parse::<usize>() {
                            s = s.chars().take(p).collect();
                        }
                        s
                    }
                    'b' => crate::commands::echo_escapes(&arg),
                    'c' => arg.chars().next().map(|c| c.to_string()).unwrap_or_default(),
                    'd' | 'i' => parse_i64(&arg).to_string(),
                    'u' => (parse_i64(&arg) as u64).to_string(),
                    'x' => format!("{:x}", parse_i64(&arg)),
                    'X' => format!("{:X}", parse_i64(&arg)),
                    'o' => format!("{:o}", parse_i64(&arg)),
                    other => {
                        out.push('%');
                        out.push(other);
                        i = j + 1;
                        continue;
                    }
                };
                out.push_str(&pad(&rendered, width, left, zero && !left));
                i = j + 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    *index - start
}

fn parse_i64(text: &str) -> i64 {
    crate::expand::arith::parse_literal(text.trim()).unwrap_or(0)
}

fn pad(text: &str, width: usize, left: bool, zero: bool) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let fill = width - len;
    if left {
        format!("{}{}", text, " ".repeat(fill))
    } else if zero {
        // Zero-padding keeps a leading sign in front.
        if let Some(rest) = text.strip_prefix('-') {
            format!("-{}{}", "0".repeat(fill), rest)
        } else {
            format!("{}{}", "0".repeat(fill), text)
        }
    } else {
        format!("{}{}", " ".repeat(fill), text)
    }
}
