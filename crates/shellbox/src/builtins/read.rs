//! Input builtins: `read`, `mapfile`/`readarray`

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::Value;

/// `read [-r] [-d delim] name...` — one line from stdin, IFS-split across
/// the named variables (extra fields join into the last).
pub struct Read;

#[async_trait]
impl Builtin for Read {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let mut names: Vec<String> = Vec::new();
        let mut raw = false;
        let mut args = ctx.args().iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-r" => raw = true,
                "-d" => {
                    let _ = args.next();
                }
                name => names.push(name.to_string()),
            }
        }
        if names.is_empty() {
            names.push("REPLY".to_string());
        }

        let line = match ctx.io.stdin.read_line().await {
            Some(line) => line,
            None => {
                for name in &names {
                    ctx.state.scopes.set_scalar(name, "")?;
                }
                return Ok(1);
            }
        };
        let line = if raw {
            line
        } else {
            // Without -r, a backslash escapes the next character.
            let mut out = String::with_capacity(line.len());
            let mut chars = line.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(n) = chars.next() {
                        out.push(n);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        };

        let ifs = ctx.state.ifs();
        let mut fields = split_line(&line, &ifs, names.len());
        for name in &names {
            let value = if fields.is_empty() {
                String::new()
            } else {
                fields.remove(0)
            };
            ctx.state.scopes.set_scalar(name, value)?;
        }
        Ok(0)
    }
}

/// Split for `read`: at most `max` fields, the last taking the remainder.
fn split_line(line: &str, ifs: &str, max: usize) -> Vec<String> {
    if max <= 1 {
        return vec![line.trim_matches(|c| ifs.contains(c) && char::is_whitespace(c)).to_string()];
    }
    let seps: Vec<char> = ifs.chars().collect();
    let mut fields = Vec::new();
    let mut rest = line.trim_start_matches(|c| seps.contains(&c) && c.is_whitespace());
    while fields.len() + 1 < max {
        match rest.find(|c| seps.contains(&c)) {
            Some(pos) => {
                fields.push(rest[..pos].to_string());
                rest = rest[pos..].trim_start_matches(|c| seps.contains(&c));
            }
            None => break,
        }
    }
    if !rest.is_empty() || fields.is_empty() {
        fields.push(
            rest.trim_end_matches(|c: char| seps.contains(&c) && c.is_whitespace())
                .to_string(),
        );
    }
    fields
}

/// `mapfile [-t] name` — read all stdin lines into an indexed array.
/// (`-t` is accepted; lines are stored without terminators either way.)
pub struct Mapfile;

#[async_trait]
impl Builtin for Mapfile {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<i32> {
        let mut name = "MAPFILE".to_string();
        for arg in ctx.args() {
            match arg.as_str() {
                "-t" => {}
                other if !other.starts_with('-') => name = other.to_string(),
                _ => {}
            }
        }

        let mut map = BTreeMap::new();
        let mut index: u64 = 0;
        while let Some(line) = ctx.io.stdin.read_line().await {
            map.insert(index, line);
            index += 1;
        }
        ctx.state.scopes.set_value(&name, Value::Indexed(map))?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_line_last_field_takes_remainder() {
        assert_eq!(
            split_line("a b c d", " \t\n", 2),
            vec!["a".to_string(), "b c d".to_string()]
        );
    }

    #[test]
    fn split_line_single_name_trims_ws() {
        assert_eq!(split_line("  hello  ", " \t\n", 1), vec!["hello".to_string()]);
    }
}
