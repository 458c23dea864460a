//! cut and tr utilities

use async_trait::async_trait;

use crate::builtins::{Utility, UtilityContext};
use crate::error::Result;

/// `tr [-d] [-s] set1 [set2]` — character translation over stdin.
pub struct Tr;

#[async_trait]
impl Utility for Tr {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut delete = false;
        let mut squeeze = false;
        let mut sets: Vec<String> = Vec::new();
        for arg in ctx.args() {
            match arg.as_str() {
                "-d" => delete = true,
                "-s" => squeeze = true,
                "-ds" | "-sd" => {
                    delete = true;
                    squeeze = true;
                }
                other => sets.push(other.to_string()),
            }
        }
        if sets.is_empty() {
            return ctx.fail("missing operand").await;
        }

        let set1 = expand_set(&sets[0]);
        let set2 = sets.get(1).map(|s| expand_set(s)).unwrap_or_default();
        let input = ctx.io.stdin.read_to_string().await;

        let mut out = String::with_capacity(input.len());
        let mut last_emitted: Option<char> = None;
        for c in input.chars() {
            let pos = set1.iter().position(|&s| s == c);
            let mapped = match pos {
                Some(_) if delete => None,
                Some(i) => {
                    let target = set2
                        .get(i)
                        .or_else(|| set2.last())
                        .copied()
                        .unwrap_or(c);
                    Some(target)
                }
                None => Some(c),
            };
            if let Some(m) = mapped {
                let in_squeeze_set = if delete {
                    set2.contains(&m)
                } else {
                    set1.contains(&c) || set2.contains(&m)
                };
                if squeeze && in_squeeze_set && last_emitted == Some(m) {
                    continue;
                }
                out.push(m);
                last_emitted = Some(m);
            }
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}

/// Expand a tr set: ranges `a-z`, classes `[:alpha:]`, escapes.
fn expand_set(set: &str) -> Vec<char> {
    let mut out = Vec::new();
    let chars: Vec<char> = set.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '[' && chars.get(i + 1) == Some(&':') {
            let close = (i + 2..chars.len().saturating_sub(1))
                .find(|&j| chars[j] == ':' && chars[j + 1] == ']');
            if let Some(close) = close {
                let class: String = chars[i + 2..close].iter().collect();
                out.extend(class_chars(&class));
                i = close + 2;
                continue;
            }
        }
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(match chars[i + 1] {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            i += 2;
            continue;
        }
        if i + 2 < chars.len() && chars[i + 1] == '-' && chars[i + 2] >= chars[i] {
            let (a, b) = (chars[i] as u32, chars[i + 2] as u32);
            for code in a..=b {
                if let Some(c) = char::from_u32(code) {
                    out.push(c);
                }
            }
            i += 3;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn class_chars(class: &str) -> Vec<char> {
    match class {
        "lower" => ('a'..='z').collect(),
        "upper" => ('A'..='Z').collect(),
        "digit" => ('0'..='9').collect(),
        "alpha" => ('a'..='z').chain('A'..='Z').collect(),
        "alnum" => ('a'..='z').chain('A'..='Z').chain('0'..='9').collect(),
        "space" => vec![' ', '\t', '\n', '\r', '\x0b', '\x0c'],
        _ => Vec::new(),
    }
}

/// `cut -d DELIM -f LIST` or `cut -c LIST`.
pub struct Cut;

#[async_trait]
impl Utility for Cut {
    async fn invoke(&self, ctx: &mut UtilityContext<'_>) -> Result<i32> {
        let mut delim = '\t';
        let mut fields: Option<String> = None;
        let mut chars_spec: Option<String> = None;
        let mut files = Vec::new();

        let args = ctx.args().to_vec();
        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-d" => {
                    if let Some(d) = iter.next() {
                        delim = d.chars().next().unwrap_or('\t');
                    }
                }
                "-f" => fields = iter.next().cloned(),
                "-c" => chars_spec = iter.next().cloned(),
                a if a.starts_with("-d") => delim = a[2..].chars().next().unwrap_or('\t'),
                a if a.starts_with("-f") => fields = Some(a[2..].to_string()),
                a if a.starts_with("-c") => chars_spec = Some(a[2..].to_string()),
                a => files.push(a.to_string()),
            }
        }

        let spec = match fields.as_ref().or(chars_spec.as_ref()) {
            Some(spec) => parse_list(spec),
            None => return ctx.fail("you must specify a list of fields or characters").await,
        };

        let mut input = String::new();
        if files.is_empty() {
            input = ctx.io.stdin.read_to_string().await;
        } else {
            for file in &files {
                let path = ctx.path(file);
                match ctx.fs.read_file(&path).await {
                    Ok(content) => input.push_str(&String::from_utf8_lossy(&content)),
                    Err(e) => return ctx.fail(format!("{}: {}", file, e)).await,
                }
            }
        }

        let mut out = String::new();
        for line in input.lines() {
            if fields.is_some() {
                if !line.contains(delim) {
                    out.push_str(line);
                } else {
                    let parts: Vec<&str> = line.split(delim).collect();
                    let selected: Vec<&str> = spec
                        .iter()
                        .filter_map(|&(lo, hi)| {
                            let hi = hi.min(parts.len());
                            if lo <= hi {
                                Some(parts[lo - 1..hi].to_vec())
                            } else {
                                None
                            }
                        })
                        .flatten()
                        .collect();
                    out.push_str(&selected.join(&delim.to_string()));
                }
            } else {
                let chars: Vec<char> = line.chars().collect();
                for &(lo, hi) in &spec {
                    let hi = hi.min(chars.len());
                    if lo <= hi {
                        out.extend(&chars[lo - 1..hi]);
                    }
                }
            }
            out.push('\n');
        }
        ctx.io.stdout.write_str(&out).await?;
        Ok(0)
    }
}

/// Parse `1,3-5,7-` into inclusive 1-based ranges.
fn parse_list(spec: &str) -> Vec<(usize, usize)> {
    spec.split(',')
        .filter_map(|piece| {
            if let Some((lo, hi)) = piece.split_once('-') {
                let lo = lo.parse().unwrap_or(1);
                let hi = if hi.is_empty() {
                    usize::MAX
                } else {
                    hi.parse().unwrap_or(lo)
                };
                Some((lo.max(1), hi))
            } else {
                let n: usize = piece.parse().ok()?;
                Some((n.max(1), n))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_expansion() {
        assert_eq!(expand_set("a-d"), vec!['a', 'b', 'c', 'd']);
        assert_eq!(expand_set("\\n"), vec!['\n']);
        assert!(expand_set("[:digit:]").contains(&'5'));
    }

    #[test]
    fn list_parsing() {
        assert_eq!(parse_list("1,3-5"), vec![(1, 1), (3, 5)]);
        assert_eq!(parse_list("2-"), vec![(2, usize::MAX)]);
    }
}
