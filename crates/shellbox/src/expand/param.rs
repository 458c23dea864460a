//! Parameter and variable expansion: `$name`, `${name}` and the operator
//! forms. Array references produce multiple fields; everything else reduces
//! to a single segment.

use crate::error::{Error, Result};
use crate::interpreter::{Interpreter, Output, Value};
use crate::parser::{ParamExp, ParamOp};

use super::glob;
use super::{Piece, Segment};

/// How a parameter reference resolves before its operator applies.
#[derive(Debug, Clone)]
enum BaseVal {
    Unset,
    Single(String),
    /// `$@`/`${a[@]}` (`star` false) or `$*`/`${a[*]}` (`star` true).
    Multi(Vec<String>, bool),
}

impl Interpreter {
    pub(crate) async fn expand_param(
        &mut self,
        exp: &ParamExp,
        quoted: bool,
        stderr: &Output,
    ) -> Result<Vec<Piece>> {
        let base = self.resolve_base(exp, stderr).await?;
        let base = self.apply_op(exp, base, quoted, stderr).await?;
        Ok(self.to_pieces(base, quoted))
    }

    async fn resolve_base(&mut self, exp: &ParamExp, stderr: &Output) -> Result<BaseVal> {
        let name = exp.name.as_str();
        match name {
            "@" => return Ok(BaseVal::Multi(self.state.positional.clone(), false)),
            "*" => return Ok(BaseVal::Multi(self.state.positional.clone(), true)),
            "#" => return Ok(BaseVal::Single(self.state.positional.len().to_string())),
            "?" => return Ok(BaseVal::Single(self.state.last_status.to_string())),
            "$" => return Ok(BaseVal::Single("1".to_string())),
            "!" => {
                return Ok(match self.state.last_background {
                    Some(id) => BaseVal::Single(id.to_string()),
                    None => BaseVal::Single(String::new()),
                })
            }
            "-" => {
                let mut flags = String::new();
                if self.state.options.errexit {
                    flags.push('e');
                }
                if self.state.options.noglob {
                    flags.push('f');
                }
                if self.state.options.nounset {
                    flags.push('u');
                }
                if self.state.options.xtrace {
                    flags.push('x');
                }
                return Ok(BaseVal::Single(flags));
            }
            "0" => return Ok(BaseVal::Single(self.state.script_name.clone())),
            _ => {}
        }

        if name.chars().all(|c| c.is_ascii_digit()) {
            let n: usize = name.parse().unwrap_or(0);
            return Ok(match self.state.positional.get(n.saturating_sub(1)) {
                Some(v) if n >= 1 => BaseVal::Single(v.clone()),
                _ => BaseVal::Unset,
            });
        }

        if name == "RANDOM" {
            return Ok(BaseVal::Single(self.next_random().to_string()));
        }

        let var = match self.state.scopes.get(name) {
            Some(var) => var.value.clone(),
            None => return Ok(BaseVal::Unset),
        };

        match &exp.index {
            None => Ok(BaseVal::Single(var.as_scalar())),
            Some(index) if index == "@" => Ok(BaseVal::Multi(var.elements(), false)),
            Some(index) if index == "*" => Ok(BaseVal::Multi(var.elements(), true)),
            Some(index) => match &var {
                Value::Assoc(map) => {
                    let key = self.expand_string(index, stderr).await?;
                    Ok(match map.get(&key) {
                        Some(v) => BaseVal::Single(v.clone()),
                        None => BaseVal::Unset,
                    })
                }
                Value::Indexed(map) => {
                    let idx = self.eval_arith(index, stderr).await?;
                    let len = map.keys().max().map(|k| k + 1).unwrap_or(0) as i64;
                    let idx = if idx < 0 { len + idx } else { idx };
                    if idx < 0 {
                        return Ok(BaseVal::Unset);
                    }
                    Ok(match map.get(&(idx as u64)) {
                        Some(v) => BaseVal::Single(v.clone()),
                        None => BaseVal::Unset,
                    })
                }
                Value::Scalar(s) => {
                    let idx = self.eval_arith(index, stderr).await?;
                    Ok(if idx == 0 {
                        BaseVal::Single(s.clone())
                    } else {
                        BaseVal::Unset
                    })
                }
            },
        }
    }

    async fn apply_op(
        &mut self,
        exp: &ParamExp,
        base: BaseVal,
        quoted: bool,
        stderr: &Output,
    ) -> Result<BaseVal> {
        let name = &exp.name;
        match &exp.op {
            ParamOp::None => self.plain_value(name, base),
            ParamOp::Length => Ok(BaseVal::Single(match base {
                BaseVal::Unset => {
                    if self.state.options.nounset {
                        return Err(unbound(name));
                    }
                    "0".to_string()
                }
                BaseVal::Single(s) => s.chars().count().to_string(),
                BaseVal::Multi(items, _) => items.len().to_string(),
            })),
            ParamOp::Default { word, colon } => {
                if self.needs_default(&base, *colon) {
                    let text = self.expand_operand(word, false, stderr).await?;
                    Ok(BaseVal::Single(text))
                } else {
                    Ok(base)
                }
            }
            ParamOp::Assign { word, colon } => {
                if self.needs_default(&base, *colon) {
                    let text = self.expand_operand(word, false, stderr).await?;
                    self.state.scopes.set_scalar(name, text.clone())?;
                    Ok(BaseVal::Single(text))
                } else {
                    Ok(base)
                }
            }
            ParamOp::Alt { word, colon } => {
                if self.needs_default(&base, *colon) {
                    Ok(BaseVal::Single(String::new()))
                } else {
                    let text = self.expand_operand(word, false, stderr).await?;
                    Ok(BaseVal::Single(text))
                }
            }
            ParamOp::Error { word, colon } => {
                if self.needs_default(&base, *colon) {
                    let message = if word.is_empty() {
                        "parameter null or not set".to_string()
                    } else {
                        self.expand_operand(word, false, stderr).await?
                    };
                    Err(Error::Expansion(format!("{}: {}", name, message)))
                } else {
                    Ok(base)
                }
            }
            ParamOp::Substring { spec } => {
                let base = self.plain_value(name, base)?;
                self.substring(base, spec, stderr).await
            }
            ParamOp::RemovePrefix { pattern, greedy } => {
                let pattern = self.expand_operand(pattern, true, stderr).await?;
                Ok(map_elems(self.plain_value(name, base)?, |s| {
                    glob::remove_prefix(&s, &pattern, *greedy)
                }))
            }
            ParamOp::RemoveSuffix { pattern, greedy } => {
                let pattern = self.expand_operand(pattern, true, stderr).await?;
                Ok(map_elems(self.plain_value(name, base)?, |s| {
                    glob::remove_suffix(&s, &pattern, *greedy)
                }))
            }
            ParamOp::Replace {
                pattern,
                replacement,
                all,
                anchor,
            } => {
                let pattern = self.expand_operand(pattern, true, stderr).await?;
                let replacement = self.expand_operand(replacement, false, stderr).await?;
                let (prefix, suffix) = match anchor {
                    Some(crate::parser::ReplaceAnchor::Prefix) => (true, false),
                    Some(crate::parser::ReplaceAnchor::Suffix) => (false, true),
                    None => (false, false),
                };
                Ok(map_elems(self.plain_value(name, base)?, |s| {
                    glob::replace(&s, &pattern, &replacement, *all, prefix, suffix)
                }))
            }
            ParamOp::Case {
                upper,
                all,
                pattern,
            } => {
                let pattern = if pattern.is_empty() {
                    "?".to_string()
                } else {
                    self.expand_operand(pattern, true, stderr).await?
                };
                let (upper, all) = (*upper, *all);
                Ok(map_elems(self.plain_value(name, base)?, |s| {
                    case_convert(&s, &pattern, upper, all)
                }))
            }
            ParamOp::Indirect => {
                let target = match self.plain_value(name, base)? {
                    BaseVal::Single(s) => s,
                    _ => String::new(),
                };
                if target.is_empty() {
                    return Ok(BaseVal::Single(String::new()));
                }
                let indirect = ParamExp::plain(target);
                let pieces = Box::pin(self.expand_param(&indirect, quoted, stderr)).await?;
                let mut text = String::new();
                for piece in pieces {
                    if let Piece::Seg(seg) = piece {
                        text.push_str(&seg.text);
                    }
                }
                Ok(BaseVal::Single(text))
            }
            ParamOp::NamesMatching => {
                let names: Vec<String> = self
                    .state
                    .scopes
                    .visible_names()
                    .into_iter()
                    .filter(|n| n.starts_with(name.as_str()))
                    .collect();
                Ok(BaseVal::Multi(names, false))
            }
            ParamOp::ArrayKeys => Ok(match self.state.scopes.get(name) {
                Some(var) => BaseVal::Multi(var.value.keys(), false),
                None => BaseVal::Multi(Vec::new(), false),
            }),
            ParamOp::Transform(op) => {
                let base = self.plain_value(name, base)?;
                let attrs = self.state.scopes.get(name).map(|v| v.attrs);
                let array_kind = match self.state.scopes.get(name).map(|v| &v.value) {
                    Some(Value::Indexed(_)) => Some('a'),
                    Some(Value::Assoc(_)) => Some('A'),
                    _ => None,
                };
                Ok(map_elems(base, |s| transform(&s, *op, name, attrs, array_kind)))
            }
        }
    }

    /// `set -u` enforcement for plain references.
    fn plain_value(&self, name: &str, base: BaseVal) -> Result<BaseVal> {
        if matches!(base, BaseVal::Unset) {
            if self.state.options.nounset && !matches!(name, "@" | "*") {
                return Err(unbound(name));
            }
            return Ok(BaseVal::Single(String::new()));
        }
        Ok(base)
    }

    fn needs_default(&self, base: &BaseVal, colon: bool) -> bool {
        match base {
            BaseVal::Unset => true,
            BaseVal::Single(s) => colon && s.is_empty(),
            BaseVal::Multi(items, _) => colon && items.is_empty(),
        }
    }

    async fn substring(&mut self, base: BaseVal, spec: &str, stderr: &Output) -> Result<BaseVal> {
        let (off_text, len_text) = match split_top_colon(spec) {
            Some((a, b)) => (a, Some(b)),
            None => (spec.to_string(), None),
        };
        let off = self.eval_arith(&off_text, stderr).await?;
        let len = match &len_text {
            Some(text) => Some(self.eval_arith(text, stderr).await?),
            None => None,
        };

        match base {
            BaseVal::Single(s) => {
                let chars: Vec<char> = s.chars().collect();
                let total = chars.len() as i64;
                let start = if off < 0 { (total + off).max(0) } else { off };
                if start > total {
                    return Ok(BaseVal::Single(String::new()));
                }
                let start = start as usize;
                let end = match len {
                    None => chars.len(),
                    Some(l) if l >= 0 => (start + l as usize).min(chars.len()),
                    Some(l) => {
                        let e = total + l;
                        if e < start as i64 {
                            return Err(Error::Expansion(format!(
                                "{}: substring expression < 0",
                                spec
                            )));
                        }
                        e as usize
                    }
                };
                Ok(BaseVal::Single(chars[start..end].iter().collect()))
            }
            BaseVal::Multi(items, star) => {
                let total = items.len() as i64;
                let start = if off < 0 { (total + off).max(0) } else { off.min(total) };
                let start = start as usize;
                let end = match len {
                    None => items.len(),
                    Some(l) if l >= 0 => (start + l as usize).min(items.len()),
                    Some(l) => ((total + l).max(start as i64)) as usize,
                };
                Ok(BaseVal::Multi(items[start..end].to_vec(), star))
            }
            BaseVal::Unset => Ok(BaseVal::Single(String::new())),
        }
    }

    fn to_pieces(&self, base: BaseVal, quoted: bool) -> Vec<Piece> {
        match base {
            BaseVal::Unset => vec![Piece::Seg(Segment::expansion(String::new(), quoted))],
            BaseVal::Single(s) => vec![Piece::Seg(Segment::expansion(s, quoted))],
            BaseVal::Multi(items, star) => {
                if star {
                    let sep = self.state.ifs().chars().next().map(|c| c.to_string()).unwrap_or_default();
                    vec![Piece::Seg(Segment::expansion(items.join(&sep), quoted))]
                } else {
                    let mut pieces = Vec::new();
                    for (i, item) in items.into_iter().enumerate() {
                        if i > 0 {
                            pieces.push(Piece::Break);
                        }
                        pieces.push(Piece::Seg(Segment::expansion(item, quoted)));
                    }
                    pieces
                }
            }
        }
    }

    /// Deterministic 15-bit generator for `$RANDOM`.
    fn next_random(&mut self) -> u16 {
        let seed = &mut self.state.rand_seed;
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((*seed >> 33) & 0x7fff) as u16
    }
}

fn unbound(name: &str) -> Error {
    Error::Expansion(format!("{}: unbound variable", name))
}

fn map_elems(base: BaseVal, f: impl Fn(String) -> String) -> BaseVal {
    match base {
        BaseVal::Unset => BaseVal::Single(f(String::new())),
        BaseVal::Single(s) => BaseVal::Single(f(s)),
        BaseVal::Multi(items, star) => BaseVal::Multi(items.into_iter().map(f).collect(), star),
    }
}

/// Split `off:len` on the first top-level colon (`?:` inside arithmetic is
/// protected by parentheses in practice).
fn split_top_colon(spec: &str) -> Option<(String, String)> {
    let mut depth = 0usize;
    let mut question = 0usize;
    for (i, c) in spec.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '?' => question += 1,
            ':' if depth == 0 => {
                if question > 0 {
                    question -= 1;
                } else {
                    return Some((spec[..i].to_string(), spec[i + 1..].to_string()));
                }
            }
            _ => {}
        }
    }
    None
}

fn case_convert(value: &str, pattern: &str, upper: bool, all: bool) -> String {
    let mut out = String::with_capacity(value.len());
    let mut done = false;
    for c in value.chars() {
        let applies = (!done || all) && glob::match_glob(pattern, &c.to_string());
        if applies {
            if upper {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            done = true;
        } else {
            out.push(c);
        }
        if !all {
            // Only the first character is eligible for ^ and ,.
            done = true;
        }
    }
    out
}

fn transform(
    value: &str,
    op: char,
    name: &str,
    attrs: Option<crate::interpreter::Attrs>,
    array_kind: Option<char>,
) -> String {
    match op {
        'Q' => format!("'{}'", value.replace('\'', "'\\''")),
        'E' => unescape_backslashes(value),
        'P' => value.to_string(),
        'U' => value.to_uppercase(),
        'L' => value.to_lowercase(),
        'a' => {
            let mut flags = String::new();
            if let Some(kind) = array_kind {
                flags.push(kind);
            }
            if let Some(attrs) = attrs {
                flags.push_str(&attrs.flag_chars());
            }
            flags
        }
        'A' => format!("{}='{}'", name, value.replace('\'', "'\\''")),
        _ => value.to_string(),
    }
}

fn unescape_backslashes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
