//! Brace expansion
//!
//! Purely syntactic and first in the pipeline: `{a,b,c}`, `{1..5}`,
//! `{05..1}` (zero-padded), `{a..c}`, `{1..10..2}`, nested braces with
//! cartesian products. Unmatched or alternation-free braces pass through
//! untouched. Only unquoted literal text participates.

use crate::parser::{Word, WordPart};

/// Expand one word into its brace alternatives (itself when none apply).
pub fn expand(word: &Word) -> Vec<Word> {
    for (pi, part) in word.parts.iter().enumerate() {
        if let WordPart::Literal {
            text,
            quoted: false,
        } = part
        {
            let chars: Vec<char> = text.chars().collect();
            for ci in 0..chars.len() {
                if chars[ci] == '{' {
                    if let Some(words) = try_expand_at(word, pi, ci) {
                        // Re-scan each alternative for further braces.
                        return words.iter().flat_map(expand).collect();
                    }
                }
            }
        }
    }
    vec![word.clone()]
}

/// Attempt expansion of the brace opening at char `ci` of part `pi`.
fn try_expand_at(word: &Word, pi: usize, ci: usize) -> Option<Vec<Word>> {
    // Alternatives under construction; each is a list of parts.
    let mut alternatives: Vec<Vec<WordPart>> = Vec::new();
    let mut current: Vec<WordPart> = Vec::new();
    let mut current_lit = String::new();
    let mut depth = 1usize;
    let mut saw_comma = false;

    let parts = &word.parts;
    let mut pj = pi;
    // Position within the current part's chars.
    let open_part: Vec<char> = match &parts[pi] {
        WordPart::Literal { text, .. } => text.chars().collect(),
        _ => return None,
    };
    let mut cj = ci + 1;
    let mut chars: Vec<char> = open_part;

    loop {
        if cj >= chars.len() {
            // Move to the next part; non-literal parts join the current
            // alternative opaquely.
            pj += 1;
            if pj >= parts.len() {
                return None; // unmatched `{`
            }
            match &parts[pj] {
                WordPart::Literal {
                    text,
                    quoted: false,
                } => {
                    chars = text.chars().collect();
                    cj = 0;
                    continue;
                }
                other => {
                    if !current_lit.is_empty() {
                        current.push(lit(std::mem::take(&mut current_lit)));
                    }
                    current.push(other.clone());
                    chars = Vec::new();
                    cj = 0;
                    continue;
                }
            }
        }
        let c = chars[cj];
        match c {
            '{' => {
                depth += 1;
                current_lit.push(c);
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    if !current_lit.is_empty() || !current.is_empty() || saw_comma {
                        if !current_lit.is_empty() {
                            current.push(lit(std::mem::take(&mut current_lit)));
                        }
                        alternatives.push(std::mem::take(&mut current));
                    }
                    break;
                }
                current_lit.push(c);
            }
            ',' if depth == 1 => {
                saw_comma = true;
                if !current_lit.is_empty() {
                    current.push(lit(std::mem::take(&mut current_lit)));
                }
                alternatives.push(std::mem::take(&mut current));
            }
            _ => current_lit.push(c),
        }
        cj += 1;
    }

    // Sequence form: the whole content is one literal `a..b` / `a..b..c`.
    if !saw_comma {
        if alternatives.len() == 1 {
            if let [WordPart::Literal { text, .. }] = alternatives[0].as_slice() {
                if let Some(items) = expand_sequence(text) {
                    return Some(build_words(word, pi, ci, pj, cj, items.into_iter().map(|t| vec![lit(t)]).collect()));
                }
            }
        }
        return None; // `{single}` stays literal
    }

    Some(build_words(word, pi, ci, pj, cj, alternatives))
}

/// Stitch prefix + alternative + suffix into complete words.
fn build_words(
    word: &Word,
    pi: usize,
    ci: usize,
    pj: usize,
    cj: usize,
    alternatives: Vec<Vec<WordPart>>,
) -> Vec<Word> {
    let parts = &word.parts;
    let mut prefix: Vec<WordPart> = parts[..pi].to_vec();
    if let WordPart::Literal { text, .. } = &parts[pi] {
        let head: String = text.chars().take(ci).collect();
        if !head.is_empty() {
            prefix.push(lit(head));
        }
    }
    let mut suffix: Vec<WordPart> = Vec::new();
    if pj < parts.len() {
        if let WordPart::Literal { text, .. } = &parts[pj] {
            let tail: String = text.chars().skip(cj + 1).collect();
            if !tail.is_empty() {
                suffix.push(lit(tail));
            }
        }
        suffix.extend(parts[pj + 1..].iter().cloned());
    }

    alternatives
        .into_iter()
        .map(|alt| {
            let mut out = prefix.clone();
            out.extend(alt);
            out.extend(suffix.iter().cloned());
            Word { parts: out }
        })
        .collect()
}

fn lit(text: String) -> WordPart {
    WordPart::Literal {
        text,
        quoted: false,
    }
}

/// `1..5`, `05..1`, `a..c`, `1..10..2` sequences.
fn expand_sequence(content: &str) -> Option<Vec<String>> {
    let mut pieces = content.split("..");
    let start = pieces.next()?;
    let end = pieces.next()?;
    let step_text = pieces.next();
    if pieces.next().is_some() {
        return None;
    }

    let step: i64 = match step_text {
        Some(s) => s.parse().ok()?,
        None => 1,
    };
    if step == 0 {
        return None;
    }

    // Alphabetic: single chars on both ends.
    if start.len() == 1 && end.len() == 1 {
        let (a, b) = (start.chars().next()?, end.chars().next()?);
        if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() {
            let (a, b) = (a as i64, b as i64);
            return Some(range_values(a, b, step.unsigned_abs() as i64)
                .into_iter()
                .map(|v| ((v as u8) as char).to_string())
                .collect());
        }
    }

    let a: i64 = start.parse().ok()?;
    let b: i64 = end.parse().ok()?;
    let width = if has_zero_pad(start) || has_zero_pad(end) {
        start.trim_start_matches('-').len().max(end.trim_start_matches('-').len())
    } else {
        0
    };
    Some(
        range_values(a, b, step.unsigned_abs() as i64)
            .into_iter()
            .map(|v| {
                if width > 0 {
                    if v < 0 {
                        format!("-{:0width$}", -v, width = width)
                    } else {
                        format!("{:0width$}", v, width = width)
                    }
                } else {
                    v.to_string()
                }
            })
            .collect(),
    )
}

fn has_zero_pad(text: &str) -> bool {
    let digits = text.trim_start_matches('-');
    digits.len() > 1 && digits.starts_with('0')
}

fn range_values(a: i64, b: i64, step: i64) -> Vec<i64> {
    let mut out = Vec::new();
    if a <= b {
        let mut v = a;
        while v <= b {
            out.push(v);
            v += step;
        }
    } else {
        let mut v = a;
        while v >= b {
            out.push(v);
            v -= step;
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::Word;

    fn expand_text(text: &str) -> Vec<String> {
        expand(&Word::literal(text))
            .iter()
            .map(|w| {
                w.parts
                    .iter()
                    .map(|p| match p {
                        WordPart::Literal { text, .. } => text.clone(),
                        _ => String::new(),
                    })
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn comma_alternatives() {
        assert_eq!(expand_text("{a,b,c}"), ["a", "b", "c"]);
        assert_eq!(expand_text("x{a,b}y"), ["xay", "xby"]);
    }

    #[test]
    fn empty_alternative() {
        assert_eq!(expand_text("a{,b}"), ["a", "ab"]);
    }

    #[test]
    fn numeric_sequences() {
        assert_eq!(expand_text("{1..5}"), ["1", "2", "3", "4", "5"]);
        assert_eq!(expand_text("{5..1}"), ["5", "4", "3", "2", "1"]);
        assert_eq!(expand_text("{1..10..3}"), ["1", "4", "7", "10"]);
    }

    #[test]
    fn zero_padded_sequence() {
        assert_eq!(expand_text("{05..1}"), ["05", "04", "03", "02", "01"]);
    }

    #[test]
    fn letter_sequence() {
        assert_eq!(expand_text("{a..c}"), ["a", "b", "c"]);
    }

    #[test]
    fn nested_braces_multiply() {
        assert_eq!(expand_text("{a,b{1,2}}"), ["a", "b1", "b2"]);
        assert_eq!(expand_text("{a,b}{1,2}"), ["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn non_alternation_passes_through() {
        assert_eq!(expand_text("{abc}"), ["{abc}"]);
        assert_eq!(expand_text("{}"), ["{}"]);
        assert_eq!(expand_text("a{b"), ["a{b"]);
        assert_eq!(expand_text("plain"), ["plain"]);
    }

    #[test]
    fn quoted_braces_do_not_expand() {
        let word = Word {
            parts: vec![WordPart::Literal {
                text: "{a,b}".into(),
                quoted: true,
            }],
        };
        assert_eq!(expand(&word).len(), 1);
    }
}
