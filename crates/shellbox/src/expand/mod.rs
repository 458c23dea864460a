//! Word expansion
//!
//! The ordered pipeline: brace → tilde → parameter/command/arithmetic →
//! field splitting → pathname expansion → quote removal. Intermediate
//! results keep a per-segment quoted flag until field splitting; losing that
//! information early mis-splits quoted spaces, so it is carried all the way.

pub(crate) mod arith;
pub(crate) mod brace;
pub(crate) mod glob;
mod param;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::interpreter::{Input, Interpreter, Io, Output};
use crate::parser::{Script, Word, WordPart};

/// One expanded chunk of a word.
#[derive(Debug, Clone)]
pub(crate) struct Segment {
    pub text: String,
    /// Came from quotes: never field-split, glob characters are literal.
    pub quoted: bool,
    /// Unquoted expansion output: subject to IFS splitting.
    pub splittable: bool,
}

impl Segment {
    fn literal(text: impl Into<String>, quoted: bool) -> Self {
        Self {
            text: text.into(),
            quoted,
            splittable: false,
        }
    }

    fn expansion(text: impl Into<String>, quoted: bool) -> Self {
        Self {
            text: text.into(),
            quoted,
            splittable: !quoted,
        }
    }
}

/// Expansion output stream: segments with hard field boundaries ("$@").
#[derive(Debug, Clone)]
pub(crate) enum Piece {
    Seg(Segment),
    Break,
}

impl Interpreter {
    /// Expand a word list into final argv fields.
    pub(crate) async fn expand_words(
        &mut self,
        words: &[Word],
        stderr: &Output,
    ) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for word in words {
            out.extend(self.expand_word_fields(word, stderr).await?);
        }
        Ok(out)
    }

    /// Expand one word through the whole pipeline (may yield 0..n fields).
    pub(crate) async fn expand_word_fields(
        &mut self,
        word: &Word,
        stderr: &Output,
    ) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for alternative in brace::expand(word) {
            let alternative = self.expand_tilde(alternative);
            let pieces = self.word_to_pieces(&alternative, stderr).await?;
            let fields = split_fields(pieces, &self.state.ifs());
            for field in fields {
                out.extend(self.finish_field(field).await?);
            }
        }
        Ok(out)
    }

    /// Expand to a single string: no brace multiplication, no splitting, no
    /// globbing (redirect targets, assignment values, case subjects).
    pub(crate) async fn expand_word_single(
        &mut self,
        word: &Word,
        stderr: &Output,
    ) -> Result<String> {
        let word = self.expand_tilde(word.clone());
        let pieces = self.word_to_pieces(&word, stderr).await?;
        let mut text = String::new();
        let mut first = true;
        for piece in pieces {
            match piece {
                Piece::Seg(seg) => text.push_str(&seg.text),
                Piece::Break => {
                    if !first {
                        text.push(' ');
                    }
                }
            }
            first = false;
        }
        Ok(text)
    }

    /// Expand in pattern position: quoted parts match literally.
    pub(crate) async fn expand_word_pattern(
        &mut self,
        word: &Word,
        stderr: &Output,
    ) -> Result<String> {
        let pieces = self.word_to_pieces(word, stderr).await?;
        let mut pattern = String::new();
        for piece in pieces {
            if let Piece::Seg(seg) = piece {
                if seg.quoted {
                    pattern.push_str(&glob::escape_glob(&seg.text));
                } else {
                    pattern.push_str(&seg.text);
                }
            }
        }
        Ok(pattern)
    }

    /// Expand raw text (array subscripts, `${x:off}` specs). Boxed: the text
    /// may itself contain nested expansions.
    pub(crate) fn expand_string<'a>(
        &'a mut self,
        text: &'a str,
        stderr: &'a Output,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let word = crate::parser::parse_operand_word(text)?;
            self.expand_word_single(&word, stderr).await
        })
    }

    /// Pre-expand `$...` constructs inside an arithmetic expression. Boxed:
    /// arithmetic can nest inside its own expansions.
    pub(crate) fn expand_arith_text<'a>(
        &'a mut self,
        expr: &'a str,
        stderr: &'a Output,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            if !expr.contains('$') && !expr.contains('`') {
                return Ok(expr.to_string());
            }
            let word = crate::parser::parse_expansion_text(expr)?;
            let pieces = self.word_to_pieces(&word, stderr).await?;
            let mut out = String::new();
            for piece in pieces {
                if let Piece::Seg(seg) = piece {
                    out.push_str(&seg.text);
                }
            }
            Ok(out)
        })
    }

    /// Operand of a `${...}` operator, expanded lazily. Boxed: operands may
    /// nest expansions recursively.
    pub(crate) fn expand_operand<'a>(
        &'a mut self,
        raw: &'a str,
        pattern_context: bool,
        stderr: &'a Output,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let word = crate::parser::parse_operand_word(raw)?;
            if pattern_context {
                self.expand_word_pattern(&word, stderr).await
            } else {
                self.expand_word_single(&word, stderr).await
            }
        })
    }

    /// Leading-tilde expansion on the word's first unquoted literal.
    fn expand_tilde(&self, mut word: Word) -> Word {
        if let Some(WordPart::Literal {
            text,
            quoted: false,
        }) = word.parts.first_mut()
        {
            if let Some(rest) = text.strip_prefix('~') {
                let (name, tail) = match rest.find('/') {
                    Some(pos) => (&rest[..pos], &rest[pos..]),
                    None => (rest, ""),
                };
                if name.is_empty() {
                    let home = self
                        .state
                        .get_scalar("HOME")
                        .unwrap_or_else(|| "/home/user".to_string());
                    *text = format!("{}{}", home, tail);
                }
                // `~name`: no user table configured, leave unchanged.
            }
        }
        word
    }

    /// Core: turn word parts into segments, running the nested expansions.
    async fn word_to_pieces(&mut self, word: &Word, stderr: &Output) -> Result<Vec<Piece>> {
        let mut pieces = Vec::new();
        for part in &word.parts {
            match part {
                WordPart::Literal { text, quoted } => {
                    pieces.push(Piece::Seg(Segment::literal(text.clone(), *quoted)));
                }
                WordPart::Param { exp, quoted } => {
                    pieces.extend(self.expand_param(exp, *quoted, stderr).await?);
                }
                WordPart::CmdSub { script, quoted } => {
                    let text = self.command_substitute(script, stderr).await?;
                    pieces.push(Piece::Seg(Segment::expansion(text, *quoted)));
                }
                WordPart::Arith { expr, quoted } => {
                    let value = self.eval_arith(expr, stderr).await?;
                    pieces.push(Piece::Seg(Segment::expansion(value.to_string(), *quoted)));
                }
            }
        }
        Ok(pieces)
    }

    /// Run a `$( )` body in a subshell, capture stdout, strip trailing
    /// newlines. The substitution's status feeds assignment-only commands.
    pub(crate) async fn command_substitute(
        &mut self,
        script: &Script,
        stderr: &Output,
    ) -> Result<String> {
        self.tick()?;
        let mut sub = self.subshell();
        // errexit does not propagate out of a substitution (documented
        // do-not-inherit choice).
        sub.state.options.errexit = false;
        let capture = Output::capture();
        let mut io = Io::new(Input::null(), capture.clone(), stderr.clone());
        sub.run_script(script, &mut io).await?;
        let status = match sub.state.control {
            crate::interpreter::ControlFlow::Exit(code) => code,
            _ => sub.state.last_status,
        };
        self.last_subst_status = Some(status);
        let mut text = String::from_utf8_lossy(&capture.take_captured()).into_owned();
        while text.ends_with('\n') {
            text.pop();
        }
        Ok(text)
    }

    /// Pathname expansion plus quote removal for one split field.
    async fn finish_field(&mut self, field: Vec<Segment>) -> Result<Vec<String>> {
        let literal: String = field.iter().map(|s| s.text.as_str()).collect();
        if self.state.options.noglob {
            return Ok(vec![literal]);
        }
        let pattern: String = field
            .iter()
            .map(|s| {
                if s.quoted {
                    glob::escape_glob(&s.text)
                } else {
                    s.text.clone()
                }
            })
            .collect();
        if !glob::has_glob_chars(&pattern) {
            return Ok(vec![literal]);
        }
        let fs: Arc<dyn crate::fs::FileSystem> = Arc::clone(&self.fs);
        let matches =
            glob::expand_pathnames(&fs, &self.state.cwd, &pattern, &self.state.options).await?;
        if !matches.is_empty() {
            return Ok(matches);
        }
        if self.state.options.failglob {
            return Err(Error::Expansion(format!("no match: {}", literal)));
        }
        if self.state.options.nullglob {
            return Ok(Vec::new());
        }
        Ok(vec![literal])
    }
}

/// Quote-aware IFS field splitting.
///
/// Runs of IFS whitespace separate fields; a non-whitespace IFS character is
/// always a separator (preserving empty fields between two of them). Quoted
/// segments never split; an empty quoted segment still starts a field.
pub(crate) fn split_fields(pieces: Vec<Piece>, ifs: &str) -> Vec<Vec<Segment>> {
    let ws: Vec<char> = ifs.chars().filter(|c| c.is_whitespace()).collect();
    let hard: Vec<char> = ifs.chars().filter(|c| !c.is_whitespace()).collect();

    let mut fields: Vec<Vec<Segment>> = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut started = false;
    // A whitespace separator just ended a field; an immediately following
    // hard separator is part of the same separation.
    let mut after_ws_sep = false;

    let commit = |current: &mut Vec<Segment>, started: &mut bool, fields: &mut Vec<Vec<Segment>>| {
        fields.push(std::mem::take(current));
        *started = false;
    };

    for piece in pieces {
        match piece {
            Piece::Break => {
                if started {
                    commit(&mut current, &mut started, &mut fields);
                }
                after_ws_sep = false;
            }
            Piece::Seg(seg) if !seg.splittable => {
                if !seg.text.is_empty() || seg.quoted {
                    current.push(seg);
                    started = true;
                    after_ws_sep = false;
                }
            }
            Piece::Seg(seg) => {
                let mut run = String::new();
                for c in seg.text.chars() {
                    if ws.contains(&c) {
                        if !run.is_empty() {
                            current.push(Segment::expansion(std::mem::take(&mut run), false));
                            started = true;
                        }
                        if started {
                            commit(&mut current, &mut started, &mut fields);
                            after_ws_sep = true;
                        }
                    } else if hard.contains(&c) {
                        if !run.is_empty() {
                            current.push(Segment::expansion(std::mem::take(&mut run), false));
                            started = true;
                        }
                        if started {
                            commit(&mut current, &mut started, &mut fields);
                        } else if !after_ws_sep {
                            // Two adjacent hard separators: empty field.
                            commit(&mut current, &mut started, &mut fields);
                        }
                        after_ws_sep = false;
                    } else {
                        run.push(c);
                        after_ws_sep = false;
                    }
                }
                if !run.is_empty() {
                    current.push(Segment::expansion(run, false));
                    started = true;
                }
            }
        }
    }
    if started {
        fields.push(current);
    }
    fields
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn seg(text: &str) -> Piece {
        Piece::Seg(Segment::expansion(text, false))
    }

    fn quoted(text: &str) -> Piece {
        Piece::Seg(Segment::literal(text, true))
    }

    fn texts(fields: Vec<Vec<Segment>>) -> Vec<String> {
        fields
            .iter()
            .map(|f| f.iter().map(|s| s.text.as_str()).collect())
            .collect()
    }

    #[test]
    fn whitespace_splitting_coalesces() {
        let fields = split_fields(vec![seg("  a   b  ")], " \t\n");
        assert_eq!(texts(fields), ["a", "b"]);
    }

    #[test]
    fn hard_separator_preserves_empty_fields() {
        let fields = split_fields(vec![seg("a::b")], ":");
        assert_eq!(texts(fields), ["a", "", "b"]);
    }

    #[test]
    fn leading_hard_separator_makes_empty_field() {
        let fields = split_fields(vec![seg(":a")], ":");
        assert_eq!(texts(fields), ["", "a"]);
    }

    #[test]
    fn trailing_hard_separator_is_silent() {
        let fields = split_fields(vec![seg("a:")], ":");
        assert_eq!(texts(fields), ["a"]);
    }

    #[test]
    fn mixed_ws_and_hard_separators_merge() {
        let fields = split_fields(vec![seg("a : b")], ": ");
        assert_eq!(texts(fields), ["a", "b"]);
    }

    #[test]
    fn quoted_segments_never_split() {
        let fields = split_fields(
            vec![quoted("a b"), seg(" c")],
            " \t\n",
        );
        assert_eq!(texts(fields), ["a b", "c"]);
    }

    #[test]
    fn empty_quoted_segment_yields_a_field() {
        let fields = split_fields(vec![quoted("")], " \t\n");
        assert_eq!(texts(fields), [""]);
    }

    #[test]
    fn empty_unquoted_expansion_vanishes() {
        let fields = split_fields(vec![seg("")], " \t\n");
        assert!(fields.is_empty());
    }

    #[test]
    fn hard_breaks_split_unconditionally() {
        let fields = split_fields(
            vec![quoted("a"), Piece::Break, quoted("b")],
            " \t\n",
        );
        assert_eq!(texts(fields), ["a", "b"]);
    }

    #[test]
    fn adjacent_text_joins_break_neighbours() {
        // "x$@y" with args (a, b) -> "xa", "by"
        let fields = split_fields(
            vec![
                Piece::Seg(Segment::literal("x", false)),
                quoted("a"),
                Piece::Break,
                quoted("b"),
                Piece::Seg(Segment::literal("y", false)),
            ],
            " \t\n",
        );
        assert_eq!(texts(fields), ["xa", "by"]);
    }
}
