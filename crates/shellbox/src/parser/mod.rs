//! Parser module
//!
//! Recursive descent over the token stream into the AST. Words are parsed in
//! a second layer ([`parse_word`]) that splits raw word text into parts with
//! quoting preserved; `$( ... )` bodies recurse through a nested parser.

mod ast;
mod lexer;
mod tokens;

pub use ast::*;
pub use lexer::Lexer;
pub use tokens::Token;

use std::collections::VecDeque;

use crate::error::{Error, Result};

/// Words recognised positionally as syntax, never as command names.
const RESERVED: &[&str] = &[
    "if", "then", "else", "elif", "fi", "for", "while", "until", "do", "done", "case", "esac",
    "function", "in", "{", "}", "!", "[[",
];

struct PendingHeredoc {
    delimiter: String,
    strip_tabs: bool,
    quoted: bool,
}

/// Parser for shell scripts.
pub struct Parser {
    lexer: Lexer,
    tok: Option<Token>,
    pending_heredocs: Vec<PendingHeredoc>,
    heredoc_bodies: VecDeque<Word>,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Self {
            lexer: Lexer::new(input),
            tok: None,
            pending_heredocs: Vec::new(),
            heredoc_bodies: VecDeque::new(),
        }
    }

    /// Parse the input and return the AST.
    pub fn parse(mut self) -> Result<Script> {
        self.advance()?;
        let mut script = self.parse_script(&[])?;
        if let Some(tok) = &self.tok {
            return Err(self.error(format!("unexpected token: {:?}", tok)));
        }
        if !self.pending_heredocs.is_empty() {
            self.collect_heredoc_bodies()?;
        }
        let mut bodies = std::mem::take(&mut self.heredoc_bodies);
        fill_heredocs_script(&mut script, &mut bodies);
        Ok(script)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Syntax {
            line: self.lexer.line(),
            message: message.into(),
        }
    }

    /// Move to the next token. Stepping over a newline first captures any
    /// pending here-doc bodies, which start on the following line.
    fn advance(&mut self) -> Result<()> {
        if matches!(self.tok, Some(Token::Newline)) && !self.pending_heredocs.is_empty() {
            self.collect_heredoc_bodies()?;
        }
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn collect_heredoc_bodies(&mut self) -> Result<()> {
        for pending in std::mem::take(&mut self.pending_heredocs) {
            let text = self
                .lexer
                .read_heredoc(&pending.delimiter, pending.strip_tabs)?;
            let word = if pending.quoted {
                Word {
                    parts: vec![WordPart::Literal {
                        text,
                        quoted: true,
                    }],
                }
            } else {
                parse_heredoc_body(&text, self.lexer.line())?
            };
            self.heredoc_bodies.push_back(word);
        }
        Ok(())
    }

    fn current_word(&self) -> Option<&str> {
        self.tok.as_ref().and_then(|t| t.word())
    }

    fn at_word(&self, text: &str) -> bool {
        self.current_word() == Some(text)
    }

    fn expect_word(&mut self, text: &str) -> Result<()> {
        if self.at_word(text) {
            self.advance()
        } else {
            Err(self.error(format!("expected `{}'", text)))
        }
    }

    fn skip_newlines(&mut self) -> Result<()> {
        while matches!(self.tok, Some(Token::Newline)) {
            self.advance()?;
        }
        Ok(())
    }

    fn skip_separators(&mut self) -> Result<()> {
        while matches!(self.tok, Some(Token::Newline) | Some(Token::Semi)) {
            self.advance()?;
        }
        Ok(())
    }

    /// Parse list items until EOF, a closing token or one of `stops` at
    /// command position.
    fn parse_script(&mut self, stops: &[&str]) -> Result<Script> {
        let mut items = Vec::new();
        loop {
            self.skip_separators()?;
            match &self.tok {
                None => break,
                Some(Token::RParen)
                | Some(Token::DoubleSemi)
                | Some(Token::SemiAnd)
                | Some(Token::DoubleSemiAnd) => break,
                Some(Token::Word(w)) if stops.contains(&w.as_str()) => break,
                _ => {}
            }
            let command = self.parse_andor()?;
            let mut background = false;
            match &self.tok {
                Some(Token::Amp) => {
                    background = true;
                    self.advance()?;
                }
                Some(Token::Semi) | Some(Token::Newline) => {
                    self.advance()?;
                }
                _ => {}
            }
            items.push(ListItem {
                command,
                background,
            });
        }
        Ok(Script { items })
    }

    fn parse_andor(&mut self) -> Result<Command> {
        let first = self.parse_pipeline()?;
        let mut rest = Vec::new();
        loop {
            let op = match &self.tok {
                Some(Token::And) => AndOr::And,
                Some(Token::Or) => AndOr::Or,
                _ => break,
            };
            self.advance()?;
            self.skip_newlines()?;
            rest.push((op, self.parse_pipeline()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Command::List(CommandList {
                first: Box::new(first),
                rest,
            }))
        }
    }

    fn parse_pipeline(&mut self) -> Result<Command> {
        let mut negated = false;
        while self.at_word("!") {
            negated = !negated;
            self.advance()?;
        }
        let mut commands = vec![self.parse_command_unit()?];
        while matches!(self.tok, Some(Token::Pipe)) {
            self.advance()?;
            self.skip_newlines()?;
            commands.push(self.parse_command_unit()?);
        }
        if commands.len() == 1 && !negated {
            Ok(commands.pop().expect("nonempty"))
        } else {
            Ok(Command::Pipeline(Pipeline { negated, commands }))
        }
    }

    fn parse_command_unit(&mut self) -> Result<Command> {
        match self.tok.clone() {
            Some(Token::ArithSpan(expr)) => {
                self.advance()?;
                let redirects = self.parse_trailing_redirects()?;
                Ok(Command::Compound(CompoundCommand::Arith(expr), redirects))
            }
            Some(Token::LParen) => {
                self.advance()?;
                let script = self.parse_script(&[])?;
                if !matches!(self.tok, Some(Token::RParen)) {
                    return Err(self.error("expected `)'"));
                }
                self.advance()?;
                let redirects = self.parse_trailing_redirects()?;
                Ok(Command::Compound(CompoundCommand::Subshell(script), redirects))
            }
            Some(Token::Word(w)) => match w.as_str() {
                "if" => self.parse_if(),
                "while" => self.parse_loop(false),
                "until" => self.parse_loop(true),
                "for" => self.parse_for(),
                "case" => self.parse_case(),
                "{" => self.parse_group(),
                "[[" => self.parse_cond(),
                "function" => self.parse_function_keyword(),
                w if is_reserved(w) => Err(self.error(format!("unexpected `{}'", w))),
                _ => self.parse_simple(),
            },
            Some(Token::IoNumber(_)) => self.parse_simple(),
            Some(t) if t.is_redirect_op() => self.parse_simple(),
            Some(t) => Err(self.error(format!("unexpected token: {:?}", t))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_trailing_redirects(&mut self) -> Result<Vec<Redirect>> {
        let mut redirects = Vec::new();
        loop {
            match &self.tok {
                Some(Token::IoNumber(n)) => {
                    let fd = *n;
                    self.advance()?;
                    redirects.push(self.parse_redirect(Some(fd))?);
                }
                Some(t) if t.is_redirect_op() => {
                    redirects.push(self.parse_redirect(None)?);
                }
                _ => break,
            }
        }
        Ok(redirects)
    }

    fn parse_redirect(&mut self, fd: Option<u32>) -> Result<Redirect> {
        let op = self.tok.clone().ok_or_else(|| self.error("expected redirect"))?;
        self.advance()?;

        if matches!(op, Token::DLess | Token::DLessDash) {
            let raw = match self.current_word() {
                Some(w) => w.to_string(),
                None => return Err(self.error("expected here-document delimiter")),
            };
            self.advance()?;
            let quoted = raw.contains('\'') || raw.contains('"') || raw.contains('\\');
            let delimiter = dequote(&raw);
            let strip_tabs = matches!(op, Token::DLessDash);
            self.pending_heredocs.push(PendingHeredoc {
                delimiter: delimiter.clone(),
                strip_tabs,
                quoted,
            });
            return Ok(Redirect {
                fd,
                kind: RedirectKind::HereDoc { strip_tabs, quoted },
                target: Word::literal(delimiter),
                heredoc_body: None,
            });
        }

        let kind = match op {
            Token::Less => RedirectKind::In,
            Token::Great => RedirectKind::Out,
            Token::DGreat => RedirectKind::Append,
            Token::TLess => RedirectKind::HereString,
            Token::LessAnd => RedirectKind::DupIn,
            Token::GreatAnd => RedirectKind::DupOut,
            Token::AndGreat => RedirectKind::OutErr,
            Token::AndDGreat => RedirectKind::OutErrAppend,
            t => return Err(self.error(format!("unexpected token: {:?}", t))),
        };
        let raw = match self.current_word() {
            Some(w) => w.to_string(),
            None => return Err(self.error("expected redirect target")),
        };
        self.advance()?;
        Ok(Redirect {
            fd,
            kind,
            target: parse_word(&raw, self.lexer.line())?,
            heredoc_body: None,
        })
    }

    fn parse_simple(&mut self) -> Result<Command> {
        let mut cmd = SimpleCommand::default();
        loop {
            match self.tok.clone() {
                Some(Token::IoNumber(n)) => {
                    self.advance()?;
                    cmd.redirects.push(self.parse_redirect(Some(n))?);
                }
                Some(t) if t.is_redirect_op() => {
                    cmd.redirects.push(self.parse_redirect(None)?);
                }
                Some(Token::Word(w)) => {
                    if cmd.words.is_empty() {
                        if let Some(assign) = parse_assignment_text(&w, self.lexer.line())? {
                            self.advance()?;
                            cmd.assignments.push(assign);
                            continue;
                        }
                    }
                    self.advance()?;
                    // `name()` function definition shorthand.
                    if cmd.words.is_empty()
                        && cmd.assignments.is_empty()
                        && cmd.redirects.is_empty()
                        && matches!(self.tok, Some(Token::LParen))
                        && is_valid_name(&w)
                    {
                        self.advance()?;
                        if !matches!(self.tok, Some(Token::RParen)) {
                            return Err(self.error("expected `)' in function definition"));
                        }
                        self.advance()?;
                        self.skip_newlines()?;
                        let body = self.parse_command_unit()?;
                        return Ok(Command::FunctionDef(FunctionDef {
                            name: w,
                            body: Box::new(body),
                        }));
                    }
                    cmd.words.push(parse_word(&w, self.lexer.line())?);
                }
                _ => break,
            }
        }
        if cmd.words.is_empty() && cmd.assignments.is_empty() && cmd.redirects.is_empty() {
            return Err(self.error("expected command"));
        }
        Ok(Command::Simple(cmd))
    }

    fn parse_if(&mut self) -> Result<Command> {
        self.advance()?;
        let cond = self.parse_script(&["then"])?;
        self.expect_word("then")?;
        let then = self.parse_script(&["fi", "else", "elif"])?;
        let mut elifs = Vec::new();
        while self.at_word("elif") {
            self.advance()?;
            let c = self.parse_script(&["then"])?;
            self.expect_word("then")?;
            let b = self.parse_script(&["fi", "else", "elif"])?;
            elifs.push((c, b));
        }
        let els = if self.at_word("else") {
            self.advance()?;
            Some(self.parse_script(&["fi"])?)
        } else {
            None
        };
        self.expect_word("fi")?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(
            CompoundCommand::If {
                cond,
                then,
                elifs,
                els,
            },
            redirects,
        ))
    }

    fn parse_loop(&mut self, until: bool) -> Result<Command> {
        self.advance()?;
        let cond = self.parse_script(&["do"])?;
        self.expect_word("do")?;
        let body = self.parse_script(&["done"])?;
        self.expect_word("done")?;
        let redirects = self.parse_trailing_redirects()?;
        let compound = if until {
            CompoundCommand::Until { cond, body }
        } else {
            CompoundCommand::While { cond, body }
        };
        Ok(Command::Compound(compound, redirects))
    }

    fn parse_for(&mut self) -> Result<Command> {
        self.advance()?;

        if let Some(Token::ArithSpan(spec)) = self.tok.clone() {
            self.advance()?;
            let parts: Vec<&str> = spec.splitn(3, ';').collect();
            if parts.len() != 3 {
                return Err(self.error("expected `((init; cond; step))'"));
            }
            let (init, cond, step) = (
                parts[0].trim().to_string(),
                parts[1].trim().to_string(),
                parts[2].trim().to_string(),
            );
            self.skip_separators()?;
            self.expect_word("do")?;
            let body = self.parse_script(&["done"])?;
            self.expect_word("done")?;
            let redirects = self.parse_trailing_redirects()?;
            return Ok(Command::Compound(
                CompoundCommand::CFor {
                    init,
                    cond,
                    step,
                    body,
                },
                redirects,
            ));
        }

        let var = match self.current_word() {
            Some(w) if is_valid_name(w) => w.to_string(),
            _ => return Err(self.error("expected variable name after `for'")),
        };
        self.advance()?;

        let words = if self.at_word("in") {
            self.advance()?;
            let mut words = Vec::new();
            while let Some(Token::Word(w)) = self.tok.clone() {
                self.advance()?;
                words.push(parse_word(&w, self.lexer.line())?);
            }
            Some(words)
        } else {
            None
        };
        self.skip_separators()?;
        self.expect_word("do")?;
        let body = self.parse_script(&["done"])?;
        self.expect_word("done")?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(
            CompoundCommand::For { var, words, body },
            redirects,
        ))
    }

    fn parse_case(&mut self) -> Result<Command> {
        self.advance()?;
        let subject = match self.current_word() {
            Some(w) => parse_word(w, self.lexer.line())?,
            None => return Err(self.error("expected word after `case'")),
        };
        self.advance()?;
        self.skip_newlines()?;
        self.expect_word("in")?;
        self.skip_newlines()?;

        let mut arms = Vec::new();
        loop {
            self.skip_newlines()?;
            if self.at_word("esac") {
                break;
            }
            if matches!(self.tok, Some(Token::LParen)) {
                self.advance()?;
            }
            let mut patterns = Vec::new();
            loop {
                match self.current_word() {
                    Some(w) => {
                        patterns.push(parse_word(w, self.lexer.line())?);
                        self.advance()?;
                    }
                    None => return Err(self.error("expected case pattern")),
                }
                match &self.tok {
                    Some(Token::Pipe) => self.advance()?,
                    Some(Token::RParen) => {
                        self.advance()?;
                        break;
                    }
                    _ => return Err(self.error("expected `)' after case pattern")),
                }
            }
            let body = self.parse_script(&["esac"])?;
            let terminator = match &self.tok {
                Some(Token::DoubleSemi) => {
                    self.advance()?;
                    CaseTerm::Break
                }
                Some(Token::SemiAnd) => {
                    self.advance()?;
                    CaseTerm::FallThrough
                }
                Some(Token::DoubleSemiAnd) => {
                    self.advance()?;
                    CaseTerm::Continue
                }
                _ => CaseTerm::Break,
            };
            arms.push(CaseArm {
                patterns,
                body,
                terminator,
            });
        }
        self.expect_word("esac")?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(
            CompoundCommand::Case { subject, arms },
            redirects,
        ))
    }

    fn parse_group(&mut self) -> Result<Command> {
        self.advance()?;
        let script = self.parse_script(&["}"])?;
        self.expect_word("}")?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(CompoundCommand::Group(script), redirects))
    }

    fn parse_cond(&mut self) -> Result<Command> {
        self.advance()?;
        let mut words = Vec::new();
        loop {
            match self.tok.clone() {
                Some(Token::Word(w)) if w == "]]" => {
                    self.advance()?;
                    break;
                }
                Some(Token::Word(w)) => {
                    words.push(parse_word(&w, self.lexer.line())?);
                    self.advance()?;
                }
                Some(Token::And) => {
                    words.push(Word::literal("&&"));
                    self.advance()?;
                }
                Some(Token::Or) => {
                    words.push(Word::literal("||"));
                    self.advance()?;
                }
                Some(Token::LParen) => {
                    words.push(Word::literal("("));
                    self.advance()?;
                }
                Some(Token::RParen) => {
                    words.push(Word::literal(")"));
                    self.advance()?;
                }
                Some(Token::Less) => {
                    words.push(Word::literal("<"));
                    self.advance()?;
                }
                Some(Token::Great) => {
                    words.push(Word::literal(">"));
                    self.advance()?;
                }
                Some(Token::Newline) => self.advance()?,
                _ => return Err(self.error("unterminated [[ conditional")),
            }
        }
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(CompoundCommand::Cond(words), redirects))
    }

    fn parse_function_keyword(&mut self) -> Result<Command> {
        self.advance()?;
        let name = match self.current_word() {
            Some(w) if is_valid_name(w) => w.to_string(),
            _ => return Err(self.error("expected function name")),
        };
        self.advance()?;
        if matches!(self.tok, Some(Token::LParen)) {
            self.advance()?;
            if !matches!(self.tok, Some(Token::RParen)) {
                return Err(self.error("expected `)' in function definition"));
            }
            self.advance()?;
        }
        self.skip_newlines()?;
        let body = self.parse_command_unit()?;
        Ok(Command::FunctionDef(FunctionDef {
            name,
            body: Box::new(body),
        }))
    }
}

/// Names reserved for syntax at command position.
pub fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Strip quoting from a raw word (for here-doc delimiters).
fn dequote(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    out.push(q);
                }
            }
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                    out.push(q);
                }
            }
            '\\' => {
                if let Some(q) = chars.next() {
                    out.push(q);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Patch captured here-doc bodies into redirects, walking in source order.
fn fill_heredocs_script(script: &mut Script, bodies: &mut VecDeque<Word>) {
    for item in &mut script.items {
        fill_heredocs_command(&mut item.command, bodies);
    }
}

fn fill_heredocs_command(command: &mut Command, bodies: &mut VecDeque<Word>) {
    let fill = |redirects: &mut Vec<Redirect>, bodies: &mut VecDeque<Word>| {
        for r in redirects {
            if matches!(r.kind, RedirectKind::HereDoc { .. }) && r.heredoc_body.is_none() {
                r.heredoc_body = bodies.pop_front();
            }
        }
    };
    match command {
        Command::Simple(cmd) => fill(&mut cmd.redirects, bodies),
        Command::Pipeline(p) => {
            for c in &mut p.commands {
                fill_heredocs_command(c, bodies);
            }
        }
        Command::List(list) => {
            fill_heredocs_command(&mut list.first, bodies);
            for (_, c) in &mut list.rest {
                fill_heredocs_command(c, bodies);
            }
        }
        Command::Compound(compound, redirects) => {
            match compound {
                CompoundCommand::If {
                    cond,
                    then,
                    elifs,
                    els,
                } => {
                    fill_heredocs_script(cond, bodies);
                    fill_heredocs_script(then, bodies);
                    for (c, b) in elifs {
                        fill_heredocs_script(c, bodies);
                        fill_heredocs_script(b, bodies);
                    }
                    if let Some(els) = els {
                        fill_heredocs_script(els, bodies);
                    }
                }
                CompoundCommand::While { cond, body }
                | CompoundCommand::Until { cond, body } => {
                    fill_heredocs_script(cond, bodies);
                    fill_heredocs_script(body, bodies);
                }
                CompoundCommand::For { body, .. } | CompoundCommand::CFor { body, .. } => {
                    fill_heredocs_script(body, bodies);
                }
                CompoundCommand::Case { arms, .. } => {
                    for arm in arms {
                        fill_heredocs_script(&mut arm.body, bodies);
                    }
                }
                CompoundCommand::Subshell(s) | CompoundCommand::Group(s) => {
                    fill_heredocs_script(s, bodies);
                }
                CompoundCommand::Arith(_) | CompoundCommand::Cond(_) => {}
            }
            fill(redirects, bodies);
        }
        Command::FunctionDef(def) => fill_heredocs_command(&mut def.body, bodies),
    }
}

/// Recognise `name=value`, `name+=value`, `name[idx]=value` and array forms.
fn parse_assignment_text(raw: &str, line: usize) -> Result<Option<Assignment>> {
    let eq = match raw.find('=') {
        Some(pos) if pos > 0 => pos,
        _ => return Ok(None),
    };
    let (mut lhs, _) = raw.split_at(eq);
    let append = lhs.ends_with('+');
    if append {
        lhs = &lhs[..lhs.len() - 1];
    }
    let (name, index) = match lhs.find('[') {
        Some(open) if lhs.ends_with(']') => (
            &lhs[..open],
            Some(lhs[open + 1..lhs.len() - 1].to_string()),
        ),
        Some(_) => return Ok(None),
        None => (lhs, None),
    };
    if !is_valid_name(name) {
        return Ok(None);
    }

    let rhs = &raw[eq + 1..];
    let value = if rhs.starts_with('(') && rhs.ends_with(')') {
        let inner = &rhs[1..rhs.len() - 1];
        let mut lexer = Lexer::new(inner);
        let mut words = Vec::new();
        while let Some(tok) = lexer.next_token().map_err(|_| Error::Syntax {
            line,
            message: "bad array literal".into(),
        })? {
            match tok {
                Token::Word(w) => words.push(parse_word(&w, line)?),
                Token::Newline => {}
                t => {
                    return Err(Error::Syntax {
                        line,
                        message: format!("unexpected token in array literal: {:?}", t),
                    })
                }
            }
        }
        AssignValue::Array(words)
    } else {
        AssignValue::Scalar(parse_word(rhs, line)?)
    };

    Ok(Some(Assignment {
        name: name.to_string(),
        index,
        value,
        append,
    }))
}

/// Parse raw word text (quotes included) into parts with quoting preserved.
pub(crate) fn parse_word(raw: &str, line: usize) -> Result<Word> {
    let chars: Vec<char> = raw.chars().collect();
    let mut parts: Vec<WordPart> = Vec::new();
    let mut lit = String::new();
    let mut i = 0;

    macro_rules! flush {
        () => {
            if !lit.is_empty() {
                parts.push(WordPart::Literal {
                    text: std::mem::take(&mut lit),
                    quoted: false,
                });
            }
        };
    }

    while i < chars.len() {
        match chars[i] {
            '\'' => {
                flush!();
                i += 1;
                let mut text = String::new();
                while i < chars.len() && chars[i] != '\'' {
                    text.push(chars[i]);
                    i += 1;
                }
                i += 1; // closing quote (guaranteed by the lexer)
                parts.push(WordPart::Literal { text, quoted: true });
            }
            '"' => {
                flush!();
                i += 1;
                let mut text = String::new();
                let mut produced = false;
                while i < chars.len() && chars[i] != '"' {
                    match chars[i] {
                        '\\' if i + 1 < chars.len() => {
                            let next = chars[i + 1];
                            if matches!(next, '$' | '`' | '"' | '\\') {
                                text.push(next);
                            } else {
                                text.push('\\');
                                text.push(next);
                            }
                            i += 2;
                        }
                        '$' => {
                            if !text.is_empty() {
                                parts.push(WordPart::Literal {
                                    text: std::mem::take(&mut text),
                                    quoted: true,
                                });
                            }
                            let (part, next) = parse_dollar(&chars, i, true, line)?;
                            parts.push(part);
                            produced = true;
                            i = next;
                        }
                        '`' => {
                            if !text.is_empty() {
                                parts.push(WordPart::Literal {
                                    text: std::mem::take(&mut text),
                                    quoted: true,
                                });
                            }
                            let (part, next) = parse_backtick(&chars, i, true, line)?;
                            parts.push(part);
                            produced = true;
                            i = next;
                        }
                        c => {
                            text.push(c);
                            i += 1;
                        }
                    }
                }
                i += 1; // closing quote
                if !text.is_empty() || !produced {
                    parts.push(WordPart::Literal { text, quoted: true });
                }
            }
            '$' if i + 1 < chars.len() && chars[i + 1] == '\'' => {
                flush!();
                let (text, next) = decode_ansi_c(&chars, i + 2);
                parts.push(WordPart::Literal { text, quoted: true });
                i = next;
            }
            '$' => {
                flush!();
                let (part, next) = parse_dollar(&chars, i, false, line)?;
                parts.push(part);
                i = next;
            }
            '`' => {
                flush!();
                let (part, next) = parse_backtick(&chars, i, false, line)?;
                parts.push(part);
                i = next;
            }
            '\\' if i + 1 < chars.len() => {
                flush!();
                parts.push(WordPart::Literal {
                    text: chars[i + 1].to_string(),
                    quoted: true,
                });
                i += 2;
            }
            c => {
                lit.push(c);
                i += 1;
            }
        }
    }
    if !lit.is_empty() {
        parts.push(WordPart::Literal {
            text: lit,
            quoted: false,
        });
    }
    Ok(Word { parts })
}

/// Parse one `$`-construct starting at `chars[start] == '$'`.
/// Returns the part and the index just past it.
fn parse_dollar(
    chars: &[char],
    start: usize,
    quoted: bool,
    line: usize,
) -> Result<(WordPart, usize)> {
    let i = start + 1;
    match chars.get(i) {
        Some('(') => {
            let (inner, end) = scan_balanced(chars, i, '(', ')', line)?;
            // `$(( ... ))` is arithmetic; `$( (cmd) )` is a substitution.
            if inner.starts_with('(') && inner.ends_with(')') {
                let expr: String = inner[1..inner.len() - 1].to_string();
                Ok((WordPart::Arith { expr, quoted }, end))
            } else {
                let script = Parser::new(&inner).parse()?;
                Ok((WordPart::CmdSub { script, quoted }, end))
            }
        }
        Some('{') => {
            let (inner, end) = scan_balanced(chars, i, '{', '}', line)?;
            let exp = parse_param_content(&inner, line)?;
            Ok((WordPart::Param { exp, quoted }, end))
        }
        Some(&c) if matches!(c, '?' | '#' | '@' | '*' | '!' | '$' | '-') => Ok((
            WordPart::Param {
                exp: ParamExp::plain(c.to_string()),
                quoted,
            },
            i + 1,
        )),
        Some(&c) if c.is_ascii_digit() => Ok((
            WordPart::Param {
                exp: ParamExp::plain(c.to_string()),
                quoted,
            },
            i + 1,
        )),
        Some(&c) if c == '_' || c.is_ascii_alphabetic() => {
            let mut name = String::new();
            let mut j = i;
            while let Some(&c) = chars.get(j) {
                if c == '_' || c.is_ascii_alphanumeric() {
                    name.push(c);
                    j += 1;
                } else {
                    break;
                }
            }
            Ok((
                WordPart::Param {
                    exp: ParamExp::plain(name),
                    quoted,
                },
                j,
            ))
        }
        // A bare `$` is literal.
        _ => Ok((
            WordPart::Literal {
                text: "$".to_string(),
                quoted,
            },
            i,
        )),
    }
}

fn parse_backtick(
    chars: &[char],
    start: usize,
    quoted: bool,
    line: usize,
) -> Result<(WordPart, usize)> {
    let mut i = start + 1;
    let mut inner = String::new();
    while i < chars.len() {
        match chars[i] {
            '`' => {
                let script = Parser::new(&inner).parse()?;
                return Ok((WordPart::CmdSub { script, quoted }, i + 1));
            }
            '\\' if i + 1 < chars.len() && matches!(chars[i + 1], '`' | '$' | '\\') => {
                inner.push(chars[i + 1]);
                i += 2;
            }
            c => {
                inner.push(c);
                i += 1;
            }
        }
    }
    Err(Error::Syntax {
        line,
        message: "unterminated backtick substitution".into(),
    })
}

/// Scan a balanced `open...close` span starting at `chars[start] == open`,
/// respecting quotes. Returns the inner text and the index past the closer.
fn scan_balanced(
    chars: &[char],
    start: usize,
    open: char,
    close: char,
    line: usize,
) -> Result<(String, usize)> {
    let mut depth = 0usize;
    let mut i = start;
    let mut inner = String::new();
    while i < chars.len() {
        let c = chars[i];
        if c == open {
            depth += 1;
            if depth > 1 {
                inner.push(c);
            }
            i += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Ok((inner, i + 1));
            }
            inner.push(c);
            i += 1;
        } else if c == '\'' {
            inner.push(c);
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                inner.push(chars[i]);
                i += 1;
            }
            if i < chars.len() {
                inner.push('\'');
                i += 1;
            }
        } else if c == '\\' && i + 1 < chars.len() {
            inner.push(c);
            inner.push(chars[i + 1]);
            i += 2;
        } else {
            inner.push(c);
            i += 1;
        }
    }
    Err(Error::Syntax {
        line,
        message: format!("unterminated `{}...{}'", open, close),
    })
}

/// Parse the inside of `${ ... }`.
fn parse_param_content(content: &str, line: usize) -> Result<ParamExp> {
    if content.is_empty() {
        return Err(Error::Syntax {
            line,
            message: "bad substitution: ${}".into(),
        });
    }

    // ${#name} length; ${#} is $# itself.
    if let Some(rest) = content.strip_prefix('#') {
        if !rest.is_empty() {
            let (name, index) = split_subscript(rest);
            if is_param_name(&name) {
                return Ok(ParamExp {
                    name,
                    index,
                    op: ParamOp::Length,
                });
            }
        }
    }

    // ${!name} indirection, ${!prefix*}/${!prefix@} names, ${!arr[@]} keys.
    if let Some(rest) = content.strip_prefix('!') {
        if !rest.is_empty() {
            if let Some(prefix) = rest.strip_suffix('*').or_else(|| rest.strip_suffix('@')) {
                if is_valid_name(prefix) {
                    return Ok(ParamExp {
                        name: prefix.to_string(),
                        index: None,
                        op: ParamOp::NamesMatching,
                    });
                }
            }
            let (name, index) = split_subscript(rest);
            if matches!(index.as_deref(), Some("@") | Some("*")) {
                return Ok(ParamExp {
                    name,
                    index: None,
                    op: ParamOp::ArrayKeys,
                });
            }
            if is_param_name(&name) && index.is_none() {
                return Ok(ParamExp {
                    name,
                    index: None,
                    op: ParamOp::Indirect,
                });
            }
        }
    }

    // Name, optional subscript, then the operator.
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;
    let mut name = String::new();
    if matches!(chars[0], '?' | '#' | '@' | '*' | '!' | '$' | '-') {
        name.push(chars[0]);
        i = 1;
    } else {
        while i < chars.len() && (chars[i] == '_' || chars[i].is_ascii_alphanumeric()) {
            name.push(chars[i]);
            i += 1;
        }
    }
    if name.is_empty() {
        return Err(Error::Syntax {
            line,
            message: format!("bad substitution: ${{{}}}", content),
        });
    }

    let mut index = None;
    if chars.get(i) == Some(&'[') {
        let mut depth = 0usize;
        let mut sub = String::new();
        while i < chars.len() {
            match chars[i] {
                '[' => {
                    depth += 1;
                    if depth > 1 {
                        sub.push('[');
                    }
                }
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        i += 1;
                        break;
                    }
                    sub.push(']');
                }
                c => sub.push(c),
            }
            i += 1;
        }
        index = Some(sub);
    }

    let rest: String = chars[i..].iter().collect();
    let op = parse_param_op(&rest, line)?;
    Ok(ParamExp { name, index, op })
}

fn parse_param_op(rest: &str, line: usize) -> Result<ParamOp> {
    if rest.is_empty() {
        return Ok(ParamOp::None);
    }
    // Two-character operators first.
    if let Some(word) = rest.strip_prefix(":-") {
        return Ok(ParamOp::Default {
            word: word.to_string(),
            colon: true,
        });
    }
    if let Some(word) = rest.strip_prefix(":=") {
        return Ok(ParamOp::Assign {
            word: word.to_string(),
            colon: true,
        });
    }
    if let Some(word) = rest.strip_prefix(":+") {
        return Ok(ParamOp::Alt {
            word: word.to_string(),
            colon: true,
        });
    }
    if let Some(word) = rest.strip_prefix(":?") {
        return Ok(ParamOp::Error {
            word: word.to_string(),
            colon: true,
        });
    }
    if let Some(pattern) = rest.strip_prefix("##") {
        return Ok(ParamOp::RemovePrefix {
            pattern: pattern.to_string(),
            greedy: true,
        });
    }
    if let Some(pattern) = rest.strip_prefix("%%") {
        return Ok(ParamOp::RemoveSuffix {
            pattern: pattern.to_string(),
            greedy: true,
        });
    }
    if let Some(spec) = rest.strip_prefix("^^") {
        return Ok(ParamOp::Case {
            upper: true,
            all: true,
            pattern: spec.to_string(),
        });
    }
    if let Some(spec) = rest.strip_prefix(",,") {
        return Ok(ParamOp::Case {
            upper: false,
            all: true,
            pattern: spec.to_string(),
        });
    }

    let mut chars = rest.chars();
    let first = chars.next().expect("nonempty");
    let tail: String = chars.collect();
    match first {
        '-' => Ok(ParamOp::Default {
            word: tail,
            colon: false,
        }),
        '=' => Ok(ParamOp::Assign {
            word: tail,
            colon: false,
        }),
        '+' => Ok(ParamOp::Alt {
            word: tail,
            colon: false,
        }),
        '?' => Ok(ParamOp::Error {
            word: tail,
            colon: false,
        }),
        ':' => Ok(ParamOp::Substring { spec: tail }),
        '#' => Ok(ParamOp::RemovePrefix {
            pattern: tail,
            greedy: false,
        }),
        '%' => Ok(ParamOp::RemoveSuffix {
            pattern: tail,
            greedy: false,
        }),
        '^' => Ok(ParamOp::Case {
            upper: true,
            all: false,
            pattern: tail,
        }),
        ',' => Ok(ParamOp::Case {
            upper: false,
            all: false,
            pattern: tail,
        }),
        '/' => {
            let (anchor, body) = match tail.chars().next() {
                Some('/') => (None, &tail[1..]),
                Some('#') => (Some(ReplaceAnchor::Prefix), &tail[1..]),
                Some('%') => (Some(ReplaceAnchor::Suffix), &tail[1..]),
                _ => (None, tail.as_str()),
            };
            let all = tail.starts_with('/');
            let (pattern, replacement) = split_replacement(body);
            Ok(ParamOp::Replace {
                pattern,
                replacement,
                all,
                anchor,
            })
        }
        '@' => match tail.chars().next() {
            Some(c) if tail.len() == 1 => Ok(ParamOp::Transform(c)),
            _ => Err(Error::Syntax {
                line,
                message: format!("bad substitution operator: @{}", tail),
            }),
        },
        _ => Err(Error::Syntax {
            line,
            message: format!("bad substitution operator: {}", rest),
        }),
    }
}

/// Split `pat/replacement` on the first unescaped `/`.
fn split_replacement(body: &str) -> (String, String) {
    let mut pattern = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                pattern.push('\\');
                if let Some(n) = chars.next() {
                    pattern.push(n);
                }
            }
            '/' => return (pattern, chars.collect()),
            _ => pattern.push(c),
        }
    }
    (pattern, String::new())
}

fn split_subscript(text: &str) -> (String, Option<String>) {
    match text.find('[') {
        Some(open) if text.ends_with(']') => (
            text[..open].to_string(),
            Some(text[open + 1..text.len() - 1].to_string()),
        ),
        _ => (text.to_string(), None),
    }
}

fn is_param_name(name: &str) -> bool {
    is_valid_name(name)
        || matches!(name, "?" | "#" | "@" | "*" | "!" | "$" | "-")
        || name.chars().all(|c| c.is_ascii_digit())
}

/// Decode `$'...'` ANSI-C escapes; returns the text and index past the quote.
fn decode_ansi_c(chars: &[char], start: usize) -> (String, usize) {
    let mut out = String::new();
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '\'' => return (out, i + 1),
            '\\' if i + 1 < chars.len() => {
                let c = chars[i + 1];
                i += 2;
                match c {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'a' => out.push('\x07'),
                    'b' => out.push('\x08'),
                    'e' | 'E' => out.push('\x1b'),
                    'f' => out.push('\x0c'),
                    'v' => out.push('\x0b'),
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    '0' => out.push('\0'),
                    'x' => {
                        let mut hex = String::new();
                        while hex.len() < 2
                            && chars.get(i).is_some_and(|c| c.is_ascii_hexdigit())
                        {
                            hex.push(chars[i]);
                            i += 1;
                        }
                        if let Ok(v) = u8::from_str_radix(&hex, 16) {
                            out.push(v as char);
                        }
                    }
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    (out, i)
}

/// Parse a here-doc body: expansions happen, quotes are literal characters.
fn parse_heredoc_body(text: &str, line: usize) -> Result<Word> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut lit = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() && matches!(chars[i + 1], '$' | '`' | '\\') => {
                lit.push(chars[i + 1]);
                i += 2;
            }
            '$' => {
                if !lit.is_empty() {
                    parts.push(WordPart::Literal {
                        text: std::mem::take(&mut lit),
                        quoted: true,
                    });
                }
                let (part, next) = parse_dollar(&chars, i, true, line)?;
                parts.push(part);
                i = next;
            }
            '`' => {
                if !lit.is_empty() {
                    parts.push(WordPart::Literal {
                        text: std::mem::take(&mut lit),
                        quoted: true,
                    });
                }
                let (part, next) = parse_backtick(&chars, i, true, line)?;
                parts.push(part);
                i = next;
            }
            c => {
                lit.push(c);
                i += 1;
            }
        }
    }
    if !lit.is_empty() {
        parts.push(WordPart::Literal {
            text: lit,
            quoted: true,
        });
    }
    Ok(Word { parts })
}

/// Parse an expansion operand (the word after `:-`, `:=`, ...) lazily.
pub(crate) fn parse_operand_word(raw: &str) -> Result<Word> {
    parse_word(raw, 0)
}

/// Parse free text where `$`/backtick expansions apply but quote characters
/// are ordinary (arithmetic expression bodies).
pub(crate) fn parse_expansion_text(text: &str) -> Result<Word> {
    parse_heredoc_body(text, 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Script {
        Parser::new(input).parse().unwrap()
    }

    fn first_simple(script: &Script) -> &SimpleCommand {
        match &script.items[0].command {
            Command::Simple(cmd) => cmd,
            other => panic!("expected simple command, got {:?}", other),
        }
    }

    #[test]
    fn simple_command_words() {
        let script = parse("echo hello world");
        let cmd = first_simple(&script);
        assert_eq!(cmd.words.len(), 3);
        assert_eq!(cmd.words[0].as_literal(), Some("echo"));
    }

    #[test]
    fn assignments_before_command() {
        let script = parse("FOO=bar BAZ=qux env");
        let cmd = first_simple(&script);
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[0].name, "FOO");
        assert_eq!(cmd.words.len(), 1);
    }

    #[test]
    fn assignment_after_command_word_is_a_word() {
        let script = parse("echo FOO=bar");
        let cmd = first_simple(&script);
        assert!(cmd.assignments.is_empty());
        assert_eq!(cmd.words.len(), 2);
    }

    #[test]
    fn array_assignment() {
        let script = parse("arr=(a b c)");
        let cmd = first_simple(&script);
        match &cmd.assignments[0].value {
            AssignValue::Array(words) => assert_eq!(words.len(), 3),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn append_assignment() {
        let script = parse("x+=more");
        let cmd = first_simple(&script);
        assert!(cmd.assignments[0].append);
    }

    #[test]
    fn pipeline_structure() {
        let script = parse("a | b | c");
        match &script.items[0].command {
            Command::Pipeline(p) => {
                assert!(!p.negated);
                assert_eq!(p.commands.len(), 3);
            }
            other => panic!("expected pipeline, got {:?}", other),
        }
    }

    #[test]
    fn negated_pipeline() {
        let script = parse("! true");
        match &script.items[0].command {
            Command::Pipeline(p) => assert!(p.negated),
            other => panic!("expected pipeline, got {:?}", other),
        }
    }

    #[test]
    fn andor_list() {
        let script = parse("a && b || c");
        match &script.items[0].command {
            Command::List(list) => {
                assert_eq!(list.rest.len(), 2);
                assert_eq!(list.rest[0].0, AndOr::And);
                assert_eq!(list.rest[1].0, AndOr::Or);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn background_item() {
        let script = parse("sleep 5 & echo hi");
        assert!(script.items[0].background);
        assert!(!script.items[1].background);
    }

    #[test]
    fn if_elif_else() {
        let script = parse("if a; then b; elif c; then d; else e; fi");
        match &script.items[0].command {
            Command::Compound(CompoundCommand::If { elifs, els, .. }, _) => {
                assert_eq!(elifs.len(), 1);
                assert!(els.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn while_and_until() {
        parse("while true; do echo hi; done");
        parse("until false; do echo hi; done");
    }

    #[test]
    fn for_in_words() {
        let script = parse("for x in a b c; do echo $x; done");
        match &script.items[0].command {
            Command::Compound(CompoundCommand::For { var, words, .. }, _) => {
                assert_eq!(var, "x");
                assert_eq!(words.as_ref().unwrap().len(), 3);
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn for_without_in_iterates_positionals() {
        let script = parse("for x; do echo $x; done");
        match &script.items[0].command {
            Command::Compound(CompoundCommand::For { words, .. }, _) => assert!(words.is_none()),
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn c_style_for() {
        let script = parse("for ((i=0; i<5; i++)); do echo $i; done");
        match &script.items[0].command {
            Command::Compound(CompoundCommand::CFor { init, cond, step, .. }, _) => {
                assert_eq!(init, "i=0");
                assert_eq!(cond, "i<5");
                assert_eq!(step, "i++");
            }
            other => panic!("expected c-for, got {:?}", other),
        }
    }

    #[test]
    fn case_with_terminators() {
        let script = parse("case $x in a) echo a ;; b|c) echo bc ;& d) echo d ;;& *) echo rest ;; esac");
        match &script.items[0].command {
            Command::Compound(CompoundCommand::Case { arms, .. }, _) => {
                assert_eq!(arms.len(), 4);
                assert_eq!(arms[0].terminator, CaseTerm::Break);
                assert_eq!(arms[1].patterns.len(), 2);
                assert_eq!(arms[1].terminator, CaseTerm::FallThrough);
                assert_eq!(arms[2].terminator, CaseTerm::Continue);
            }
            other => panic!("expected case, got {:?}", other),
        }
    }

    #[test]
    fn subshell_and_group() {
        let script = parse("(cd /tmp; pwd)");
        assert!(matches!(
            script.items[0].command,
            Command::Compound(CompoundCommand::Subshell(_), _)
        ));
        let script = parse("{ echo a; echo b; }");
        assert!(matches!(
            script.items[0].command,
            Command::Compound(CompoundCommand::Group(_), _)
        ));
    }

    #[test]
    fn function_definitions() {
        let script = parse("greet() { echo hi; }");
        match &script.items[0].command {
            Command::FunctionDef(def) => assert_eq!(def.name, "greet"),
            other => panic!("expected function, got {:?}", other),
        }
        let script = parse("function greet { echo hi; }");
        assert!(matches!(script.items[0].command, Command::FunctionDef(_)));
    }

    #[test]
    fn redirects_with_fd() {
        let script = parse("cmd 2>err.log >out.log <in.txt");
        let cmd = first_simple(&script);
        assert_eq!(cmd.redirects.len(), 3);
        assert_eq!(cmd.redirects[0].fd, Some(2));
        assert_eq!(cmd.redirects[0].kind, RedirectKind::Out);
        assert_eq!(cmd.redirects[2].kind, RedirectKind::In);
    }

    #[test]
    fn dup_redirect() {
        let script = parse("cmd 2>&1");
        let cmd = first_simple(&script);
        assert_eq!(cmd.redirects[0].fd, Some(2));
        assert_eq!(cmd.redirects[0].kind, RedirectKind::DupOut);
        assert_eq!(cmd.redirects[0].target.as_literal(), Some("1"));
    }

    #[test]
    fn heredoc_body_captured() {
        let script = parse("cat <<EOF\nhello $x\nEOF\n");
        let cmd = first_simple(&script);
        let body = cmd.redirects[0].heredoc_body.as_ref().unwrap();
        // Unquoted delimiter: the body expands parameters.
        assert!(body.parts.len() >= 2);
    }

    #[test]
    fn quoted_heredoc_is_literal() {
        let script = parse("cat <<'EOF'\nhello $x\nEOF\n");
        let cmd = first_simple(&script);
        let body = cmd.redirects[0].heredoc_body.as_ref().unwrap();
        assert_eq!(body.parts.len(), 1);
        assert!(matches!(
            &body.parts[0],
            WordPart::Literal { text, quoted: true } if text == "hello $x\n"
        ));
    }

    #[test]
    fn heredoc_followed_by_more_redirects() {
        let script = parse("cat <<EOF >out\nbody\nEOF\n");
        let cmd = first_simple(&script);
        assert_eq!(cmd.redirects.len(), 2);
        assert!(cmd.redirects[0].heredoc_body.is_some());
        assert_eq!(cmd.redirects[1].kind, RedirectKind::Out);
    }

    #[test]
    fn word_quoting_parts() {
        let word = parse_word("a'b c'\"d $e\"f", 1).unwrap();
        assert_eq!(word.parts.len(), 5);
        assert!(matches!(&word.parts[0], WordPart::Literal { text, quoted: false } if text == "a"));
        assert!(matches!(&word.parts[1], WordPart::Literal { text, quoted: true } if text == "b c"));
        assert!(matches!(&word.parts[2], WordPart::Literal { text, quoted: true } if text == "d "));
        assert!(matches!(&word.parts[3], WordPart::Param { quoted: true, .. }));
        assert!(matches!(&word.parts[4], WordPart::Literal { text, quoted: false } if text == "f"));
    }

    #[test]
    fn empty_quotes_survive_as_a_part() {
        let word = parse_word("\"\"", 1).unwrap();
        assert_eq!(word.parts.len(), 1);
        assert!(matches!(
            &word.parts[0],
            WordPart::Literal { text, quoted: true } if text.is_empty()
        ));
    }

    #[test]
    fn command_substitution_parses_inner_script() {
        let word = parse_word("$(echo hi | cat)", 1).unwrap();
        match &word.parts[0] {
            WordPart::CmdSub { script, .. } => assert_eq!(script.items.len(), 1),
            other => panic!("expected cmdsub, got {:?}", other),
        }
    }

    #[test]
    fn arithmetic_expansion_word() {
        let word = parse_word("$((1 + 2))", 1).unwrap();
        assert!(matches!(
            &word.parts[0],
            WordPart::Arith { expr, .. } if expr == "1 + 2"
        ));
    }

    #[test]
    fn param_operators() {
        let word = parse_word("${x:-default}", 1).unwrap();
        match &word.parts[0] {
            WordPart::Param { exp, .. } => {
                assert_eq!(exp.name, "x");
                assert!(matches!(&exp.op, ParamOp::Default { word, colon: true } if word == "default"));
            }
            other => panic!("expected param, got {:?}", other),
        }

        let word = parse_word("${#arr[@]}", 1).unwrap();
        match &word.parts[0] {
            WordPart::Param { exp, .. } => {
                assert_eq!(exp.name, "arr");
                assert_eq!(exp.index.as_deref(), Some("@"));
                assert!(matches!(exp.op, ParamOp::Length));
            }
            other => panic!("expected param, got {:?}", other),
        }

        let word = parse_word("${path##*/}", 1).unwrap();
        match &word.parts[0] {
            WordPart::Param { exp, .. } => {
                assert!(matches!(
                    &exp.op,
                    ParamOp::RemovePrefix { pattern, greedy: true } if pattern == "*/"
                ));
            }
            other => panic!("expected param, got {:?}", other),
        }

        let word = parse_word("${x//a/b}", 1).unwrap();
        match &word.parts[0] {
            WordPart::Param { exp, .. } => {
                assert!(matches!(
                    &exp.op,
                    ParamOp::Replace { pattern, replacement, all: true, .. }
                        if pattern == "a" && replacement == "b"
                ));
            }
            other => panic!("expected param, got {:?}", other),
        }
    }

    #[test]
    fn special_params() {
        for special in ["$?", "$#", "$@", "$*", "$$", "$!", "$0", "$1"] {
            let word = parse_word(special, 1).unwrap();
            assert!(
                matches!(&word.parts[0], WordPart::Param { .. }),
                "{} should be a parameter",
                special
            );
        }
    }

    #[test]
    fn ansi_c_quoting() {
        let word = parse_word("$'a\\tb\\n'", 1).unwrap();
        assert!(matches!(
            &word.parts[0],
            WordPart::Literal { text, quoted: true } if text == "a\tb\n"
        ));
    }

    #[test]
    fn double_bracket_conditional() {
        let script = parse("[[ -n $x && $y == foo* ]]");
        match &script.items[0].command {
            Command::Compound(CompoundCommand::Cond(words), _) => {
                assert_eq!(words.len(), 6);
            }
            other => panic!("expected cond, got {:?}", other),
        }
    }

    #[test]
    fn arith_command() {
        let script = parse("((x = 3 + 4))");
        assert!(matches!(
            &script.items[0].command,
            Command::Compound(CompoundCommand::Arith(e), _) if e == "x = 3 + 4"
        ));
    }

    #[test]
    fn syntax_error_reports_line() {
        let err = Parser::new("echo hi\nif true; then\n").parse().unwrap_err();
        match err {
            Error::Syntax { line, .. } => assert!(line >= 2),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn print_parse_round_trip() {
        for src in [
            "echo hello world",
            "a=1 b=2 cmd arg",
            "a | b | c",
            "a && b || c",
            "if true; then echo y; else echo n; fi",
            "for x in 1 2 3; do echo $x; done",
            "while true; do break; done",
            "case $x in a) echo a ;; *) echo b ;; esac",
            "(cd /tmp)",
            "{ echo grouped; }",
            "echo ${x:-fallback} $((1 + 2)) $(echo nested)",
            "f() { echo body; }",
        ] {
            let first = Parser::new(src).parse().unwrap();
            let printed = first.to_string();
            let second = Parser::new(&printed).parse().unwrap();
            assert_eq!(first, second, "round trip failed for {:?} -> {:?}", src, printed);
        }
    }
}
