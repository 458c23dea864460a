//! AST types for parsed shell scripts
//!
//! A closed family of node kinds; the evaluator is an exhaustive match over
//! these. Word parts keep their quoting so the expander can preserve quoted
//! bytes through field splitting.

use std::fmt;

/// A complete script: newline/semicolon-separated items.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub items: Vec<ListItem>,
}

/// One list element plus its separator's effect (`&` backgrounds it).
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub command: Command,
    pub background: bool,
}

/// A single command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Simple(SimpleCommand),
    Pipeline(Pipeline),
    /// `a && b || c` chains.
    List(CommandList),
    Compound(CompoundCommand, Vec<Redirect>),
    FunctionDef(FunctionDef),
}

/// A simple command: assignments, words and redirections in source order.
/// The command name is whatever the first expanded field turns out to be.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleCommand {
    pub assignments: Vec<Assignment>,
    pub words: Vec<Word>,
    pub redirects: Vec<Redirect>,
}

/// `cmd | cmd | cmd`, possibly negated with a leading `!`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub negated: bool,
    pub commands: Vec<Command>,
}

/// `&&`/`||` chain; left-associative, equal precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandList {
    pub first: Box<Command>,
    pub rest: Vec<(AndOr, Command)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndOr {
    And,
    Or,
}

/// Compound commands (control structures).
#[derive(Debug, Clone, PartialEq)]
pub enum CompoundCommand {
    If {
        cond: Script,
        then: Script,
        elifs: Vec<(Script, Script)>,
        els: Option<Script>,
    },
    While {
        cond: Script,
        body: Script,
    },
    Until {
        cond: Script,
        body: Script,
    },
    For {
        var: String,
        /// `None` means iterate `"$@"`.
        words: Option<Vec<Word>>,
        body: Script,
    },
    /// C-style `for ((init; cond; step))`.
    CFor {
        init: String,
        cond: String,
        step: String,
        body: Script,
    },
    Case {
        subject: Word,
        arms: Vec<CaseArm>,
    },
    Subshell(Script),
    Group(Script),
    /// `(( expr ))` arithmetic command.
    Arith(String),
    /// `[[ ... ]]` conditional; tokens kept as words.
    Cond(Vec<Word>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub patterns: Vec<Word>,
    pub body: Script,
    pub terminator: CaseTerm,
}

/// How a case arm ends: `;;` stops, `;&` falls through, `;;&` keeps testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTerm {
    Break,
    FallThrough,
    Continue,
}

/// Function definition (`name()` or `function name`).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub body: Box<Command>,
}

/// Variable assignment, scalar or array.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    /// Subscript text for `arr[i]=x`; evaluated at assignment time.
    pub index: Option<String>,
    pub value: AssignValue,
    pub append: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
    Scalar(Word),
    /// `a=(w1 w2 ...)`; elements may carry `[k]=v` subscripts.
    Array(Vec<Word>),
}

/// I/O redirection.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    /// Explicit descriptor (`2>`); defaults per kind.
    pub fd: Option<u32>,
    pub kind: RedirectKind,
    /// Filename, dup target, here-string word or here-doc delimiter.
    pub target: Word,
    /// Body for here-docs, filled once the opening line's newline is seen.
    pub heredoc_body: Option<Word>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `<`
    In,
    /// `>`
    Out,
    /// `>>`
    Append,
    /// `<<` / `<<-`
    HereDoc { strip_tabs: bool, quoted: bool },
    /// `<<<`
    HereString,
    /// `<&`
    DupIn,
    /// `>&`
    DupOut,
    /// `&>`
    OutErr,
    /// `&>>`
    OutErrAppend,
}

impl RedirectKind {
    /// The descriptor the redirect applies to when none is written.
    pub fn default_fd(&self) -> u32 {
        match self {
            RedirectKind::In
            | RedirectKind::HereDoc { .. }
            | RedirectKind::HereString
            | RedirectKind::DupIn => 0,
            _ => 1,
        }
    }
}

/// A word: a sequence of parts, each knowing whether it was quoted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word {
    pub parts: Vec<WordPart>,
}

impl Word {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            parts: vec![WordPart::Literal {
                text: text.into(),
                quoted: false,
            }],
        }
    }

    /// The word's text if it is a single literal, quoted or not.
    pub fn as_literal(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [WordPart::Literal { text, .. }] => Some(text),
            [] => Some(""),
            _ => None,
        }
    }

    /// True when every part is quoted (the word can never split or glob).
    pub fn fully_quoted(&self) -> bool {
        self.parts.iter().all(|p| match p {
            WordPart::Literal { quoted, .. }
            | WordPart::Param { quoted, .. }
            | WordPart::CmdSub { quoted, .. }
            | WordPart::Arith { quoted, .. } => *quoted,
        })
    }
}

/// Parts of a word.
#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    Literal {
        text: String,
        quoted: bool,
    },
    Param {
        exp: ParamExp,
        quoted: bool,
    },
    /// `$( ... )` or backticks; parsed eagerly.
    CmdSub {
        script: Script,
        quoted: bool,
    },
    /// `$(( ... ))`; the expression text is evaluated at expansion time.
    Arith {
        expr: String,
        quoted: bool,
    },
}

/// A `${...}` (or bare `$name`) expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamExp {
    /// Variable name, positional digit string, or special (`@ * # ? $ ! - 0`).
    pub name: String,
    /// Raw subscript for `${arr[...]}`.
    pub index: Option<String>,
    pub op: ParamOp,
}

impl ParamExp {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
            op: ParamOp::None,
        }
    }
}

/// Operators inside `${...}`. Operand words are kept raw and expanded lazily.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamOp {
    None,
    /// `${#x}` / `${#arr[@]}`
    Length,
    /// `:-` (with colon) or `-`
    Default { word: String, colon: bool },
    /// `:=` / `=`
    Assign { word: String, colon: bool },
    /// `:+` / `+`
    Alt { word: String, colon: bool },
    /// `:?` / `?`
    Error { word: String, colon: bool },
    /// `${x:off}` / `${x:off:len}`; raw spec after the first colon.
    Substring { spec: String },
    /// `#` / `##`
    RemovePrefix { pattern: String, greedy: bool },
    /// `%` / `%%`
    RemoveSuffix { pattern: String, greedy: bool },
    /// `/pat/rep`, `//pat/rep`, `/#pat/rep`, `/%pat/rep`
    Replace {
        pattern: String,
        replacement: String,
        all: bool,
        anchor: Option<ReplaceAnchor>,
    },
    /// `^ ^^ , ,,` with optional pattern
    Case {
        upper: bool,
        all: bool,
        pattern: String,
    },
    /// `${!x}`
    Indirect,
    /// `${!prefix*}` / `${!prefix@}`
    NamesMatching,
    /// `${!arr[@]}` / `${!arr[*]}`
    ArrayKeys,
    /// `${x@Q}` and friends
    Transform(char),
}

impl fmt::Display for Word {
    /// Canonical printable form; parses back to an equivalent word.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                WordPart::Literal { text, quoted } => {
                    if *quoted {
                        write!(f, "'{}'", text.replace('\'', "'\\''"))?;
                    } else {
                        write!(f, "{}", text)?;
                    }
                }
                WordPart::Param { exp, quoted } => {
                    let body = format_param(exp);
                    if *quoted {
                        write!(f, "\"{}\"", body)?;
                    } else {
                        write!(f, "{}", body)?;
                    }
                }
                WordPart::CmdSub { script, quoted } => {
                    let body = format!("$({})", script);
                    if *quoted {
                        write!(f, "\"{}\"", body)?;
                    } else {
                        write!(f, "{}", body)?;
                    }
                }
                WordPart::Arith { expr, quoted } => {
                    let body = format!("$(({}))", expr);
                    if *quoted {
                        write!(f, "\"{}\"", body)?;
                    } else {
                        write!(f, "{}", body)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn format_param(exp: &ParamExp) -> String {
    let mut name = exp.name.clone();
    if let Some(index) = &exp.index {
        name = format!("{}[{}]", name, index);
    }
    let colon = |c: bool| if c { ":" } else { "" };
    match &exp.op {
        ParamOp::None => format!("${{{}}}", name),
        ParamOp::Length => format!("${{#{}}}", name),
        ParamOp::Default { word, colon: c } => format!("${{{}{}-{}}}", name, colon(*c), word),
        ParamOp::Assign { word, colon: c } => format!("${{{}{}={}}}", name, colon(*c), word),
        ParamOp::Alt { word, colon: c } => format!("${{{}{}+{}}}", name, colon(*c), word),
        ParamOp::Error { word, colon: c } => format!("${{{}{}?{}}}", name, colon(*c), word),
        ParamOp::Substring { spec } => format!("${{{}:{}}}", name, spec),
        ParamOp::RemovePrefix { pattern, greedy } => {
            format!("${{{}{}{}}}", name, if *greedy { "##" } else { "#" }, pattern)
        }
        ParamOp::RemoveSuffix { pattern, greedy } => {
            format!("${{{}{}{}}}", name, if *greedy { "%%" } else { "%" }, pattern)
        }
        ParamOp::Replace {
            pattern,
            replacement,
            all,
            anchor,
        } => {
            let lead = match (all, anchor) {
                (true, _) => "//".to_string(),
                (false, Some(ReplaceAnchor::Prefix)) => "/#".to_string(),
                (false, Some(ReplaceAnchor::Suffix)) => "/%".to_string(),
                (false, None) => "/".to_string(),
            };
            format!("${{{}{}{}/{}}}", name, lead, pattern, replacement)
        }
        ParamOp::Case {
            upper,
            all,
            pattern,
        } => {
            let op = match (upper, all) {
                (true, true) => "^^",
                (true, false) => "^",
                (false, true) => ",,",
                (false, false) => ",",
            };
            format!("${{{}{}{}}}", name, op, pattern)
        }
        ParamOp::Indirect => format!("${{!{}}}", name),
        ParamOp::NamesMatching => format!("${{!{}*}}", exp.name),
        ParamOp::ArrayKeys => format!("${{!{}[@]}}", exp.name),
        ParamOp::Transform(c) => format!("${{{}@{}}}", name, c),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceAnchor {
    Prefix,
    Suffix,
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", item.command)?;
            if item.background {
                write!(f, " &")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Simple(cmd) => {
                let mut first = true;
                for a in &cmd.assignments {
                    if !first {
                        write!(f, " ")?;
                    }
                    first = false;
                    write!(f, "{}", a)?;
                }
                for w in &cmd.words {
                    if !first {
                        write!(f, " ")?;
                    }
                    first = false;
                    write!(f, "{}", w)?;
                }
                for r in &cmd.redirects {
                    if !first {
                        write!(f, " ")?;
                    }
                    first = false;
                    write!(f, "{}", r)?;
                }
                Ok(())
            }
            Command::Pipeline(p) => {
                if p.negated {
                    write!(f, "! ")?;
                }
                for (i, c) in p.commands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", c)?;
                }
                Ok(())
            }
            Command::List(list) => {
                write!(f, "{}", list.first)?;
                for (op, cmd) in &list.rest {
                    let sep = match op {
                        AndOr::And => " && ",
                        AndOr::Or => " || ",
                    };
                    write!(f, "{}{}", sep, cmd)?;
                }
                Ok(())
            }
            Command::Compound(compound, redirects) => {
                write!(f, "{}", compound)?;
                for r in redirects {
                    write!(f, " {}", r)?;
                }
                Ok(())
            }
            Command::FunctionDef(def) => write!(f, "{}() {}", def.name, def.body),
        }
    }
}

impl fmt::Display for CompoundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompoundCommand::If {
                cond,
                then,
                elifs,
                els,
            } => {
                write!(f, "if {}; then {}", cond, then)?;
                for (c, b) in elifs {
                    write!(f, "; elif {}; then {}", c, b)?;
                }
                if let Some(els) = els {
                    write!(f, "; else {}", els)?;
                }
                write!(f, "; fi")
            }
            CompoundCommand::While { cond, body } => {
                write!(f, "while {}; do {}; done", cond, body)
            }
            CompoundCommand::Until { cond, body } => {
                write!(f, "until {}; do {}; done", cond, body)
            }
            CompoundCommand::For { var, words, body } => {
                write!(f, "for {}", var)?;
                if let Some(words) = words {
                    write!(f, " in")?;
                    for w in words {
                        write!(f, " {}", w)?;
                    }
                }
                write!(f, "; do {}; done", body)
            }
            CompoundCommand::CFor {
                init,
                cond,
                step,
                body,
            } => write!(f, "for (({}; {}; {})); do {}; done", init, cond, step, body),
            CompoundCommand::Case { subject, arms } => {
                write!(f, "case {} in", subject)?;
                for arm in arms {
                    write!(f, " ")?;
                    for (i, p) in arm.patterns.iter().enumerate() {
                        if i > 0 {
                            write!(f, "|")?;
                        }
                        write!(f, "{}", p)?;
                    }
                    write!(f, ") {}", arm.body)?;
                    match arm.terminator {
                        CaseTerm::Break => write!(f, " ;;")?,
                        CaseTerm::FallThrough => write!(f, " ;&")?,
                        CaseTerm::Continue => write!(f, " ;;&")?,
                    }
                }
                write!(f, " esac")
            }
            CompoundCommand::Subshell(s) => write!(f, "({})", s),
            CompoundCommand::Group(s) => write!(f, "{{ {}; }}", s),
            CompoundCommand::Arith(expr) => write!(f, "(({}))", expr),
            CompoundCommand::Cond(words) => {
                write!(f, "[[")?;
                for w in words {
                    write!(f, " {}", w)?;
                }
                write!(f, " ]]")
            }
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(index) = &self.index {
            write!(f, "[{}]", index)?;
        }
        write!(f, "{}=", if self.append { "+" } else { "" })?;
        match &self.value {
            AssignValue::Scalar(w) => write!(f, "{}", w),
            AssignValue::Array(words) => {
                write!(f, "(")?;
                for (i, w) in words.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", w)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(fd) = self.fd {
            write!(f, "{}", fd)?;
        }
        let op = match self.kind {
            RedirectKind::In => "<",
            RedirectKind::Out => ">",
            RedirectKind::Append => ">>",
            RedirectKind::HereDoc { .. } => "<<",
            RedirectKind::HereString => "<<<",
            RedirectKind::DupIn => "<&",
            RedirectKind::DupOut => ">&",
            RedirectKind::OutErr => "&>",
            RedirectKind::OutErrAppend => "&>>",
        };
        write!(f, "{}{}", op, self.target)
    }
}
