//! Arithmetic evaluation for `$(( ))`, `(( ))`, `let` and C-style `for`.
//!
//! Integer-only, 64-bit two's complement with wrapping overflow. A recursive
//! descent evaluator with short-circuit `&&`/`||`/`?:` (the untaken side is
//! parsed but produces no side effects or errors).

use crate::error::{Error, Result};
use crate::interpreter::ShellState;

/// Evaluate an expression against the shell's variables.
pub fn eval(expr: &str, state: &mut ShellState) -> Result<i64> {
    let mut parser = ArithParser::new(expr, state);
    if parser.peek_token()?.is_none() {
        return Ok(0); // empty expression (e.g. a bare `for ((;;))` slot)
    }
    let value = parser.comma(true)?;
    if parser.peek_token()?.is_some() {
        return Err(parser.err("trailing tokens"));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(i64),
    Name(String),
    Op(&'static str),
}

struct ArithParser<'a> {
    chars: Vec<char>,
    pos: usize,
    lookahead: Option<Option<Tok>>,
    state: &'a mut ShellState,
}

const OPS: &[&str] = &[
    "<<=", ">>=", "**", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=",
    "*=", "/=", "%=", "&=", "^=", "|=", "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "&",
    "^", "|", "?", ":", "(", ")", ",",
];

impl<'a> ArithParser<'a> {
    fn new(expr: &str, state: &'a mut ShellState) -> Self {
        Self {
            chars: expr.chars().collect(),
            pos: 0,
            lookahead: None,
            state,
        }
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::Arith(message.into())
    }

    fn peek_token(&mut self) -> Result<Option<Tok>> {
        if self.lookahead.is_none() {
            let tok = self.lex()?;
            self.lookahead = Some(tok);
        }
        Ok(self.lookahead.clone().expect("filled above"))
    }

    fn next_token(&mut self) -> Result<Option<Tok>> {
        let tok = self.peek_token()?;
        self.lookahead = None;
        Ok(tok)
    }

    fn eat_op(&mut self, op: &str) -> Result<bool> {
        if matches!(self.peek_token()?, Some(Tok::Op(o)) if o == op) {
            self.next_token()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect_op(&mut self, op: &'static str) -> Result<()> {
        if !self.eat_op(op)? {
            return Err(self.err(format!("expected `{}'", op)));
        }
        Ok(())
    }

    fn lex(&mut self) -> Result<Option<Tok>> {
        while matches!(self.chars.get(self.pos), Some(' ') | Some('\t') | Some('\n')) {
            self.pos += 1;
        }
        let c = match self.chars.get(self.pos) {
            Some(&c) => c,
            None => return Ok(None),
        };
        if c.is_ascii_digit() {
            return self.lex_number().map(Some);
        }
        if c == '_' || c.is_ascii_alphabetic() {
            let mut name = String::new();
            while let Some(&c) = self.chars.get(self.pos) {
                if c == '_' || c.is_ascii_alphanumeric() {
                    name.push(c);
                    self.pos += 1;
                } else {
                    break;
                }
            }
            return Ok(Some(Tok::Name(name)));
        }
        for op in OPS {
            let end = self.pos + op.len();
            if end <= self.chars.len()
                && self.chars[self.pos..end].iter().zip(op.chars()).all(|(a, b)| *a == b)
            {
                self.pos = end;
                return Ok(Some(Tok::Op(op)));
            }
        }
        Err(self.err(format!("invalid arithmetic token `{}'", c)))
    }

    fn lex_number(&mut self) -> Result<Tok> {
        let mut text = String::new();
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_ascii_alphanumeric() || c == '#' {
                text.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        parse_literal(&text).map(Tok::Num).ok_or_else(|| {
            self.err(format!("invalid arithmetic literal `{}'", text))
        })
    }

    /// Recursively resolve a bare name: numeric text, another name, or 0.
    fn get_var(&self, name: &str) -> i64 {
        let mut current = name.to_string();
        for _ in 0..16 {
            match self.state.get_scalar(&current) {
                Some(text) => {
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        return 0;
                    }
                    if let Some(v) = parse_literal(&text) {
                        return v;
                    }
                    if crate::parser::is_valid_name(&text) {
                        current = text;
                        continue;
                    }
                    return 0;
                }
                None => return 0,
            }
        }
        0
    }

    fn set_var(&mut self, name: &str, value: i64) -> Result<()> {
        self.state
            .scopes
            .set_scalar(name, value.to_string())
            .map_err(|e| self.err(e.to_string()))
    }

    // comma: lowest precedence, left-assoc, value of the last expression.
    fn comma(&mut self, active: bool) -> Result<i64> {
        let mut value = self.assign(active)?;
        while self.eat_op(",")? {
            value = self.assign(active)?;
        }
        Ok(value)
    }

    fn assign(&mut self, active: bool) -> Result<i64> {
        // Assignment needs an lvalue lookahead: NAME op= ...
        if let Some(Tok::Name(name)) = self.peek_token()? {
            let saved_pos = self.pos;
            let saved_look = self.lookahead.clone();
            self.next_token()?;
            let op = match self.peek_token()? {
                Some(Tok::Op(op))
                    if matches!(
                        op,
                        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "<<=" | ">>=" | "&=" | "^=" | "|="
                    ) =>
                {
                    op
                }
                _ => {
                    self.pos = saved_pos;
                    self.lookahead = saved_look;
                    return self.ternary(active);
                }
            };
            self.next_token()?;
            let rhs = self.assign(active)?;
            if !active {
                return Ok(rhs);
            }
            let value = match op {
                "=" => rhs,
                "+=" => self.get_var(&name).wrapping_add(rhs),
                "-=" => self.get_var(&name).wrapping_sub(rhs),
                "*=" => self.get_var(&name).wrapping_mul(rhs),
                "/=" => checked_div(self.get_var(&name), rhs).ok_or_else(|| self.err("division by zero"))?,
                "%=" => checked_rem(self.get_var(&name), rhs).ok_or_else(|| self.err("division by zero"))?,
                "<<=" => shift_left(self.get_var(&name), rhs),
                ">>=" => shift_right(self.get_var(&name), rhs),
                "&=" => self.get_var(&name) & rhs,
                "^=" => self.get_var(&name) ^ rhs,
                "|=" => self.get_var(&name) | rhs,
                _ => unreachable!(),
            };
            self.set_var(&name, value)?;
            return Ok(value);
        }
        self.ternary(active)
    }

    fn ternary(&mut self, active: bool) -> Result<i64> {
        let cond = self.logical_or(active)?;
        if self.eat_op("?")? {
            let take_then = cond != 0;
            let then = self.assign(active && take_then)?;
            self.expect_op(":")?;
            let els = self.assign(active && !take_then)?;
            return Ok(if take_then { then } else { els });
        }
        Ok(cond)
    }

    fn logical_or(&mut self, active: bool) -> Result<i64> {
        let mut left = self.logical_and(active)?;
        while self.eat_op("||")? {
            let right = self.logical_and(active && left == 0)?;
            left = i64::from(left != 0 || right != 0);
        }
        Ok(left)
    }

    fn logical_and(&mut self, active: bool) -> Result<i64> {
        let mut left = self.bit_or(active)?;
        while self.eat_op("&&")? {
            let right = self.bit_or(active && left != 0)?;
            left = i64::from(left != 0 && right != 0);
        }
        Ok(left)
    }

    fn bit_or(&mut self, active: bool) -> Result<i64> {
        let mut left = self.bit_xor(active)?;
        while matches!(self.peek_token()?, Some(Tok::Op("|"))) {
            self.next_token()?;
            left |= self.bit_xor(active)?;
        }
        Ok(left)
    }

    fn bit_xor(&mut self, active: bool) -> Result<i64> {
        let mut left = self.bit_and(active)?;
        while matches!(self.peek_token()?, Some(Tok::Op("^"))) {
            self.next_token()?;
            left ^= self.bit_and(active)?;
        }
        Ok(left)
    }

    fn bit_and(&mut self, active: bool) -> Result<i64> {
        let mut left = self.equality(active)?;
        while matches!(self.peek_token()?, Some(Tok::Op("&"))) {
            self.next_token()?;
            left &= self.equality(active)?;
        }
        Ok(left)
    }

    fn equality(&mut self, active: bool) -> Result<i64> {
        let mut left = self.relational(active)?;
        loop {
            if self.eat_op("==")? {
                left = i64::from(left == self.relational(active)?);
            } else if self.eat_op("!=")? {
                left = i64::from(left != self.relational(active)?);
            } else {
                return Ok(left);
            }
        }
    }

    fn relational(&mut self, active: bool) -> Result<i64> {
        let mut left = self.shift(active)?;
        loop {
            if self.eat_op("<=")? {
                left = i64::from(left <= self.shift(active)?);
            } else if self.eat_op(">=")? {
                left = i64::from(left >= self.shift(active)?);
            } else if self.eat_op("<")? {
                left = i64::from(left < self.shift(active)?);
            } else if self.eat_op(">")? {
                left = i64::from(left > self.shift(active)?);
            } else {
                return Ok(left);
            }
        }
    }

    fn shift(&mut self, active: bool) -> Result<i64> {
        let mut left = self.additive(active)?;
        loop {
            if self.eat_op("<<")? {
                left = shift_left(left, self.additive(active)?);
            } else if self.eat_op(">>")? {
                left = shift_right(left, self.additive(active)?);
            } else {
                return Ok(left);
            }
        }
    }

    fn additive(&mut self, active: bool) -> Result<i64> {
        let mut left = self.multiplicative(active)?;
        loop {
            if self.eat_op("+")? {
                left = left.wrapping_add(self.multiplicative(active)?);
            } else if self.eat_op("-")? {
                left = left.wrapping_sub(self.multiplicative(active)?);
            } else {
                return Ok(left);
            }
        }
    }

    fn multiplicative(&mut self, active: bool) -> Result<i64> {
        let mut left = self.power(active)?;
        loop {
            if self.eat_op("*")? {
                left = left.wrapping_mul(self.power(active)?);
            } else if self.eat_op("/")? {
                let rhs = self.power(active)?;
                if active {
                    left = checked_div(left, rhs).ok_or_else(|| self.err("division by zero"))?;
                }
            } else if self.eat_op("%")? {
                let rhs = self.power(active)?;
                if active {
                    left = checked_rem(left, rhs).ok_or_else(|| self.err("division by zero"))?;
                }
            } else {
                return Ok(left);
            }
        }
    }

    // `**` is right-associative.
    fn power(&mut self, active: bool) -> Result<i64> {
        let base = self.unary(active)?;
        if self.eat_op("**")? {
            let exp = self.power(active)?;
            if !active {
                return Ok(0);
            }
            if exp < 0 {
                return Err(self.err("exponent less than 0"));
            }
            let mut result: i64 = 1;
            for _ in 0..exp {
                result = result.wrapping_mul(base);
            }
            return Ok(result);
        }
        Ok(base)
    }

    fn unary(&mut self, active: bool) -> Result<i64> {
        if self.eat_op("!")? {
            return Ok(i64::from(self.unary(active)? == 0));
        }
        if self.eat_op("~")? {
            return Ok(!self.unary(active)?);
        }
        if self.eat_op("-")? {
            return Ok(self.unary(active)?.wrapping_neg());
        }
        if self.eat_op("+")? {
            return self.unary(active);
        }
        if self.eat_op("++")? {
            return self.prefix_incdec(active, 1);
        }
        if self.eat_op("--")? {
            return self.prefix_incdec(active, -1);
        }
        self.postfix(active)
    }

    fn prefix_incdec(&mut self, active: bool, delta: i64) -> Result<i64> {
        match self.next_token()? {
            Some(Tok::Name(name)) => {
                let value = self.get_var(&name).wrapping_add(delta);
                if active {
                    self.set_var(&name, value)?;
                }
                Ok(value)
            }
            _ => Err(self.err("expected variable name after ++/--")),
        }
    }

    fn postfix(&mut self, active: bool) -> Result<i64> {
        if let Some(Tok::Name(name)) = self.peek_token()? {
            self.next_token()?;
            if self.eat_op("++")? {
                let value = self.get_var(&name);
                if active {
                    self.set_var(&name, value.wrapping_add(1))?;
                }
                return Ok(value);
            }
            if self.eat_op("--")? {
                let value = self.get_var(&name);
                if active {
                    self.set_var(&name, value.wrapping_sub(1))?;
                }
                return Ok(value);
            }
            return Ok(self.get_var(&name));
        }
        match self.next_token()? {
            Some(Tok::Num(n)) => Ok(n),
            Some(Tok::Op("(")) => {
                let value = self.comma(active)?;
                self.expect_op(")")?;
                Ok(value)
            }
            Some(tok) => Err(self.err(format!("unexpected token {:?}", tok))),
            None => Err(self.err("unexpected end of expression")),
        }
    }
}

fn checked_div(a: i64, b: i64) -> Option<i64> {
    if b == 0 {
        None
    } else {
        Some(a.wrapping_div(b))
    }
}

fn checked_rem(a: i64, b: i64) -> Option<i64> {
    if b == 0 {
        None
    } else {
        Some(a.wrapping_rem(b))
    }
}

fn shift_left(a: i64, b: i64) -> i64 {
    a.wrapping_shl((b & 63) as u32)
}

fn shift_right(a: i64, b: i64) -> i64 {
    a.wrapping_shr((b & 63) as u32)
}

/// Parse a numeric literal: decimal, `0x` hex, leading-zero octal, `base#n`.
pub fn parse_literal(text: &str) -> Option<i64> {
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some((base, digits)) = text.split_once('#') {
        let base: u32 = base.parse().ok()?;
        if !(2..=64).contains(&base) {
            return None;
        }
        let mut value: i64 = 0;
        for c in digits.chars() {
            let digit = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'a'..='z' => c as u32 - 'a' as u32 + 10,
                'A'..='Z' => c as u32 - 'A' as u32 + 36,
                '@' => 62,
                '_' => 63,
                _ => return None,
            };
            if digit >= base {
                return None;
            }
            value = value.wrapping_mul(base as i64).wrapping_add(digit as i64);
        }
        value
    } else if text.len() > 1 && text.starts_with('0') {
        i64::from_str_radix(&text[1..], 8).ok()?
    } else {
        text.parse().ok()?
    };
    Some(if negative { value.wrapping_neg() } else { value })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn eval_str(expr: &str) -> Result<i64> {
        let mut state = ShellState::new();
        eval(expr, &mut state)
    }

    fn eval_with(expr: &str, vars: &[(&str, &str)]) -> (Result<i64>, ShellState) {
        let mut state = ShellState::new();
        for (name, value) in vars {
            state.scopes.set_scalar(name, *value).unwrap();
        }
        let result = eval(expr, &mut state);
        (result, state)
    }

    #[test]
    fn precedence() {
        assert_eq!(eval_str("1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval_str("(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval_str("2 ** 3 ** 2").unwrap(), 512); // right assoc
        assert_eq!(eval_str("10 - 4 - 3").unwrap(), 3); // left assoc
        assert_eq!(eval_str("1 << 4 | 3").unwrap(), 19);
        assert_eq!(eval_str("7 & 3 ^ 1").unwrap(), 2);
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval_str("3 < 5").unwrap(), 1);
        assert_eq!(eval_str("3 >= 5").unwrap(), 0);
        assert_eq!(eval_str("1 && 0").unwrap(), 0);
        assert_eq!(eval_str("1 || 0").unwrap(), 1);
        assert_eq!(eval_str("!5").unwrap(), 0);
        assert_eq!(eval_str("~0").unwrap(), -1);
    }

    #[test]
    fn ternary_short_circuits() {
        assert_eq!(eval_str("1 ? 10 : 1/0").unwrap(), 10);
        assert_eq!(eval_str("0 ? 1/0 : 20").unwrap(), 20);
        assert!(eval_str("0 ? 1 : 1/0").is_err());
    }

    #[test]
    fn logic_short_circuits_side_effects() {
        let (result, state) = eval_with("0 && (x = 5)", &[]);
        assert_eq!(result.unwrap(), 0);
        assert!(state.get_scalar("x").is_none());

        let (result, state) = eval_with("1 || (y = 5)", &[]);
        assert_eq!(result.unwrap(), 1);
        assert!(state.get_scalar("y").is_none());
    }

    #[test]
    fn division_by_zero_fails() {
        assert!(matches!(eval_str("1 / 0"), Err(Error::Arith(_))));
        assert!(matches!(eval_str("1 % 0"), Err(Error::Arith(_))));
    }

    #[test]
    fn wrapping_overflow() {
        assert_eq!(
            eval_str("9223372036854775807 + 1").unwrap(),
            i64::MIN
        );
        assert_eq!(eval_str("-9223372036854775807 - 2").unwrap(), i64::MAX);
    }

    #[test]
    fn variables_resolve_recursively() {
        let (result, _) = eval_with("x + 1", &[("x", "41")]);
        assert_eq!(result.unwrap(), 42);
        // x names y, y holds the number.
        let (result, _) = eval_with("x", &[("x", "y"), ("y", "7")]);
        assert_eq!(result.unwrap(), 7);
        // Unset and non-numeric resolve to 0.
        let (result, _) = eval_with("nope + 1", &[]);
        assert_eq!(result.unwrap(), 1);
        let (result, _) = eval_with("x", &[("x", "hello world")]);
        assert_eq!(result.unwrap(), 0);
    }

    #[test]
    fn assignment_and_compound_assignment() {
        let (result, state) = eval_with("x = 5", &[]);
        assert_eq!(result.unwrap(), 5);
        assert_eq!(state.get_scalar("x").unwrap(), "5");

        let (result, state) = eval_with("x += 3", &[("x", "4")]);
        assert_eq!(result.unwrap(), 7);
        assert_eq!(state.get_scalar("x").unwrap(), "7");

        let (result, _) = eval_with("x = y = 2", &[]);
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn increment_decrement() {
        let (result, state) = eval_with("x++", &[("x", "5")]);
        assert_eq!(result.unwrap(), 5);
        assert_eq!(state.get_scalar("x").unwrap(), "6");

        let (result, state) = eval_with("++x", &[("x", "5")]);
        assert_eq!(result.unwrap(), 6);
        assert_eq!(state.get_scalar("x").unwrap(), "6");

        let (result, state) = eval_with("x--", &[("x", "5")]);
        assert_eq!(result.unwrap(), 5);
        assert_eq!(state.get_scalar("x").unwrap(), "4");
    }

    #[test]
    fn number_bases() {
        assert_eq!(eval_str("0x1f").unwrap(), 31);
        assert_eq!(eval_str("010").unwrap(), 8);
        assert_eq!(eval_str("2#1010").unwrap(), 10);
        assert_eq!(eval_str("16#ff").unwrap(), 255);
    }

    #[test]
    fn comma_sequences() {
        let (result, state) = eval_with("x = 1, y = 2, x + y", &[]);
        assert_eq!(result.unwrap(), 3);
        assert_eq!(state.get_scalar("x").unwrap(), "1");
    }

    #[test]
    fn empty_expression_is_zero() {
        assert_eq!(eval_str("").unwrap(), 0);
        assert_eq!(eval_str("   ").unwrap(), 0);
    }

    #[test]
    fn invalid_token_errors() {
        assert!(matches!(eval_str("1 @ 2"), Err(Error::Arith(_))));
    }
}
