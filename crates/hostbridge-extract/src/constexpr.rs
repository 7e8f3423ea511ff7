//! Integer constant-expression evaluation and literal parsing.
//!
//! Covers what enumerator initializers and `#define` constants use in
//! practice: literals in any C radix with suffixes, names resolved through a
//! caller-supplied lookup, unary `- ~ +`, binary `| ^ & << >> + - * / %`
//! and parentheses. Any overflow or unknown name makes the whole expression
//! unevaluable.

use hostbridge_core::Constant;

use crate::lexer::{Token, TokenKind};

/// Parse a C integer literal (`42`, `0x7FFFFFFF`, `017`, `0b101`, `10ULL`).
pub fn parse_int_literal(text: &str) -> Option<i64> {
    i64::try_from(parse_uint_literal(text)?).ok()
}

/// Like [`parse_int_literal`] but keeps the full unsigned 64-bit range.
pub fn parse_uint_literal(text: &str) -> Option<u64> {
    let cleaned: String = text.chars().filter(|c| *c != '\'').collect();
    let digits = cleaned.trim_end_matches(['u', 'U', 'l', 'L', 'z', 'Z']);
    let (radix, body) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, bin)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    if body.is_empty() {
        return None;
    }
    u64::from_str_radix(body, radix).ok()
}

/// Parse a C floating literal (`1.5`, `2e10`, `0.5f`).
pub fn parse_float_literal(text: &str) -> Option<f64> {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("0x") {
        return None;
    }
    let body = lower.trim_end_matches(['f', 'l']);
    if !(body.contains('.') || body.contains('e')) {
        return None;
    }
    body.parse::<f64>().ok()
}

/// Value of a character literal such as `'A'` or `'\n'`.
fn parse_char_literal(text: &str) -> Option<i64> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    let value = match chars.next()? {
        '\\' => match chars.next()? {
            'n' => '\n' as i64,
            't' => '\t' as i64,
            'r' => '\r' as i64,
            '0' => 0,
            '\\' => '\\' as i64,
            '\'' => '\'' as i64,
            '"' => '"' as i64,
            _ => return None,
        },
        c => c as i64,
    };
    chars.next().is_none().then_some(value)
}

/// Evaluate an integer expression. `lookup` resolves identifiers.
pub fn eval(tokens: &[Token], lookup: &dyn Fn(&str) -> Option<i64>) -> Option<i64> {
    let mut evaluator = Evaluator {
        tokens,
        pos: 0,
        lookup,
    };
    let value = evaluator.expr(0)?;
    (evaluator.pos == tokens.len()).then_some(value)
}

/// Interpret `#define` replacement tokens as a scalar constant.
///
/// Accepts an optionally signed and parenthesized integer or float
/// literal, or a single string literal. Anything else returns `None`.
pub fn parse_constant(tokens: &[Token]) -> Option<Constant> {
    let mut toks = tokens;
    while toks.len() >= 2 && toks[0].is_punct("(") && toks[toks.len() - 1].is_punct(")") {
        toks = &toks[1..toks.len() - 1];
    }
    match toks {
        [t] if t.kind == TokenKind::Str => Some(Constant::Str(unquote(&t.text))),
        [t] if t.kind == TokenKind::Number => number_constant(&t.text, false),
        [sign, t] if t.kind == TokenKind::Number && (sign.is_punct("-") || sign.is_punct("+")) => {
            number_constant(&t.text, sign.is_punct("-"))
        }
        _ => None,
    }
}

fn number_constant(text: &str, negative: bool) -> Option<Constant> {
    if let Some(v) = parse_uint_literal(text) {
        return match (negative, i64::try_from(v)) {
            (false, Ok(v)) => Some(Constant::Int(v)),
            (false, Err(_)) => Some(Constant::UInt(v)),
            (true, _) => 0i64.checked_sub_unsigned(v).map(Constant::Int),
        };
    }
    parse_float_literal(text).map(|v| Constant::Float(if negative { -v } else { v }))
}

/// Strip the quotes of a string literal and resolve simple escapes.
pub fn unquote(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

struct Evaluator<'a> {
    tokens: &'a [Token],
    pos: usize,
    lookup: &'a dyn Fn(&str) -> Option<i64>,
}

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "|" => 1,
        "^" => 2,
        "&" => 3,
        "<<" | ">>" => 4,
        "+" | "-" => 5,
        "*" | "/" | "%" => 6,
        _ => return None,
    })
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self, min_prec: u8) -> Option<i64> {
        let mut lhs = self.unary()?;
        loop {
            let Some(tok) = self.peek() else { break };
            if tok.kind != TokenKind::Punct {
                break;
            }
            let Some(prec) = binary_precedence(&tok.text) else { break };
            if prec <= min_prec {
                break;
            }
            let op = tok.text.clone();
            self.pos += 1;
            let rhs = self.expr(prec)?;
            lhs = apply(&op, lhs, rhs)?;
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<i64> {
        let tok = self.peek()?.clone();
        self.pos += 1;
        match tok.kind {
            TokenKind::Number => parse_int_literal(&tok.text),
            TokenKind::Char => parse_char_literal(&tok.text),
            TokenKind::Ident => (self.lookup)(&tok.text),
            TokenKind::Punct => match tok.text.as_str() {
                "-" => self.unary()?.checked_neg(),
                "+" => self.unary(),
                "~" => self.unary().map(|v| !v),
                "(" => {
                    let value = self.expr(0)?;
                    if self.peek()?.is_punct(")") {
                        self.pos += 1;
                        Some(value)
                    } else {
                        None
                    }
                }
                _ => None,
            },
            _ => None,
        }
    }
}

fn apply(op: &str, lhs: i64, rhs: i64) -> Option<i64> {
    match op {
        "|" => Some(lhs | rhs),
        "^" => Some(lhs ^ rhs),
        "&" => Some(lhs & rhs),
        "<<" => lhs.checked_shl(u32::try_from(rhs).ok()?),
        ">>" => lhs.checked_shr(u32::try_from(rhs).ok()?),
        "+" => lhs.checked_add(rhs),
        "-" => lhs.checked_sub(rhs),
        "*" => lhs.checked_mul(rhs),
        "/" => lhs.checked_div(rhs),
        "%" => lhs.checked_rem(rhs),
        _ => None,
    }
}
