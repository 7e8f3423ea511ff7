//! Hand-written tokenizer for normalized header text.
//!
//! Comments and `\`-newline continuations are whitespace. A `#` that starts
//! a line begins a directive, which is captured whole as a single token.

/// Token category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Char,
    Punct,
    /// A full preprocessor line without the leading `#`.
    Directive,
}

/// A lexed token with its 1-based start position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }
}

const PUNCT3: &[&str] = &["...", "<<=", ">>="];
const PUNCT2: &[&str] = &[
    "::", "<<", ">>", "->", "&&", "||", "==", "!=", "<=", ">=", "++", "--", "+=", "-=", "*=",
    "/=", "|=", "&=", "^=", "##",
];

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    /// Only whitespace seen since the last newline.
    at_line_start: bool,
}

/// Tokenize header text.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        at_line_start: true,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token() {
        tokens.push(token);
    }
    tokens
}

impl Lexer {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek(0) {
            match ch {
                '\\' if matches!(self.peek(1), Some('\n')) => {
                    self.advance();
                    self.advance();
                    // a continuation does not start a new logical line
                    self.at_line_start = false;
                }
                '\\' if self.peek(1) == Some('\r') && self.peek(2) == Some('\n') => {
                    self.advance();
                    self.advance();
                    self.advance();
                    self.at_line_start = false;
                }
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.peek(1) == Some('/') => {
                    while let Some(c) = self.peek(0) {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '/' if self.peek(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '*' && self.peek(0) == Some('/') {
                            self.advance();
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_trivia();
        let ch = self.peek(0)?;
        let (line, column) = (self.line, self.column);
        let starts_line = self.at_line_start;
        self.at_line_start = false;

        let (kind, text) = match ch {
            '#' if starts_line => (TokenKind::Directive, self.read_directive()),
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                (TokenKind::Ident, self.read_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$'))
            }
            c if c.is_ascii_digit() => (TokenKind::Number, self.read_number()),
            '.' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => (TokenKind::Number, self.read_number()),
            '"' => (TokenKind::Str, self.read_quoted('"')),
            '\'' => (TokenKind::Char, self.read_quoted('\'')),
            _ => (TokenKind::Punct, self.read_punct()),
        };
        Some(Token {
            kind,
            text,
            line,
            column,
        })
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek(0) {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.advance();
        }
        out
    }

    fn read_number(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek(0) {
            let is_hex = out.starts_with("0x") || out.starts_with("0X");
            let exponent_sign = (c == '+' || c == '-')
                && match out.chars().last() {
                    Some('e' | 'E') => !is_hex,
                    Some('p' | 'P') => true,
                    _ => false,
                };
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '\'' || exponent_sign {
                out.push(c);
                self.advance();
            } else {
                break;
            }
        }
        out
    }

    /// Read a quoted literal, keeping the quotes and escapes verbatim.
    fn read_quoted(&mut self, quote: char) -> String {
        let mut out = String::new();
        if let Some(c) = self.advance() {
            out.push(c);
        }
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.advance();
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = self.advance() {
                    out.push(escaped);
                }
            } else if c == quote {
                break;
            }
        }
        out
    }

    fn read_directive(&mut self) -> String {
        self.advance(); // '#'
        let mut out = String::new();
        while let Some(c) = self.peek(0) {
            match c {
                '\n' => break,
                '\\' if self.peek(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                    out.push(' ');
                }
                '/' if self.peek(1) == Some('/') => {
                    while self.peek(0).is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                '/' if self.peek(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '*' && self.peek(0) == Some('/') {
                            self.advance();
                            break;
                        }
                    }
                    out.push(' ');
                }
                _ => {
                    out.push(c);
                    self.advance();
                }
            }
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn read_punct(&mut self) -> String {
        for table in [PUNCT3, PUNCT2] {
            for p in table {
                let matches = p.chars().enumerate().all(|(i, pc)| self.peek(i) == Some(pc));
                if matches {
                    for _ in 0..p.len() {
                        self.advance();
                    }
                    return p.to_string();
                }
            }
        }
        self.advance().map(String::from).unwrap_or_default()
    }
}

/// Join tokens back into compact C type/expression text.
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for tok in tokens {
        if let Some(p) = prev {
            if needs_space(p, tok) {
                out.push(' ');
            }
        }
        out.push_str(&tok.text);
        prev = Some(tok);
    }
    out
}

fn needs_space(prev: &Token, cur: &Token) -> bool {
    let p = prev.text.as_str();
    let c = cur.text.as_str();
    if matches!(p, "::" | "<" | "(" | "[" | "~" | "!") || matches!(c, "::" | "<" | ">" | ">>" | ")" | "]" | "," | "(" | "[") {
        return false;
    }
    if (p == "*" || p == "&") && (c == "*" || c == "&") {
        return false;
    }
    true
}
