//! Recursive-descent grammar over the supported declaration subset.
//!
//! The input is assumed to be preprocessor output: one directive per line,
//! no conditional compilation. Anything that does not fit the grammar is
//! skipped and reported as a [`Diagnostic`]; extraction never aborts.

use std::collections::BTreeSet;
use std::path::Path;

use hostbridge_core::ctype::{is_builtin_keyword, ANONYMOUS};
use hostbridge_core::{ArraySize, Constant, DeclTables, EnumDef, FieldDecl, FunctionDecl, ParamDecl, StructDef};
use hostbridge_core::decl::EnumMember;
use tracing::{debug, info};

use crate::constexpr;
use crate::diagnostic::{Diagnostic, DiagnosticKind, ExtractReport};
use crate::error::{ExtractError, Result};
use crate::lexer::{join_tokens, tokenize, Token, TokenKind};

/// Calling conventions, storage words and specifiers removed before parsing.
const STRIPPED_WORDS: &[&str] = &[
    "extern",
    "static",
    "inline",
    "__inline",
    "__inline__",
    "__forceinline",
    "constexpr",
    "virtual",
    "explicit",
    "__extension__",
    "_Noreturn",
    "__cdecl",
    "_cdecl",
    "__stdcall",
    "_stdcall",
    "__fastcall",
    "__vectorcall",
    "__thiscall",
    "__clrcall",
    "WINAPI",
    "APIENTRY",
    "CALLBACK",
];

/// Specifiers that take a parenthesized argument list.
const STRIPPED_CALLS: &[&str] = &["__declspec", "__attribute__", "__attribute", "alignas", "_Alignas", "__pragma"];

/// Tokens allowed after a prototype's parameter list.
const TRAILING_QUALIFIERS: &[&str] = &["const", "noexcept", "override", "final", "throw", "=", "0", "default", "delete", "&", "&&", "(", ")"];

/// Result of parsing one file (or the merge of several).
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub tables: DeclTables,
    pub report: ExtractReport,
}

impl Extraction {
    /// Fold a later file into this one (last-file-wins for named tables).
    pub fn merge(&mut self, other: Extraction) {
        self.tables.merge(other.tables);
        self.report.merge(other.report);
    }
}

/// Header extractor configured with extra tokens to strip.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    strip: BTreeSet<String>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also strip these identifiers (API export macros and the like).
    pub fn with_strip_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strip.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Extract declarations from in-memory header text.
    #[tracing::instrument(level = "debug", skip(self, text), fields(bytes = text.len()))]
    pub fn extract_str(&self, file: &str, text: &str) -> Extraction {
        let tokens = self.strip_tokens(tokenize(text));
        let mut sink = Sink {
            file,
            tables: DeclTables::new(),
            report: ExtractReport {
                files: 1,
                ..Default::default()
            },
        };
        parse_top_level(&tokens, &mut sink);
        info!(
            file,
            functions = sink.report.functions,
            structs = sink.report.structs,
            enums = sink.report.enums,
            skipped = sink.report.skipped(),
            "extracted declarations"
        );
        Extraction {
            tables: sink.tables,
            report: sink.report,
        }
    }

    pub fn extract_file(&self, path: &Path) -> Result<Extraction> {
        let text = std::fs::read_to_string(path).map_err(|source| ExtractError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.extract_str(&path.display().to_string(), &text))
    }

    /// Extract and merge several files in order.
    pub fn extract_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Extraction> {
        let mut merged = Extraction::default();
        for path in paths {
            merged.merge(self.extract_file(path.as_ref())?);
        }
        Ok(merged)
    }

    fn strip_tokens(&self, tokens: Vec<Token>) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            if tok.kind == TokenKind::Ident {
                if tok.text == "extern" && tokens.get(i + 1).is_some_and(|t| t.kind == TokenKind::Str) {
                    if tokens.get(i + 2).is_some_and(|t| t.is_punct("{")) {
                        // linkage block; the parser treats it as a transparent scope
                        out.extend(tokens[i..i + 3].iter().cloned());
                        i += 3;
                    } else {
                        i += 2;
                    }
                    continue;
                }
                if STRIPPED_CALLS.contains(&tok.text.as_str()) {
                    i += 1;
                    if tokens.get(i).is_some_and(|t| t.is_punct("(")) {
                        i = matching(&tokens, i).map_or(tokens.len(), |close| close + 1);
                    }
                    continue;
                }
                if STRIPPED_WORDS.contains(&tok.text.as_str()) || self.strip.contains(&tok.text) {
                    i += 1;
                    continue;
                }
            }
            // C++11 attributes: [[...]]
            if tok.is_punct("[") && tokens.get(i + 1).is_some_and(|t| t.is_punct("[")) {
                i = matching(&tokens, i).map_or(tokens.len(), |close| close + 1);
                continue;
            }
            out.push(tok.clone());
            i += 1;
        }
        out
    }
}

/// Mutable output of one parse pass.
struct Sink<'f> {
    file: &'f str,
    tables: DeclTables,
    report: ExtractReport,
}

impl Sink<'_> {
    fn diagnose(&mut self, kind: DiagnosticKind, at: Option<&Token>, reason: impl Into<String>) {
        let reason = reason.into();
        let (line, column) = at.map_or((0, 0), |t| (t.line, t.column));
        debug!(file = self.file, line, column, %reason, "{kind}");
        self.report.diagnostics.push(Diagnostic {
            kind,
            file: self.file.to_string(),
            line,
            column,
            reason,
        });
    }

    fn malformed(&mut self, toks: &[Token], reason: impl Into<String>) {
        self.diagnose(DiagnosticKind::MalformedDeclaration, toks.first(), reason);
    }

    fn add_alias(&mut self, name: String, target: String) {
        self.report.aliases += 1;
        self.tables.aliases.insert(name, target);
    }

    fn add_struct(&mut self, def: StructDef) {
        self.report.structs += 1;
        self.tables.structs.insert(def.name.clone(), def);
    }

    fn add_enum(&mut self, def: EnumDef) {
        self.report.enums += 1;
        self.tables.enums.insert(def.name.clone(), def);
    }

    fn add_function_pointer(&mut self, name: String) {
        self.report.function_pointers += 1;
        self.tables.function_pointers.insert(name);
    }
}

// ---------------------------------------------------------------------------
// Token-slice helpers
// ---------------------------------------------------------------------------

fn closer(open: &str) -> Option<&'static str> {
    match open {
        "(" => Some(")"),
        "[" => Some("]"),
        "{" => Some("}"),
        _ => None,
    }
}

/// Index of the bracket closing the one at `open`.
fn matching(toks: &[Token], open: usize) -> Option<usize> {
    let open_text = toks.get(open)?.text.as_str();
    let close_text = closer(open_text)?;
    let mut depth = 0usize;
    for (i, tok) in toks.iter().enumerate().skip(open) {
        if tok.kind != TokenKind::Punct {
            continue;
        }
        if tok.text == open_text {
            depth += 1;
        } else if tok.text == close_text {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Nesting tracker for `()`, `[]`, `{}` and optionally `<>`.
#[derive(Default)]
struct Depth {
    nest: i32,
    angle: i32,
}

impl Depth {
    fn step(&mut self, tok: &Token, angles: bool) {
        if tok.kind != TokenKind::Punct {
            return;
        }
        match tok.text.as_str() {
            "(" | "[" | "{" => self.nest += 1,
            ")" | "]" | "}" => self.nest -= 1,
            "<" if angles => self.angle += 1,
            ">" if angles && self.angle > 0 => self.angle -= 1,
            ">>" if angles && self.angle > 0 => self.angle = (self.angle - 2).max(0),
            _ => {}
        }
    }

    fn top(&self) -> bool {
        self.nest == 0 && self.angle == 0
    }
}

/// Split on a punctuation separator at nesting depth zero.
fn split_top_level<'t>(toks: &'t [Token], sep: &str, angles: bool) -> Vec<&'t [Token]> {
    let mut parts = Vec::new();
    let mut depth = Depth::default();
    let mut start = 0;
    for (i, tok) in toks.iter().enumerate() {
        if depth.top() && tok.is_punct(sep) {
            parts.push(&toks[start..i]);
            start = i + 1;
            continue;
        }
        depth.step(tok, angles);
    }
    parts.push(&toks[start..]);
    parts
}

/// First index of punctuation `p` at depth zero.
fn find_top_level(toks: &[Token], p: &str) -> Option<usize> {
    let mut depth = Depth::default();
    for (i, tok) in toks.iter().enumerate() {
        if depth.top() && tok.is_punct(p) {
            return Some(i);
        }
        depth.step(tok, false);
    }
    None
}

fn is_qualifier(tok: &Token) -> bool {
    matches!(tok.text.as_str(), "const" | "volatile" | "restrict" | "__restrict" | "__restrict__")
}

fn is_indirection(tok: &Token) -> bool {
    tok.kind == TokenKind::Punct && matches!(tok.text.as_str(), "*" | "&" | "&&")
}

fn is_type_word(tok: &Token) -> bool {
    !is_indirection(tok)
        && !is_qualifier(tok)
        && !matches!(tok.text.as_str(), "struct" | "union" | "enum" | "class" | "typename")
}

fn synthetic(text: &str, at: &Token) -> Token {
    Token {
        kind: TokenKind::Ident,
        text: text.to_string(),
        line: at.line,
        column: at.column,
    }
}

// ---------------------------------------------------------------------------
// Statement boundaries
// ---------------------------------------------------------------------------

enum End {
    /// Terminated by `;` at this index.
    Semicolon(usize),
    /// A function or other body closed by `}` at this index.
    Body(usize),
    /// Ran into a scope close, directive, or end of input at this index.
    Unterminated(usize),
}

fn statement_end(toks: &[Token], start: usize) -> End {
    let mut paren = 0i32;
    let mut brace = 0i32;
    let mut body_block = false;
    for i in start..toks.len() {
        let tok = &toks[i];
        if tok.kind == TokenKind::Directive && brace == 0 {
            return End::Unterminated(i);
        }
        if tok.kind != TokenKind::Punct {
            continue;
        }
        match tok.text.as_str() {
            "(" | "[" => paren += 1,
            ")" | "]" => paren -= 1,
            "{" => {
                if brace == 0 && paren == 0 && i > start {
                    let prev = &toks[i - 1];
                    body_block = prev.is_punct(")")
                        || matches!(prev.text.as_str(), "const" | "noexcept" | "override" | "final" | "mutable");
                }
                brace += 1;
            }
            "}" => {
                brace -= 1;
                if brace < 0 {
                    return End::Unterminated(i);
                }
                if brace == 0 && body_block {
                    return End::Body(i);
                }
            }
            ";" if brace == 0 && paren == 0 => return End::Semicolon(i),
            _ => {}
        }
    }
    End::Unterminated(toks.len())
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

fn parse_top_level(toks: &[Token], sink: &mut Sink<'_>) {
    let mut scope_depth = 0usize;
    let mut pos = 0;

    while pos < toks.len() {
        let tok = &toks[pos];
        match tok.kind {
            TokenKind::Directive => {
                parse_directive(tok, sink);
                pos += 1;
                continue;
            }
            TokenKind::Punct if tok.text == ";" => {
                pos += 1;
                continue;
            }
            TokenKind::Punct if tok.text == "}" => {
                if scope_depth > 0 {
                    scope_depth -= 1;
                } else {
                    sink.malformed(&toks[pos..=pos], "unbalanced '}'");
                }
                pos += 1;
                continue;
            }
            _ => {}
        }

        // transparent scopes
        if tok.is_ident("namespace") {
            let brace = toks[pos..]
                .iter()
                .position(|t| t.is_punct("{") || t.is_punct(";") || t.is_punct("="));
            match brace.map(|off| (off, &toks[pos + off])) {
                Some((off, t)) if t.is_punct("{") => {
                    scope_depth += 1;
                    pos += off + 1;
                }
                _ => pos = skip_statement(toks, pos),
            }
            continue;
        }
        if tok.is_ident("extern")
            && toks.get(pos + 1).is_some_and(|t| t.kind == TokenKind::Str)
            && toks.get(pos + 2).is_some_and(|t| t.is_punct("{"))
        {
            scope_depth += 1;
            pos += 3;
            continue;
        }
        if tok.is_ident("template") {
            pos = skip_template(toks, pos);
            continue;
        }
        if tok.is_ident("class") || tok.is_ident("static_assert") || tok.is_ident("friend") {
            pos = skip_statement(toks, pos);
            continue;
        }

        match statement_end(toks, pos) {
            End::Semicolon(end) => {
                parse_statement(&toks[pos..end], sink);
                pos = end + 1;
            }
            End::Body(end) => {
                debug!(line = tok.line, "skipping definition body");
                pos = end + 1;
            }
            End::Unterminated(end) => {
                sink.malformed(&toks[pos..end.max(pos + 1).min(toks.len())], "declaration is not terminated by ';'");
                pos = end.max(pos + 1);
            }
        }
    }
}

fn skip_statement(toks: &[Token], pos: usize) -> usize {
    match statement_end(toks, pos) {
        End::Semicolon(end) | End::Body(end) => end + 1,
        End::Unterminated(end) => end.max(pos + 1),
    }
}

fn skip_template(toks: &[Token], pos: usize) -> usize {
    let mut i = pos + 1;
    if toks.get(i).is_some_and(|t| t.is_punct("<")) {
        let mut angle = 0i32;
        while let Some(t) = toks.get(i) {
            match t.text.as_str() {
                "<" => angle += 1,
                ">" => angle -= 1,
                ">>" => angle -= 2,
                _ => {}
            }
            i += 1;
            if angle <= 0 {
                break;
            }
        }
    }
    if i >= toks.len() {
        return i;
    }
    skip_statement(toks, i)
}

fn parse_directive(tok: &Token, sink: &mut Sink<'_>) {
    let text = tok.text.as_str();
    let (keyword, rest) = text.split_once(' ').unwrap_or((text, ""));
    match keyword {
        "define" => {
            let name_len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let (name, value) = rest.split_at(name_len);
            if name.is_empty() || value.starts_with('(') {
                return;
            }
            match constexpr::parse_constant(&tokenize(value)) {
                Some(constant) => {
                    sink.report.constants += 1;
                    sink.tables.constants.insert(name.to_string(), constant);
                }
                None => debug!(name, "define is not a scalar constant"),
            }
        }
        "undef" => {
            sink.tables.constants.remove(rest.trim());
        }
        _ => {}
    }
}

fn parse_statement(toks: &[Token], sink: &mut Sink<'_>) {
    let Some(first) = toks.first() else { return };
    if first.is_ident("typedef") {
        parse_typedef(&toks[1..], sink);
    } else if first.is_ident("using") {
        parse_using(toks, sink);
    } else if matches!(first.text.as_str(), "struct" | "union" | "enum")
        && first.kind == TokenKind::Ident
        && aggregate_body(toks).is_some()
    {
        parse_aggregate_statement(toks, sink);
    } else if find_top_level(toks, "(").is_some() {
        match parse_prototype(toks) {
            Ok(Some(f)) => {
                sink.report.functions += 1;
                sink.tables.functions.push(f);
            }
            Ok(None) => {}
            Err(reason) => sink.malformed(toks, reason),
        }
    } else {
        debug!(line = first.line, "ignoring non-function declaration");
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// `(open, close)` of the body of a leading `struct|union|enum [..] {..}`.
fn aggregate_body(toks: &[Token]) -> Option<(usize, usize)> {
    let open = toks.iter().position(|t| t.is_punct("{") || t.is_punct("("))?;
    if !toks[open].is_punct("{") {
        return None;
    }
    Some((open, matching(toks, open)?))
}

/// Header of an aggregate: keyword and optional tag. Base clauses and
/// `enum class`/underlying types are ignored.
struct AggregateHead {
    keyword: String,
    tag: Option<String>,
}

fn aggregate_head(toks: &[Token]) -> std::result::Result<AggregateHead, String> {
    let keyword = toks.first().map(|t| t.text.clone()).ok_or("empty aggregate")?;
    let mut i = 1;
    if keyword == "enum" && toks.get(i).is_some_and(|t| t.is_ident("class") || t.is_ident("struct")) {
        i += 1;
    }
    let tag = match toks.get(i) {
        Some(t) if t.kind == TokenKind::Ident => Some(t.text.clone()),
        Some(t) if t.is_punct("{") || t.is_punct(":") => None,
        Some(t) => return Err(format!("unexpected '{}' in {keyword} header", t.text)),
        None => None,
    };
    Ok(AggregateHead { keyword, tag })
}

/// Parse an aggregate body into a struct or enum definition named `name`.
/// Returns nothing for enums without a name (their members become constants).
fn define_aggregate(
    head: &AggregateHead,
    name: Option<&str>,
    body: &[Token],
    nested: bool,
    sink: &mut Sink<'_>,
) -> std::result::Result<(), String> {
    match head.keyword.as_str() {
        "enum" => {
            let members = parse_enum_body(body, sink)?;
            match name {
                Some(name) => sink.add_enum(EnumDef::new(name, members)),
                None => {
                    for m in members {
                        sink.report.constants += 1;
                        sink.tables.constants.insert(m.name, Constant::Int(m.value));
                    }
                }
            }
        }
        kw => {
            let name = name.ok_or_else(|| format!("anonymous {kw} has no name"))?;
            let fields = parse_struct_body(body, nested, sink)?;
            sink.add_struct(StructDef {
                name: name.to_string(),
                fields,
                is_union: kw == "union",
            });
        }
    }
    Ok(())
}

/// `struct Tag {...};`, `union Tag {...} var;`, `enum [class] Tag [: base] {...};`
fn parse_aggregate_statement(toks: &[Token], sink: &mut Sink<'_>) {
    let result = aggregate_head(toks).and_then(|head| {
        let (open, close) = aggregate_body(toks).ok_or("aggregate without body")?;
        define_aggregate(&head, head.tag.as_deref(), &toks[open + 1..close], false, sink)
    });
    if let Err(reason) = result {
        sink.malformed(toks, reason);
    }
}

fn parse_typedef(toks: &[Token], sink: &mut Sink<'_>) {
    let Some(first) = toks.first() else { return };
    let result = if matches!(first.text.as_str(), "struct" | "union" | "enum" | "class")
        && find_top_level_brace(toks).is_some()
    {
        typedef_aggregate(toks, sink)
    } else if find_top_level(toks, "(").is_some() {
        typedef_function_pointer(toks, sink)
    } else {
        typedef_plain(toks, sink)
    };
    if let Err(reason) = result {
        sink.malformed(toks, reason);
    }
}

fn find_top_level_brace(toks: &[Token]) -> Option<usize> {
    toks.iter().position(|t| t.is_punct("{"))
}

/// `typedef struct [Tag] {...} Name [, *PName];`
fn typedef_aggregate(toks: &[Token], sink: &mut Sink<'_>) -> std::result::Result<(), String> {
    let head = aggregate_head(toks)?;
    let (open, close) = aggregate_body(toks).ok_or("typedef aggregate without body")?;

    let mut plain: Option<String> = None;
    let mut pointers: Vec<(String, usize)> = Vec::new();
    for decl in split_top_level(&toks[close + 1..], ",", false) {
        let stars = decl.iter().filter(|t| t.is_punct("*")).count();
        let Some(name) = decl.iter().rev().find(|t| t.kind == TokenKind::Ident && !is_qualifier(t)) else {
            continue;
        };
        if stars == 0 {
            if plain.is_none() {
                plain = Some(name.text.clone());
            }
        } else {
            pointers.push((name.text.clone(), stars));
        }
    }

    let name = plain
        .or_else(|| head.tag.clone())
        .ok_or("typedef aggregate has neither tag nor name")?;
    define_aggregate(&head, Some(&name), &toks[open + 1..close], false, sink)?;

    if let Some(tag) = &head.tag {
        if *tag != name {
            sink.add_alias(tag.clone(), name.clone());
        }
    }
    for (alias, stars) in pointers {
        sink.add_alias(alias, format!("{name} {}", "*".repeat(stars)));
    }
    Ok(())
}

/// `typedef R (QUAL *Name)(args);` or the function-type form `typedef R Name(args);`
fn typedef_function_pointer(toks: &[Token], sink: &mut Sink<'_>) -> std::result::Result<(), String> {
    let open = find_top_level(toks, "(").ok_or("missing '('")?;
    let close = matching(toks, open).ok_or("unbalanced parentheses")?;
    let group = &toks[open + 1..close];
    let name = if group.iter().any(|t| t.is_punct("*") || t.is_punct("^")) {
        group
            .last()
            .filter(|t| t.kind == TokenKind::Ident)
            .map(|t| t.text.clone())
            .ok_or("function pointer typedef without a name")?
    } else {
        open.checked_sub(1)
            .map(|i| &toks[i])
            .filter(|t| t.kind == TokenKind::Ident)
            .map(|t| t.text.clone())
            .ok_or("function typedef without a name")?
    };
    sink.add_function_pointer(name);
    Ok(())
}

/// `typedef T a, *b;`, including handle typedefs `typedef struct X_T* X;`.
fn typedef_plain(toks: &[Token], sink: &mut Sink<'_>) -> std::result::Result<(), String> {
    for decl in parse_declarators(toks)? {
        let name = decl.name.ok_or("typedef without a name")?;
        sink.add_alias(name, decl.type_text);
    }
    Ok(())
}

/// `using Name = T;`
fn parse_using(toks: &[Token], sink: &mut Sink<'_>) {
    if toks.get(1).is_some_and(|t| t.is_ident("namespace")) {
        return;
    }
    let Some(eq) = toks.iter().position(|t| t.is_punct("=")) else {
        // using-declaration such as `using std::size_t;`
        return;
    };
    match (&toks[1..eq], &toks[eq + 1..]) {
        ([name], target) if name.kind == TokenKind::Ident && !target.is_empty() => {
            let text = join_tokens(target);
            if find_top_level(target, "(").is_some() {
                sink.add_function_pointer(name.text.clone());
            } else {
                sink.add_alias(name.text.clone(), text);
            }
        }
        _ => sink.malformed(toks, "malformed alias declaration"),
    }
}

fn parse_enum_body(body: &[Token], sink: &mut Sink<'_>) -> std::result::Result<Vec<EnumMember>, String> {
    let mut members: Vec<EnumMember> = Vec::new();
    let mut next = 0i64;
    for entry in split_top_level(body, ",", false) {
        let Some(name_tok) = entry.first() else { continue };
        if name_tok.kind != TokenKind::Ident {
            return Err(format!("unexpected '{}' in enum body", name_tok.text));
        }
        let value = match entry.get(1) {
            None => next,
            Some(t) if t.is_punct("=") => {
                let expr = &entry[2..];
                let lookup = |n: &str| members.iter().find(|m| m.name == n).map(|m| m.value);
                match constexpr::eval(expr, &lookup) {
                    Some(v) => v,
                    None => {
                        sink.diagnose(
                            DiagnosticKind::UnevaluableInitializer,
                            Some(name_tok),
                            format!("cannot evaluate '{}' for {}", join_tokens(expr), name_tok.text),
                        );
                        next
                    }
                }
            }
            Some(t) => return Err(format!("unexpected '{}' after enumerator {}", t.text, name_tok.text)),
        };
        members.push(EnumMember {
            name: name_tok.text.clone(),
            value,
        });
        next = value.wrapping_add(1);
    }
    Ok(members)
}

fn parse_struct_body(
    body: &[Token],
    nested: bool,
    sink: &mut Sink<'_>,
) -> std::result::Result<Vec<FieldDecl>, String> {
    let mut fields = Vec::new();
    for stmt in split_top_level(body, ";", false) {
        let mut stmt = stmt;
        // access specifiers
        while stmt.len() >= 2
            && matches!(stmt[0].text.as_str(), "public" | "private" | "protected")
            && stmt[1].is_punct(":")
        {
            stmt = &stmt[2..];
        }
        let Some(first) = stmt.first() else { continue };
        if matches!(first.text.as_str(), "typedef" | "using" | "friend" | "template" | "static_assert") {
            continue;
        }

        let brace = find_top_level_brace(stmt);
        let paren = find_top_level(stmt, "(");
        if let Some(b) = brace {
            if paren.is_some_and(|p| p < b) {
                // member function with inline body
                continue;
            }
            if nested {
                return Err("aggregate nesting deeper than one level".to_string());
            }
            fields.extend(nested_aggregate(stmt, sink)?);
            continue;
        }
        if paren.is_some() && !is_function_pointer_declarator(stmt) {
            // member function declaration
            continue;
        }

        for decl in parse_declarators(stmt)? {
            let name = decl.name.ok_or_else(|| format!("field of type '{}' has no name", decl.type_text))?;
            fields.push(FieldDecl {
                name,
                declared_type: decl.type_text,
                array_size: decl.array_size,
            });
        }
    }
    Ok(fields)
}

/// One level of nested `struct|union|enum [Tag] {...} declarators`.
fn nested_aggregate(stmt: &[Token], sink: &mut Sink<'_>) -> std::result::Result<Vec<FieldDecl>, String> {
    if !matches!(stmt[0].text.as_str(), "struct" | "union" | "enum") {
        return Err(format!("unexpected '{}' before nested body", stmt[0].text));
    }
    let head = aggregate_head(stmt)?;
    let (open, close) = aggregate_body(stmt).ok_or("nested aggregate without body")?;
    let inner = &stmt[open + 1..close];
    if find_top_level_brace(inner).is_some() {
        return Err("aggregate nesting deeper than one level".to_string());
    }
    if let Some(tag) = &head.tag {
        define_aggregate(&head, Some(tag), inner, true, sink)?;
    }

    let declarators = &stmt[close + 1..];
    if declarators.is_empty() {
        debug!(line = stmt[0].line, "nested aggregate without declarator");
        return Ok(Vec::new());
    }
    let type_name = head.tag.clone().unwrap_or_else(|| ANONYMOUS.to_string());
    let mut synthetic_decl = vec![synthetic(&type_name, &stmt[0])];
    synthetic_decl.extend(declarators.iter().cloned());
    let mut fields = Vec::new();
    for decl in parse_declarators(&synthetic_decl)? {
        let name = decl.name.ok_or("nested aggregate declarator has no name")?;
        fields.push(FieldDecl {
            name,
            declared_type: decl.type_text,
            array_size: decl.array_size,
        });
    }
    Ok(fields)
}

// ---------------------------------------------------------------------------
// Declarators
// ---------------------------------------------------------------------------

/// A declarator with its full type spelled out.
#[derive(Debug, Clone, PartialEq)]
struct Declarator {
    type_text: String,
    name: Option<String>,
    array_size: Option<ArraySize>,
}

/// `R (*name)(args)` with an optional name.
fn is_function_pointer_declarator(toks: &[Token]) -> bool {
    let Some(open) = find_top_level(toks, "(") else { return false };
    let Some(close) = matching(toks, open) else { return false };
    toks[open + 1..close].iter().any(|t| t.is_punct("*"))
        && toks.get(close + 1).is_some_and(|t| t.is_punct("("))
}

fn function_pointer_declarator(toks: &[Token]) -> std::result::Result<Declarator, String> {
    let open = find_top_level(toks, "(").ok_or("missing '('")?;
    let close = matching(toks, open).ok_or("unbalanced parentheses")?;
    let args_open = close + 1;
    let args_close = matching(toks, args_open).ok_or("unbalanced parameter list")?;
    let name = toks[open + 1..close]
        .last()
        .filter(|t| t.kind == TokenKind::Ident && !is_qualifier(t))
        .map(|t| t.text.clone());
    let stars = toks[open + 1..close].iter().filter(|t| t.is_punct("*")).count();
    let type_text = format!(
        "{} ({})({})",
        join_tokens(&toks[..open]),
        "*".repeat(stars),
        join_tokens(&toks[args_open + 1..args_close])
    );
    Ok(Declarator {
        type_text,
        name,
        array_size: None,
    })
}

/// Expand a declaration with comma-separated declarators into one
/// declarator per name, all sharing the leading base type.
fn parse_declarators(toks: &[Token]) -> std::result::Result<Vec<Declarator>, String> {
    if is_function_pointer_declarator(toks) {
        return Ok(vec![function_pointer_declarator(toks)?]);
    }
    let segments = split_top_level(toks, ",", true);
    let first = strip_initializer(segments[0]);
    let (base, first_decl) = split_base(first)?;

    let mut out = vec![declarator(base, first_decl)?];
    for seg in &segments[1..] {
        let seg = strip_initializer(seg);
        if seg.is_empty() {
            return Err("empty declarator".to_string());
        }
        out.push(declarator(base, seg)?);
    }
    Ok(out)
}

fn strip_initializer(toks: &[Token]) -> &[Token] {
    match find_top_level(toks, "=") {
        Some(eq) => &toks[..eq],
        None => toks,
    }
}

/// Split the first declaration segment into base-type tokens and the
/// declarator part (pointer run, name, arrays, bit-field).
fn split_base(toks: &[Token]) -> std::result::Result<(&[Token], &[Token]), String> {
    let core_len = declarator_core_len(toks);
    let core = &toks[..core_len];
    if core.is_empty() {
        return Err("missing type".to_string());
    }

    let last = &core[core.len() - 1];
    let has_type_before = core[..core.len() - 1].iter().any(is_type_word);
    let named = last.kind == TokenKind::Ident
        && !is_builtin_keyword(&last.text)
        && !is_qualifier(last)
        && has_type_before;

    let mut split = if named { core.len() - 1 } else { core.len() };
    // pull the trailing pointer run into the declarator
    while split > 0 {
        let t = &core[split - 1];
        let qualifies_pointer = is_qualifier(t) && core[..split - 1].last().is_some_and(is_indirection);
        if is_indirection(t) || qualifies_pointer {
            split -= 1;
        } else {
            break;
        }
    }
    if split == 0 {
        return Err("missing type".to_string());
    }
    Ok((&toks[..split], &toks[split..]))
}

/// Length of a declaration without trailing arrays and bit-field width.
fn declarator_core_len(toks: &[Token]) -> usize {
    let mut len = find_top_level(toks, ":").unwrap_or(toks.len());
    while len > 0 && toks[len - 1].is_punct("]") {
        match toks[..len].iter().rposition(|t| t.is_punct("[")) {
            Some(open) => len = open,
            None => break,
        }
    }
    len
}

fn declarator(base: &[Token], decl: &[Token]) -> std::result::Result<Declarator, String> {
    let core_len = declarator_core_len(decl);
    let core = &decl[..core_len];
    let (pointer_run, name) = match core.last() {
        Some(t) if t.kind == TokenKind::Ident && !is_qualifier(t) => (&core[..core.len() - 1], Some(t.text.clone())),
        _ => (core, None),
    };
    if let Some(bad) = pointer_run.iter().find(|t| !is_indirection(t) && !is_qualifier(t)) {
        return Err(format!("unexpected '{}' in declarator", bad.text));
    }

    let bitfield = find_top_level(decl, ":");
    let array_end = bitfield.unwrap_or(decl.len());
    let dims: Vec<&[Token]> = collect_dims(&decl[core_len..array_end])?;

    let mut type_text = join_tokens(base);
    if !pointer_run.is_empty() {
        type_text = format!("{type_text} {}", join_tokens(pointer_run));
    }
    let array_size = if dims.is_empty() {
        None
    } else {
        type_text.push_str(" *");
        array_size(&dims)
    };
    Ok(Declarator {
        type_text,
        name,
        array_size,
    })
}

fn collect_dims(toks: &[Token]) -> std::result::Result<Vec<&[Token]>, String> {
    let mut dims = Vec::new();
    let mut i = 0;
    while i < toks.len() {
        if !toks[i].is_punct("[") {
            return Err(format!("unexpected '{}' after declarator", toks[i].text));
        }
        let close = matching(toks, i).ok_or("unbalanced '['")?;
        dims.push(&toks[i + 1..close]);
        i = close + 1;
    }
    Ok(dims)
}

/// Element count of possibly multi-dimensional array dimensions.
fn array_size(dims: &[&[Token]]) -> Option<ArraySize> {
    if dims.iter().any(|d| d.is_empty()) {
        return None;
    }
    let literal: Option<Vec<i64>> = dims
        .iter()
        .map(|d| {
            if d.iter().any(|t| t.kind == TokenKind::Ident) {
                None
            } else {
                constexpr::eval(d, &|_: &str| None)
            }
        })
        .collect();
    if let Some(values) = literal {
        let product = values
            .iter()
            .try_fold(1u64, |acc, v| u64::try_from(*v).ok().and_then(|v| acc.checked_mul(v)));
        if let Some(n) = product {
            return Some(ArraySize::Literal(n));
        }
    }
    let parts: Vec<String> = dims
        .iter()
        .map(|d| {
            let text = join_tokens(d);
            if d.len() > 1 && dims.len() > 1 {
                format!("({text})")
            } else {
                text
            }
        })
        .collect();
    Some(ArraySize::Symbolic(parts.join(" * ")))
}

// ---------------------------------------------------------------------------
// Prototypes
// ---------------------------------------------------------------------------

/// Parse a function prototype. `Ok(None)` means the statement is a valid
/// construct that is not a free function (e.g. a qualified member).
fn parse_prototype(toks: &[Token]) -> std::result::Result<Option<FunctionDecl>, String> {
    let open = find_top_level(toks, "(").ok_or("missing '('")?;
    let close = matching(toks, open).ok_or("unbalanced parentheses")?;
    if open == 0 {
        return Err("missing return type and name".to_string());
    }
    let name_tok = &toks[open - 1];
    if name_tok.kind != TokenKind::Ident || is_builtin_keyword(&name_tok.text) {
        if is_function_pointer_declarator(toks) {
            // variable of function-pointer type
            return Ok(None);
        }
        return Err(format!("expected function name before '(', found '{}'", name_tok.text));
    }
    if open >= 2 && (toks[open - 2].is_punct("::") || toks[open - 2].is_punct("~")) {
        return Ok(None);
    }
    if name_tok.text == "operator" {
        return Ok(None);
    }
    let ret = &toks[..open - 1];
    if !ret.iter().any(is_type_word) {
        return Err(format!("missing return type for '{}'", name_tok.text));
    }
    if let Some(bad) = toks[close + 1..]
        .iter()
        .find(|t| !TRAILING_QUALIFIERS.contains(&t.text.as_str()))
    {
        return Err(format!("unexpected '{}' after parameter list", bad.text));
    }

    let (params, is_variadic) = parse_params(&toks[open + 1..close])?;
    Ok(Some(FunctionDecl {
        name: name_tok.text.clone(),
        return_type: join_tokens(ret),
        params,
        is_variadic,
    }))
}

fn parse_params(toks: &[Token]) -> std::result::Result<(Vec<ParamDecl>, bool), String> {
    if toks.is_empty() || (toks.len() == 1 && toks[0].is_ident("void")) {
        return Ok((Vec::new(), false));
    }
    let parts = split_top_level(toks, ",", true);
    let mut params = Vec::new();
    let mut is_variadic = false;
    for (i, part) in parts.iter().enumerate() {
        if part.len() == 1 && part[0].is_punct("...") {
            if i != parts.len() - 1 {
                return Err("'...' must be the last parameter".to_string());
            }
            is_variadic = true;
            continue;
        }
        if part.is_empty() {
            return Err("empty parameter".to_string());
        }
        let decl = parse_declarators(part)?
            .into_iter()
            .next()
            .ok_or("empty parameter")?;
        params.push(ParamDecl {
            name: decl.name.unwrap_or_else(|| format!("arg{i}")),
            declared_type: decl.type_text,
            array_size: decl.array_size,
        });
    }
    Ok((params, is_variadic))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(src: &str) -> Extraction {
        Extractor::new().extract_str("test.h", src)
    }

    #[test]
    fn enum_auto_increment() {
        let ex = extract("typedef enum { X, Y = 5, Z } Letters;");
        let e = &ex.tables.enums["Letters"];
        assert_eq!(e.value("X"), Some(0));
        assert_eq!(e.value("Y"), Some(5));
        assert_eq!(e.value("Z"), Some(6));
    }

    #[test]
    fn enum_initializers_use_earlier_members() {
        let ex = extract(
            "enum class Flags : unsigned { A = 1 << 0, B = 1 << 1, AB = A | B, NEG = -2, NEXT };",
        );
        let e = &ex.tables.enums["Flags"];
        assert_eq!(e.value("AB"), Some(3));
        assert_eq!(e.value("NEG"), Some(-2));
        assert_eq!(e.value("NEXT"), Some(-1));
        assert!(ex.report.diagnostics.is_empty());
    }

    #[test]
    fn unevaluable_enum_initializer_falls_back() {
        let ex = extract("typedef enum E_T { A = 3, B = sizeof(int), C } E;");
        let e = &ex.tables.enums["E"];
        assert_eq!(e.value("B"), Some(4));
        assert_eq!(e.value("C"), Some(5));
        assert_eq!(ex.report.diagnostics.len(), 1);
        assert_eq!(ex.report.diagnostics[0].kind, DiagnosticKind::UnevaluableInitializer);
        assert_eq!(ex.tables.aliases["E_T"], "E");
    }

    #[test]
    fn comma_separated_fields_share_base_type() {
        let ex = extract("typedef struct { int a, b; char *p, q[4]; } S;");
        let s = &ex.tables.structs["S"];
        let fields: Vec<(&str, &str)> = s
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.declared_type.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![("a", "int"), ("b", "int"), ("p", "char *"), ("q", "char *")]
        );
        assert_eq!(s.fields[3].array_size, Some(ArraySize::Literal(4)));
        assert_eq!(s.fields[2].array_size, None);
    }

    #[test]
    fn array_fields_capture_sizes() {
        let ex = extract(
            "#define XR_MAX_NAME 64\n\
             struct Grid { float cells[3][4]; char name[XR_MAX_NAME]; unsigned flags : 3; };",
        );
        let s = &ex.tables.structs["Grid"];
        assert_eq!(s.fields[0].declared_type, "float *");
        assert_eq!(s.fields[0].array_size, Some(ArraySize::Literal(12)));
        assert_eq!(
            s.fields[1].array_size,
            Some(ArraySize::Symbolic("XR_MAX_NAME".into()))
        );
        assert_eq!(s.fields[2].declared_type, "unsigned");
        assert_eq!(s.fields[2].array_size, None);
    }

    #[test]
    fn typedef_struct_with_tag_and_pointer_alias() {
        let ex = extract("typedef struct Point_T { int x; int y; } Point, *PPoint;");
        assert!(ex.tables.structs.contains_key("Point"));
        assert_eq!(ex.tables.aliases["Point_T"], "Point");
        assert_eq!(ex.tables.aliases["PPoint"], "Point *");
    }

    #[test]
    fn handle_typedef_becomes_alias() {
        let ex = extract("typedef struct XrInstance_T* XrInstance;");
        assert_eq!(ex.tables.aliases["XrInstance"], "struct XrInstance_T *");
    }

    #[test]
    fn plain_typedefs_and_using() {
        let ex = extract("typedef unsigned int u32, *pu32;\nusing Handle = void *;\nusing namespace std;");
        assert_eq!(ex.tables.aliases["u32"], "unsigned int");
        assert_eq!(ex.tables.aliases["pu32"], "unsigned int *");
        assert_eq!(ex.tables.aliases["Handle"], "void *");
    }

    #[test]
    fn function_pointer_typedefs() {
        let ex = extract(
            "typedef XrResult (XRAPI_PTR *PFN_xrVoidFunction)(void);\n\
             typedef void Callback(int code);",
        );
        assert!(ex.tables.is_function_pointer("PFN_xrVoidFunction"));
        assert!(ex.tables.is_function_pointer("Callback"));
    }

    #[test]
    fn prototypes_with_template_and_unnamed_args() {
        let ex = extract(
            "XRAPI_ATTR XrResult XRAPI_CALL xrThing(const std::map<int, float>& m, unsigned int, XrInstance);",
        );
        let ex2 = Extractor::new()
            .with_strip_tokens(["XRAPI_ATTR", "XRAPI_CALL"])
            .extract_str("t.h", "XRAPI_ATTR XrResult XRAPI_CALL xrThing(const std::map<int, float>& m, unsigned int, XrInstance);");
        // without stripping, the macro words are part of the return type
        assert_eq!(ex.tables.functions[0].return_type, "XRAPI_ATTR XrResult XRAPI_CALL");
        let f = &ex2.tables.functions[0];
        assert_eq!(f.name, "xrThing");
        assert_eq!(f.return_type, "XrResult");
        assert_eq!(f.params.len(), 3);
        assert_eq!(f.params[0].name, "m");
        assert_eq!(f.params[0].declared_type, "const std::map<int, float> &");
        assert_eq!(f.params[1].name, "arg1");
        assert_eq!(f.params[1].declared_type, "unsigned int");
        assert_eq!(f.params[2].name, "arg2");
        assert_eq!(f.params[2].declared_type, "XrInstance");
    }

    #[test]
    fn prototype_variants() {
        let ex = extract(
            "extern \"C\" {\n\
             __declspec(dllexport) int __stdcall add(int a, int b);\n\
             void none(void);\n\
             int printf_like(const char *fmt, ...);\n\
             void fill(float out[16], void (*cb)(int code));\n\
             static inline int helper(int x) { return x + 1; }\n\
             }\n",
        );
        let names: Vec<&str> = ex.tables.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["add", "none", "printf_like", "fill"]);
        assert!(ex.tables.functions[1].params.is_empty());
        assert!(ex.tables.functions[2].is_variadic);
        let fill = &ex.tables.functions[3];
        assert_eq!(fill.params[0].declared_type, "float *");
        assert_eq!(fill.params[0].array_size, Some(ArraySize::Literal(16)));
        assert_eq!(fill.params[1].name, "cb");
        assert!(fill.params[1].declared_type.contains("(*)"));
        assert!(ex.report.diagnostics.is_empty(), "{:?}", ex.report.diagnostics);
    }

    #[test]
    fn constants_from_defines() {
        let ex = extract(
            "#define XR_TRUE 1\n#define XR_NAME \"openxr\"\n#define XR_SCALE 0.5\n\
             #define XR_MAKE(x) (x)\n#define XR_EXPR (1 << 2)\n#define GUARD_H\n#define GONE 3\n#undef GONE\n",
        );
        let c = &ex.tables.constants;
        assert_eq!(c["XR_TRUE"], Constant::Int(1));
        assert_eq!(c["XR_NAME"], Constant::Str("openxr".into()));
        assert_eq!(c["XR_SCALE"], Constant::Float(0.5));
        assert!(!c.contains_key("XR_MAKE"));
        assert!(!c.contains_key("XR_EXPR"));
        assert!(!c.contains_key("GUARD_H"));
        assert!(!c.contains_key("GONE"));
    }

    #[test]
    fn hex_masks_above_i64_are_kept() {
        let ex = extract("#define XR_ALL_BITS 0xFFFFFFFFFFFFFFFFULL\n#define SMALL 0x10\n");
        let c = &ex.tables.constants;
        assert_eq!(c["XR_ALL_BITS"], Constant::UInt(u64::MAX));
        assert_eq!(c["SMALL"], Constant::Int(16));
        assert_eq!(ex.report.constants, 2);
    }

    #[test]
    fn namespaces_are_transparent_and_templates_skipped() {
        let ex = extract(
            "namespace outer { namespace inner {\n\
             template <typename T> T identity(T v) { return v; }\n\
             template <typename T> struct Box { T value; };\n\
             class Widget { public: void draw(); };\n\
             struct Plain { double v; };\n\
             double area(const Plain *p);\n\
             } }\n",
        );
        assert!(ex.tables.structs.contains_key("Plain"));
        assert!(!ex.tables.structs.contains_key("Box"));
        assert_eq!(ex.tables.functions.len(), 1);
        assert_eq!(ex.tables.functions[0].name, "area");
        assert!(ex.report.diagnostics.is_empty(), "{:?}", ex.report.diagnostics);
    }

    #[test]
    fn nested_aggregates_one_level() {
        let ex = extract(
            "typedef struct { struct Inner { int a; } inner; union { int i; float f; } u; int tail; } Outer;",
        );
        let outer = &ex.tables.structs["Outer"];
        assert_eq!(outer.fields[0].declared_type, "Inner");
        assert_eq!(outer.fields[1].declared_type, ANONYMOUS);
        assert_eq!(outer.fields[2].name, "tail");
        assert!(ex.tables.structs.contains_key("Inner"));
    }

    #[test]
    fn deep_nesting_is_malformed_and_skipped() {
        let ex = extract(
            "typedef struct { struct { struct { int x; } a; } b; } Deep;\nint after(void);",
        );
        assert!(!ex.tables.structs.contains_key("Deep"));
        assert_eq!(ex.report.skipped(), 1);
        assert_eq!(ex.tables.functions[0].name, "after");
    }

    #[test]
    fn malformed_fragments_are_reported_and_skipped() {
        let ex = extract("MACRO_CALL(1, 2);\nint ok(int a);\nint broken(int a) trailing junk;\n");
        assert_eq!(ex.tables.functions.len(), 1);
        assert_eq!(ex.tables.functions[0].name, "ok");
        assert_eq!(ex.report.skipped(), 2);
        let d = &ex.report.diagnostics[0];
        assert_eq!((d.line, d.column), (1, 1));
        assert_eq!(d.file, "test.h");
    }

    #[test]
    fn anonymous_enum_members_become_constants() {
        let ex = extract("enum { LIMIT = 8, NEXT_LIMIT };");
        assert_eq!(ex.tables.constants["LIMIT"], Constant::Int(8));
        assert_eq!(ex.tables.constants["NEXT_LIMIT"], Constant::Int(9));
    }

    #[test]
    fn function_pointer_fields() {
        let ex = extract("struct Ops { int (*open)(const char *path); void *user; };");
        let ops = &ex.tables.structs["Ops"];
        assert_eq!(ops.fields[0].name, "open");
        assert!(ops.fields[0].declared_type.contains("(*)"));
        assert_eq!(ops.fields[1].declared_type, "void *");
    }

    #[test]
    fn multi_file_merge() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.i");
        let b = dir.path().join("b.i");
        std::fs::write(&a, "typedef int T;\n#define N 1\ntypedef void (*cb)(void);\nvoid f(void);").unwrap();
        std::fs::write(&b, "typedef long T;\n#define N 2\ntypedef void (*cb2)(void);\nvoid f(void);").unwrap();
        let ex = Extractor::new().extract_files(&[a, b]).unwrap();
        assert_eq!(ex.tables.aliases["T"], "long");
        assert_eq!(ex.tables.constants["N"], Constant::Int(2));
        assert_eq!(ex.tables.function_pointers.len(), 2);
        assert_eq!(ex.tables.functions.len(), 2);
        assert_eq!(ex.report.files, 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = Extractor::new()
            .extract_file(Path::new("/nonexistent/api.i"))
            .unwrap_err();
        assert!(err.to_string().contains("api.i"));
    }
}
