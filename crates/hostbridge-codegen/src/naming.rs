//! Generated symbol names and C++ spelling helpers.

/// Prefix of every generated entry point.
pub const PREFIX: &str = "hb_";

/// Turn a C type spelling into an identifier fragment
/// (`unsigned int` → `unsigned_int`, `std::vector<int>` → `std_vector_int`).
pub fn ident(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    while out.ends_with('_') && out.len() > 1 {
        out.pop();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Registry tag for a canonical type: whitespace is not allowed in tokens.
pub fn tag(canonical: &str) -> String {
    let joined = canonical.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        "void".to_string()
    } else {
        joined
    }
}

pub fn wrapper(function: &str) -> String {
    format!("{PREFIX}{function}")
}

/// Variant of a wrapper that supplies the trailing output buffer itself.
pub fn buffer_wrapper(function: &str) -> String {
    format!("{PREFIX}{function}_text")
}

pub fn create(ty: &str) -> String {
    format!("{PREFIX}create_{}", ident(ty))
}

pub fn to_json(ty: &str) -> String {
    format!("{PREFIX}{}_to_json", ident(ty))
}

pub fn from_json(ty: &str) -> String {
    format!("{PREFIX}{}_from_json", ident(ty))
}

pub fn encoder(ty: &str) -> String {
    format!("{PREFIX}encode_{}", ident(ty))
}

pub fn decoder(ty: &str) -> String {
    format!("{PREFIX}decode_{}", ident(ty))
}

pub fn getter(ty: &str) -> String {
    format!("{PREFIX}{}_get", ident(ty))
}

pub fn setter(ty: &str) -> String {
    format!("{PREFIX}{}_set", ident(ty))
}

/// A C++ string literal for `text`.
pub fn cxx_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// The referenced type of a reference spelling, and whether it is `&&`.
pub fn strip_reference(declared: &str) -> Option<(&str, bool)> {
    let trimmed = declared.trim_end();
    if let Some(rest) = trimmed.strip_suffix("&&") {
        return Some((rest.trim_end(), true));
    }
    trimmed.strip_suffix('&').map(|rest| (rest.trim_end(), false))
}

/// Whether an oversized canonical integer is unsigned.
pub fn is_unsigned(canonical: &str) -> bool {
    canonical.starts_with("unsigned") || canonical.starts_with("uint") || canonical == "size_t"
}
