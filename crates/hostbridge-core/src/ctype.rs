//! C type text utilities.
//!
//! Declared types arrive as whitespace-normalized text (`const char *`,
//! `struct XrInstance_T *`, `std::vector<int> &`). These helpers split that
//! text into a base spelling plus pointer/qualifier decorations and
//! canonicalize builtin keyword combinations.

/// Integer types whose full range does not fit exactly in a double.
pub const OVERSIZED_INTEGERS: &[&str] = &[
    "long long",
    "unsigned long long",
    "int64_t",
    "uint64_t",
    "intptr_t",
    "uintptr_t",
    "size_t",
    "ssize_t",
    "ptrdiff_t",
    "__int64",
    "unsigned __int64",
];

/// Integers that are at most 32 bits wide on supported targets.
pub const SAFE_INTEGERS: &[&str] = &[
    "char",
    "signed char",
    "unsigned char",
    "short",
    "unsigned short",
    "int",
    "unsigned int",
    "long",
    "unsigned long",
    "int8_t",
    "int16_t",
    "int32_t",
    "uint8_t",
    "uint16_t",
    "uint32_t",
    "wchar_t",
    "char16_t",
    "char32_t",
];

pub const FLOATS: &[&str] = &["float", "double", "long double"];

pub const BOOLS: &[&str] = &["bool", "_Bool"];

/// Placeholder type for nested aggregates without a tag.
pub const ANONYMOUS: &str = "<anonymous>";

const BUILTIN_KEYWORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "bool",
    "_Bool", "__int64",
];

const QUALIFIERS: &[&str] = &["const", "volatile", "restrict", "__restrict", "__restrict__"];

const ELABORATORS: &[&str] = &["struct", "enum", "union", "class", "typename"];

const STORAGE: &[&str] = &["extern", "static", "inline", "__inline", "__inline__", "register", "mutable"];

/// Whether a single token is a builtin type keyword.
pub fn is_builtin_keyword(word: &str) -> bool {
    BUILTIN_KEYWORDS.contains(&word)
}

pub fn is_oversized(canonical: &str) -> bool {
    OVERSIZED_INTEGERS.contains(&canonical)
}

/// Bool, float/double or an integer of at most 32 bits.
pub fn is_numeric_builtin(canonical: &str) -> bool {
    SAFE_INTEGERS.contains(&canonical) || FLOATS.contains(&canonical) || BOOLS.contains(&canonical)
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_spacing(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical spelling of a builtin keyword combination.
///
/// `unsigned` → `unsigned int`, `long int` → `long`, `signed short int` →
/// `short`. Returns `None` if the words are not a valid builtin combination.
pub fn canonical_builtin(words: &[&str]) -> Option<String> {
    if words.is_empty() || !words.iter().all(|w| is_builtin_keyword(w)) {
        return None;
    }
    let count = |kw: &str| words.iter().filter(|w| **w == kw).count();
    let unsigned = count("unsigned") > 0;
    let signed = count("signed") > 0;
    let longs = count("long");
    let sign_prefix = if unsigned { "unsigned " } else { "" };
    let rest: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !matches!(*w, "unsigned" | "signed" | "long" | "int"))
        .collect();

    let canonical = match rest.as_slice() {
        [] => match longs {
            0 => format!("{sign_prefix}int"),
            1 => format!("{sign_prefix}long"),
            2 => format!("{sign_prefix}long long"),
            _ => return None,
        },
        ["char"] if longs == 0 => {
            if unsigned {
                "unsigned char".to_string()
            } else if signed {
                "signed char".to_string()
            } else {
                "char".to_string()
            }
        }
        ["short"] if longs == 0 => format!("{sign_prefix}short"),
        ["__int64"] if longs == 0 => format!("{sign_prefix}__int64"),
        ["double"] if !unsigned && !signed && longs <= 1 => {
            if longs == 1 {
                "long double".to_string()
            } else {
                "double".to_string()
            }
        }
        [single @ ("void" | "float" | "bool" | "_Bool")]
            if !unsigned && !signed && longs == 0 && words.len() == 1 =>
        {
            single.to_string()
        }
        _ => return None,
    };
    Some(canonical)
}

/// Decomposed spelling of a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeShape {
    /// Qualifier- and pointer-free spelling, builtins canonicalized.
    pub base: String,
    pub pointer_depth: usize,
    pub is_const: bool,
    /// Declared with `&` or `&&`; treated as an extra indirection.
    pub is_reference: bool,
    /// Spelled with a `struct`/`enum`/`union`/`class` keyword.
    pub elaborated: bool,
    /// Inline function-pointer syntax such as `void (*)(int)`.
    pub function_syntax: bool,
}

impl TypeShape {
    /// Pointer depth counting a reference as one level.
    pub fn indirection(&self) -> usize {
        self.pointer_depth + usize::from(self.is_reference)
    }
}

/// Split type text into words and punctuation, keeping template argument
/// lists attached to the identifier they follow.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut angle = 0usize;

    for ch in text.chars() {
        match ch {
            '<' => {
                angle += 1;
                current.push(ch);
            }
            '>' if angle > 0 => {
                angle -= 1;
                current.push(ch);
            }
            _ if angle > 0 => current.push(ch),
            '*' | '&' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Whether `(*` appears outside any template argument list.
fn has_function_syntax(text: &str) -> bool {
    let mut angle = 0usize;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '<' => angle += 1,
            '>' => angle = angle.saturating_sub(1),
            '(' if angle == 0 => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
                if chars.peek() == Some(&'*') {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Parse declared type text into a [`TypeShape`].
pub fn parse_shape(text: &str) -> TypeShape {
    let text = text.trim();
    if has_function_syntax(text) {
        let ret = text.split('(').next().unwrap_or(text);
        let mut shape = parse_shape(ret);
        shape.function_syntax = true;
        return shape;
    }

    let mut shape = TypeShape::default();
    let mut words: Vec<String> = Vec::new();
    for token in tokenize(text) {
        match token.as_str() {
            "*" => shape.pointer_depth += 1,
            "&" => shape.is_reference = true,
            "const" => shape.is_const = true,
            t if QUALIFIERS.contains(&t) || STORAGE.contains(&t) => {}
            t if ELABORATORS.contains(&t) => shape.elaborated = true,
            _ => words.push(token),
        }
    }

    let refs: Vec<&str> = words.iter().map(String::as_str).collect();
    shape.base = canonical_builtin(&refs).unwrap_or_else(|| refs.join(" "));
    shape
}

/// The element type of a normalized array declarator (`char *` → `char`).
pub fn element_type(declared: &str) -> String {
    match declared.trim_end().strip_suffix('*') {
        Some(rest) => normalize_spacing(rest),
        None => normalize_spacing(declared),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_builtin_spellings() {
        assert_eq!(canonical_builtin(&["unsigned"]).as_deref(), Some("unsigned int"));
        assert_eq!(canonical_builtin(&["long", "int"]).as_deref(), Some("long"));
        assert_eq!(
            canonical_builtin(&["signed", "short", "int"]).as_deref(),
            Some("short")
        );
        assert_eq!(
            canonical_builtin(&["unsigned", "long", "long", "int"]).as_deref(),
            Some("unsigned long long")
        );
        assert_eq!(canonical_builtin(&["signed", "char"]).as_deref(), Some("signed char"));
        assert_eq!(canonical_builtin(&["long", "double"]).as_deref(), Some("long double"));
        assert_eq!(canonical_builtin(&["char", "double"]), None);
        assert_eq!(canonical_builtin(&["uint32_t"]), None);
    }

    #[test]
    fn shape_of_const_char_pointer() {
        let shape = parse_shape("const char *");
        assert_eq!(shape.base, "char");
        assert_eq!(shape.pointer_depth, 1);
        assert!(shape.is_const);
        assert!(!shape.elaborated);
    }

    #[test]
    fn shape_of_elaborated_handle() {
        let shape = parse_shape("struct XrInstance_T*");
        assert_eq!(shape.base, "XrInstance_T");
        assert_eq!(shape.pointer_depth, 1);
        assert!(shape.elaborated);
    }

    #[test]
    fn shape_keeps_template_arguments() {
        let shape = parse_shape("const std::map<int, char *> &");
        assert_eq!(shape.base, "std::map<int, char *>");
        assert_eq!(shape.pointer_depth, 0);
        assert!(shape.is_reference);
        assert_eq!(shape.indirection(), 1);
    }

    #[test]
    fn shape_detects_function_syntax() {
        let shape = parse_shape("void (*)(int, float)");
        assert!(shape.function_syntax);
        assert_eq!(shape.base, "void");
    }

    #[test]
    fn element_type_strips_one_pointer() {
        assert_eq!(element_type("char *"), "char");
        assert_eq!(element_type("float **"), "float *");
        assert_eq!(element_type("int"), "int");
    }

    #[test]
    fn numeric_families() {
        assert!(is_oversized("uint64_t"));
        assert!(is_oversized("size_t"));
        assert!(!is_oversized("int"));
        assert!(is_numeric_builtin("unsigned char"));
        assert!(is_numeric_builtin("_Bool"));
        assert!(is_numeric_builtin("long double"));
        assert!(!is_numeric_builtin("long long"));
    }
}
