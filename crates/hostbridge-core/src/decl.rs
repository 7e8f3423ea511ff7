//! Raw declaration tables.
//!
//! These are built once per parse pass by the extractor and are read-only
//! afterwards. Nothing here is classified yet; see [`crate::classify`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Captured size of a C array declarator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArraySize {
    /// Integer literal size (multi-dimensional sizes are multiplied).
    Literal(u64),
    /// Symbolic size such as `XR_MAX_PATH_LENGTH`.
    Symbolic(String),
}

impl ArraySize {
    /// The literal element count, if known.
    pub fn literal(&self) -> Option<u64> {
        match self {
            ArraySize::Literal(n) => Some(*n),
            ArraySize::Symbolic(_) => None,
        }
    }
}

impl fmt::Display for ArraySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArraySize::Literal(n) => write!(f, "{n}"),
            ArraySize::Symbolic(s) => write!(f, "{s}"),
        }
    }
}

/// A single struct field. Array fields carry a pointer-typed
/// `declared_type` plus the captured size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub declared_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_size: Option<ArraySize>,
}

/// A struct or union definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub is_union: bool,
}

/// One enumerator and its resolved value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

/// An enum with display-stripping metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<EnumMember>,
    /// Common `_`-separated prefix shared by the members (e.g. `XR_TYPE_`).
    pub prefix: String,
    /// Common uppercase suffix shared by every member (e.g. `_EXT`).
    pub suffix: Option<String>,
}

impl EnumDef {
    /// Build an enum, computing the display prefix/suffix from its members.
    pub fn new(name: impl Into<String>, members: Vec<EnumMember>) -> Self {
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        let prefix = common_prefix(&names);
        let suffix = common_suffix(&names);
        Self {
            name: name.into(),
            members,
            prefix,
            suffix,
        }
    }

    /// Look up a member value by name.
    pub fn value(&self, member: &str) -> Option<i64> {
        self.members.iter().find(|m| m.name == member).map(|m| m.value)
    }

    /// Member name with the shared prefix/suffix removed.
    ///
    /// Falls back to the full name when stripping would leave nothing, and
    /// prefixes `_` when the result would start with a digit.
    pub fn display_member(&self, member: &str) -> String {
        let mut short = member.strip_prefix(self.prefix.as_str()).unwrap_or(member);
        if let Some(suffix) = &self.suffix {
            if let Some(stripped) = short.strip_suffix(suffix.as_str()) {
                short = stripped;
            }
        }
        if short.is_empty() {
            short = member;
        }
        if short.starts_with(|c: char| c.is_ascii_digit()) {
            format!("_{short}")
        } else {
            short.to_string()
        }
    }

    /// Enum name with the display namespace removed.
    pub fn display_name(&self, namespace: &str) -> String {
        strip_namespace(&self.name, namespace)
    }
}

/// Remove a case-insensitive namespace prefix from a name.
///
/// The name is left untouched if stripping would empty it.
pub fn strip_namespace(name: &str, namespace: &str) -> String {
    if namespace.is_empty() || name.len() <= namespace.len() {
        return name.to_string();
    }
    let (head, tail) = name.split_at(namespace.len());
    if head.eq_ignore_ascii_case(namespace) {
        tail.trim_start_matches('_').to_string()
    } else {
        name.to_string()
    }
}

fn common_prefix(names: &[&str]) -> String {
    let parts: Vec<Vec<&str>> = names
        .iter()
        .filter(|n| n.contains('_'))
        .map(|n| n.split('_').collect())
        .collect();
    if parts.len() < 2 {
        return String::new();
    }
    // Never consume a member's final segment.
    let limit = parts.iter().map(|p| p.len() - 1).min().unwrap_or(0);
    let mut common = Vec::new();
    for i in 0..limit {
        let seg = parts[0][i];
        if parts.iter().all(|p| p[i] == seg) {
            common.push(seg);
        } else {
            break;
        }
    }
    if common.is_empty() {
        String::new()
    } else {
        format!("{}_", common.join("_"))
    }
}

fn common_suffix(names: &[&str]) -> Option<String> {
    if names.len() < 2 || !names.iter().all(|n| n.contains('_')) {
        return None;
    }
    let first = names[0].rsplit('_').next()?;
    let uniform = names.iter().all(|n| n.rsplit('_').next() == Some(first));
    let upper = first.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && first.chars().any(|c| c.is_ascii_uppercase());
    (uniform && upper && first.len() >= 2).then(|| format!("_{first}"))
}

/// A function parameter as written in the prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub declared_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_size: Option<ArraySize>,
}

/// A function prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: String,
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub is_variadic: bool,
}

/// A `#define` constant that survived constant filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constant {
    Int(i64),
    /// Integer literals above `i64::MAX`, such as all-bits masks.
    UInt(u64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::UInt(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v}"),
            Constant::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// All declarations extracted from one or more translation units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclTables {
    /// Alias name → underlying type text (`typedef`, `using`, handle typedefs).
    pub aliases: BTreeMap<String, String>,
    pub enums: BTreeMap<String, EnumDef>,
    pub structs: BTreeMap<String, StructDef>,
    /// Names of function-pointer typedefs.
    pub function_pointers: BTreeSet<String>,
    pub constants: BTreeMap<String, Constant>,
    /// Prototypes in source order; may contain duplicates across files.
    pub functions: Vec<FunctionDecl>,
}

impl DeclTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another file's tables into this one.
    ///
    /// Scalar tables are last-file-wins; function-pointer aliases are unioned;
    /// functions are concatenated without de-duplication.
    pub fn merge(&mut self, other: DeclTables) {
        self.aliases.extend(other.aliases);
        self.enums.extend(other.enums);
        self.structs.extend(other.structs);
        self.function_pointers.extend(other.function_pointers);
        self.constants.extend(other.constants);
        self.functions.extend(other.functions);
    }

    pub fn is_struct(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn is_function_pointer(&self, name: &str) -> bool {
        self.function_pointers.contains(name)
    }

    /// First prototype declared under `name`.
    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(pairs: &[(&str, i64)]) -> Vec<EnumMember> {
        pairs
            .iter()
            .map(|(n, v)| EnumMember {
                name: n.to_string(),
                value: *v,
            })
            .collect()
    }

    #[test]
    fn enum_prefix_and_suffix() {
        let e = EnumDef::new(
            "XrFormFactor",
            members(&[
                ("XR_FORM_FACTOR_HEAD_MOUNTED_DISPLAY", 1),
                ("XR_FORM_FACTOR_HANDHELD_DISPLAY", 2),
                ("XR_FORM_FACTOR_MAX_ENUM", 0x7FFF_FFFF),
            ]),
        );
        assert_eq!(e.prefix, "XR_FORM_FACTOR_");
        assert_eq!(e.suffix, None);
        assert_eq!(e.display_member("XR_FORM_FACTOR_HANDHELD_DISPLAY"), "HANDHELD_DISPLAY");
        assert_eq!(e.display_name("Xr"), "FormFactor");
    }

    #[test]
    fn enum_uniform_suffix_stripped() {
        let e = EnumDef::new(
            "Flags",
            members(&[("FLAG_A_EXT", 0), ("FLAG_B_EXT", 1)]),
        );
        assert_eq!(e.prefix, "FLAG_");
        assert_eq!(e.suffix.as_deref(), Some("_EXT"));
        assert_eq!(e.display_member("FLAG_A_EXT"), "A");
    }

    #[test]
    fn display_member_guards_digits_and_empty() {
        let e = EnumDef::new("Dim", members(&[("DIM_2D", 0), ("DIM_3D", 1)]));
        assert_eq!(e.display_member("DIM_2D"), "_2D");
        let single = EnumDef::new("One", members(&[("ONLY", 0)]));
        assert_eq!(single.display_member("ONLY"), "ONLY");
    }

    #[test]
    fn merge_is_last_file_wins_and_concatenates_functions() {
        let mut a = DeclTables::new();
        a.aliases.insert("T".into(), "int".into());
        a.constants.insert("N".into(), Constant::Int(1));
        a.functions.push(FunctionDecl {
            name: "f".into(),
            return_type: "void".into(),
            params: vec![],
            is_variadic: false,
        });

        let mut b = DeclTables::new();
        b.aliases.insert("T".into(), "long".into());
        b.constants.insert("N".into(), Constant::Int(2));
        b.functions.push(a.functions[0].clone());

        a.merge(b);
        assert_eq!(a.aliases["T"], "long");
        assert_eq!(a.constants["N"], Constant::Int(2));
        assert_eq!(a.functions.len(), 2);
    }

    #[test]
    fn strip_namespace_is_case_insensitive() {
        assert_eq!(strip_namespace("xrCreateInstance", "XR"), "CreateInstance");
        assert_eq!(strip_namespace("XR_VERSION", "xr"), "VERSION");
        assert_eq!(strip_namespace("Xr", "xr"), "Xr");
        assert_eq!(strip_namespace("other", "xr"), "other");
    }
}
