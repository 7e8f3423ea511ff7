//! Marshalling category assignment.
//!
//! Every type occurrence (return, argument, struct field) gets a
//! [`TypeClassification`]: a pure function of the declared text, the
//! declaration tables and the policy. The host only has doubles and strings,
//! so each category says how a value crosses that boundary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ctype::{self, element_type, ANONYMOUS};
use crate::decl::{ArraySize, DeclTables, FunctionDecl, StructDef};
use crate::policy::BridgePolicy;
use crate::resolve::TypeResolver;

/// How a value crosses the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarshalCategory {
    /// Exactly representable as a double.
    Numeric,
    /// 64-bit integer carried as decimal text.
    OversizedNumeric,
    /// Registry handle token (or host text for `const char*`).
    StringRef,
    /// No value.
    Void,
}

impl MarshalCategory {
    /// The host-side type carrying this category.
    pub fn host_type(self) -> HostType {
        match self {
            MarshalCategory::Numeric => HostType::Number,
            _ => HostType::String,
        }
    }
}

impl fmt::Display for MarshalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarshalCategory::Numeric => write!(f, "numeric"),
            MarshalCategory::OversizedNumeric => write!(f, "oversized"),
            MarshalCategory::StringRef => write!(f, "string-ref"),
            MarshalCategory::Void => write!(f, "void"),
        }
    }
}

/// The two primitive host value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    Number,
    String,
}

/// Where a type occurrence appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Argument,
    Return,
    Field,
}

/// Classification record for one type occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeClassification {
    pub declared_type: String,
    /// Declared spelling without qualifiers or pointers.
    pub base_type: String,
    pub first_alias: Option<String>,
    pub canonical_type: String,
    pub pointer_depth: usize,
    pub has_pointer: bool,
    pub has_const: bool,
    pub is_enum: bool,
    pub is_struct: bool,
    pub is_function_pointer: bool,
    /// `const char*`: passed as host text rather than a handle.
    pub is_c_string: bool,
    /// Canonical spelling came from a `struct`/`enum`/`union` keyword.
    pub elaborated: bool,
    pub unresolved: bool,
    pub category: MarshalCategory,
}

impl TypeClassification {
    pub fn host_type(&self) -> HostType {
        self.category.host_type()
    }

    /// A by-value struct, possibly through an alias.
    pub fn is_struct_value(&self) -> bool {
        self.is_struct && !self.has_pointer
    }
}

/// A struct field with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedField {
    pub name: String,
    pub declared_type: String,
    pub array_size: Option<ArraySize>,
    pub classification: TypeClassification,
    /// Element classification for fixed-size array fields.
    pub element: Option<TypeClassification>,
}

impl ClassifiedField {
    /// Classification of the storage actually embedded in the struct.
    pub fn storage(&self) -> &TypeClassification {
        self.element.as_ref().unwrap_or(&self.classification)
    }

    /// Whether this field embeds another struct by value (directly or as an array).
    pub fn embeds_struct(&self) -> bool {
        self.storage().is_struct_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedStruct {
    pub name: String,
    pub is_union: bool,
    pub fields: Vec<ClassifiedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedParam {
    pub name: String,
    pub declared_type: String,
    pub array_size: Option<ArraySize>,
    pub classification: TypeClassification,
    /// Numeric argument passed as text by the mixed-signature heuristic.
    pub force_string: bool,
}

impl ClassifiedParam {
    pub fn host_type(&self) -> HostType {
        if self.force_string {
            HostType::String
        } else {
            self.classification.host_type()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFunction {
    pub name: String,
    pub return_type: String,
    pub ret: TypeClassification,
    pub params: Vec<ClassifiedParam>,
    pub is_variadic: bool,
}

impl ClassifiedFunction {
    /// Declared spellings of parameters whose type could not be resolved.
    pub fn unresolved_params(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.classification.unresolved)
            .map(|p| p.declared_type.as_str())
            .collect()
    }
}

/// Declaration tables plus their classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedApi {
    pub tables: DeclTables,
    pub structs: BTreeMap<String, ClassifiedStruct>,
    /// One entry per parsed prototype, in source order.
    pub functions: Vec<ClassifiedFunction>,
}

impl ClassifiedApi {
    /// First classified prototype named `name`.
    pub fn function(&self, name: &str) -> Option<&ClassifiedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Classifies type occurrences against fixed tables and policy.
pub struct Classifier<'a> {
    tables: &'a DeclTables,
    policy: &'a BridgePolicy,
    resolver: TypeResolver,
}

impl<'a> Classifier<'a> {
    pub fn new(tables: &'a DeclTables, policy: &'a BridgePolicy) -> Self {
        Self {
            tables,
            policy,
            resolver: TypeResolver::new(tables),
        }
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Classify a single declared type at a position.
    pub fn classify(&self, declared: &str, position: Position) -> TypeClassification {
        let declared = ctype::normalize_spacing(declared);
        let shape = ctype::parse_shape(&declared);
        let res = self.resolver.resolve_shape(&shape);
        let canonical = res.canonical.clone();

        let is_struct = self.tables.is_struct(&canonical);
        let is_enum = self.tables.is_enum(&canonical);
        let is_function_pointer = res.function_syntax
            || self.tables.is_function_pointer(&canonical)
            || self.tables.is_function_pointer(&shape.base)
            || res.chain.iter().any(|a| self.tables.is_function_pointer(a));
        let has_pointer = res.pointer_depth > 0;
        let is_c_string = res.pointer_depth == 1 && res.is_const && canonical == "char";
        let handle_alias = self.policy.is_handle_alias(&shape.base)
            || res.chain.iter().any(|a| self.policy.is_handle_alias(a))
            || self.policy.is_handle_alias(&canonical);

        let mut unresolved = false;
        let category = if handle_alias || has_pointer || is_struct || is_function_pointer {
            MarshalCategory::StringRef
        } else if ctype::is_oversized(&canonical) {
            if self.policy.int64_as_handle {
                MarshalCategory::StringRef
            } else {
                MarshalCategory::OversizedNumeric
            }
        } else if is_enum {
            MarshalCategory::Numeric
        } else if canonical == "void" && position == Position::Return {
            MarshalCategory::Void
        } else if ctype::is_numeric_builtin(&canonical) {
            MarshalCategory::Numeric
        } else {
            debug!(declared = %declared, canonical = %canonical, "unresolvable type");
            unresolved = true;
            MarshalCategory::StringRef
        };
        if canonical == ANONYMOUS {
            unresolved = true;
        }

        TypeClassification {
            base_type: shape.base,
            first_alias: res.first_alias,
            canonical_type: canonical,
            pointer_depth: res.pointer_depth,
            has_pointer,
            has_const: res.is_const,
            is_enum,
            is_struct,
            is_function_pointer,
            is_c_string,
            elaborated: res.elaborated,
            unresolved,
            category,
            declared_type: declared,
        }
    }

    pub fn classify_struct(&self, def: &StructDef) -> ClassifiedStruct {
        let fields = def
            .fields
            .iter()
            .map(|f| ClassifiedField {
                name: f.name.clone(),
                declared_type: f.declared_type.clone(),
                array_size: f.array_size.clone(),
                classification: self.classify(&f.declared_type, Position::Field),
                element: f
                    .array_size
                    .as_ref()
                    .map(|_| self.classify(&element_type(&f.declared_type), Position::Field)),
            })
            .collect();
        ClassifiedStruct {
            name: def.name.clone(),
            is_union: def.is_union,
            fields,
        }
    }

    pub fn classify_function(&self, decl: &FunctionDecl) -> ClassifiedFunction {
        let mut params: Vec<ClassifiedParam> = decl
            .params
            .iter()
            .map(|p| ClassifiedParam {
                name: p.name.clone(),
                declared_type: p.declared_type.clone(),
                array_size: p.array_size.clone(),
                classification: self.classify(&p.declared_type, Position::Argument),
                force_string: false,
            })
            .collect();

        if let Some(threshold) = self.policy.force_string_threshold {
            let has = |cat| params.iter().any(|p| p.classification.category == cat);
            let mixed = has(MarshalCategory::Numeric) && has(MarshalCategory::StringRef);
            if mixed && params.len() > threshold {
                debug!(function = %decl.name, "passing numeric arguments as text");
                for p in params
                    .iter_mut()
                    .filter(|p| p.classification.category == MarshalCategory::Numeric)
                {
                    p.force_string = true;
                }
            }
        }

        ClassifiedFunction {
            name: decl.name.clone(),
            return_type: decl.return_type.clone(),
            ret: self.classify(&decl.return_type, Position::Return),
            params,
            is_variadic: decl.is_variadic,
        }
    }
}

/// Classify every struct and function in the tables.
#[tracing::instrument(level = "debug", skip_all, fields(structs = tables.structs.len(), functions = tables.functions.len()))]
pub fn classify_api(tables: DeclTables, policy: &BridgePolicy) -> ClassifiedApi {
    let (structs, functions) = {
        let classifier = Classifier::new(&tables, policy);
        let structs = tables
            .structs
            .iter()
            .map(|(name, def)| (name.clone(), classifier.classify_struct(def)))
            .collect();
        let functions = tables
            .functions
            .iter()
            .map(|f| classifier.classify_function(f))
            .collect();
        (structs, functions)
    };
    ClassifiedApi {
        tables,
        structs,
        functions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{EnumDef, EnumMember, FieldDecl, ParamDecl};

    fn sample_tables() -> DeclTables {
        let mut t = DeclTables::new();
        t.aliases.insert("XrInstance".into(), "struct XrInstance_T *".into());
        t.aliases.insert("XrBool32".into(), "uint32_t".into());
        t.aliases.insert("XrTime".into(), "int64_t".into());
        t.aliases.insert("Loop".into(), "Loop2".into());
        t.aliases.insert("Loop2".into(), "Loop".into());
        t.function_pointers.insert("PFN_cb".into());
        t.enums.insert(
            "XrResult".into(),
            EnumDef::new(
                "XrResult",
                vec![EnumMember {
                    name: "XR_SUCCESS".into(),
                    value: 0,
                }],
            ),
        );
        t.structs.insert(
            "Vec2".into(),
            StructDef {
                name: "Vec2".into(),
                fields: vec![
                    FieldDecl {
                        name: "x".into(),
                        declared_type: "float".into(),
                        array_size: None,
                    },
                    FieldDecl {
                        name: "y".into(),
                        declared_type: "float".into(),
                        array_size: None,
                    },
                ],
                is_union: false,
            },
        );
        t
    }

    fn classify(declared: &str, position: Position) -> TypeClassification {
        let t = sample_tables();
        let policy = BridgePolicy::default();
        Classifier::new(&t, &policy).classify(declared, position)
    }

    #[test]
    fn priority_order() {
        assert_eq!(classify("XrInstance", Position::Argument).category, MarshalCategory::StringRef);
        assert_eq!(classify("Vec2", Position::Argument).category, MarshalCategory::StringRef);
        assert_eq!(classify("PFN_cb", Position::Argument).category, MarshalCategory::StringRef);
        assert_eq!(classify("XrTime", Position::Argument).category, MarshalCategory::OversizedNumeric);
        assert_eq!(classify("XrResult", Position::Return).category, MarshalCategory::Numeric);
        assert_eq!(classify("void", Position::Return).category, MarshalCategory::Void);
        assert_eq!(classify("XrBool32", Position::Argument).category, MarshalCategory::Numeric);
        assert_eq!(classify("double", Position::Field).category, MarshalCategory::Numeric);
    }

    #[test]
    fn long_double_is_numeric() {
        let mut t = DeclTables::new();
        t.functions.push(FunctionDecl {
            name: "lerp".into(),
            return_type: "long double".into(),
            params: vec![ParamDecl {
                name: "a".into(),
                declared_type: "long double".into(),
                array_size: None,
            }],
            is_variadic: false,
        });
        let api = classify_api(t, &BridgePolicy::default());
        let lerp = api.function("lerp").unwrap();
        assert_eq!(lerp.ret.category, MarshalCategory::Numeric);
        assert_eq!(lerp.params[0].classification.category, MarshalCategory::Numeric);
        assert!(!lerp.params[0].classification.unresolved);
        assert_eq!(
            classify("const long double", Position::Field).category,
            MarshalCategory::Numeric
        );
    }

    #[test]
    fn c_string_only_for_const_char_pointer() {
        let c = classify("const char *", Position::Argument);
        assert!(c.is_c_string);
        assert_eq!(c.category, MarshalCategory::StringRef);
        assert!(!classify("char *", Position::Argument).is_c_string);
        assert!(!classify("const char **", Position::Argument).is_c_string);
    }

    #[test]
    fn unknown_type_is_unresolved_string_ref() {
        let c = classify("std::string", Position::Argument);
        assert!(c.unresolved);
        assert_eq!(c.category, MarshalCategory::StringRef);
        let anon = classify("<anonymous>", Position::Field);
        assert!(anon.unresolved);
    }

    #[test]
    fn classification_is_idempotent() {
        let t = sample_tables();
        let policy = BridgePolicy::default();
        let classifier = Classifier::new(&t, &policy);
        let a = classifier.classify("const XrInstance *", Position::Argument);
        let b = classifier.classify("const XrInstance *", Position::Argument);
        assert_eq!(a, b);
    }

    #[test]
    fn cyclic_alias_classifies_without_hanging() {
        let c = classify("Loop", Position::Argument);
        assert!(c.unresolved);
        assert_eq!(c.canonical_type, "Loop2");
    }

    #[test]
    fn int64_as_handle_policy() {
        let t = sample_tables();
        let policy = BridgePolicy {
            int64_as_handle: true,
            ..Default::default()
        };
        let c = Classifier::new(&t, &policy).classify("XrTime", Position::Argument);
        assert_eq!(c.category, MarshalCategory::StringRef);
    }

    #[test]
    fn handle_alias_wins_over_numeric() {
        let t = sample_tables();
        let policy = BridgePolicy {
            handle_aliases: vec!["XrBool32".into()],
            ..Default::default()
        };
        let c = Classifier::new(&t, &policy).classify("XrBool32", Position::Argument);
        assert_eq!(c.category, MarshalCategory::StringRef);
    }

    #[test]
    fn array_field_gets_element_classification() {
        let mut t = sample_tables();
        t.structs.insert(
            "Path".into(),
            StructDef {
                name: "Path".into(),
                fields: vec![
                    FieldDecl {
                        name: "name".into(),
                        declared_type: "char *".into(),
                        array_size: Some(ArraySize::Literal(64)),
                    },
                    FieldDecl {
                        name: "points".into(),
                        declared_type: "Vec2 *".into(),
                        array_size: Some(ArraySize::Symbolic("MAX_POINTS".into())),
                    },
                ],
                is_union: false,
            },
        );
        let api = classify_api(t, &BridgePolicy::default());
        let path = &api.structs["Path"];
        let name = &path.fields[0];
        assert_eq!(name.storage().canonical_type, "char");
        assert_eq!(name.storage().category, MarshalCategory::Numeric);
        assert!(!name.embeds_struct());
        assert!(path.fields[1].embeds_struct());
    }

    #[test]
    fn force_string_threshold_marks_numeric_args() {
        let mut t = sample_tables();
        t.functions.push(FunctionDecl {
            name: "mixed".into(),
            return_type: "void".into(),
            params: ["XrInstance", "int", "float", "int"]
                .iter()
                .enumerate()
                .map(|(i, ty)| ParamDecl {
                    name: format!("a{i}"),
                    declared_type: ty.to_string(),
                    array_size: None,
                })
                .collect(),
            is_variadic: false,
        });
        let policy = BridgePolicy {
            force_string_threshold: Some(3),
            ..Default::default()
        };
        let api = classify_api(t.clone(), &policy);
        let f = api.function("mixed").unwrap();
        assert!(!f.params[0].force_string);
        assert!(f.params[1..].iter().all(|p| p.force_string));
        assert_eq!(f.params[1].host_type(), HostType::String);

        let api = classify_api(t, &BridgePolicy::default());
        assert!(api.function("mixed").unwrap().params.iter().all(|p| !p.force_string));
    }
}
