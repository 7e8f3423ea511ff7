//! Memoized alias-chain resolution.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ctype::{parse_shape, TypeShape};
use crate::decl::DeclTables;

/// The outcome of substituting a declared type through the alias table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Terminal type name after all substitutions.
    pub canonical: String,
    /// Immediate target of the declared base, if the base is an alias.
    pub first_alias: Option<String>,
    /// Alias names visited, in substitution order.
    pub chain: Vec<String>,
    /// Total indirection accumulated along the chain.
    pub pointer_depth: usize,
    pub is_const: bool,
    /// The terminal spelling carried a `struct`/`enum`/`union` keyword.
    pub elaborated: bool,
    /// Resolution stopped on a repeated alias.
    pub cyclic: bool,
    /// The chain ended in inline function-pointer syntax.
    pub function_syntax: bool,
}

/// Per-alias result, relative to the alias name itself.
#[derive(Debug, Clone)]
struct AliasTarget {
    canonical: String,
    first: String,
    chain: Vec<String>,
    pointer_depth: usize,
    is_const: bool,
    elaborated: bool,
    cyclic: bool,
    function_syntax: bool,
}

/// Resolves declared types against a fixed alias table.
///
/// Every alias is resolved once at construction; lookups afterwards are
/// plain map reads.
#[derive(Debug, Clone, Default)]
pub struct TypeResolver {
    resolved: BTreeMap<String, AliasTarget>,
}

impl TypeResolver {
    pub fn new(tables: &DeclTables) -> Self {
        let resolved = tables
            .aliases
            .keys()
            .map(|name| (name.clone(), resolve_alias(name, &tables.aliases)))
            .collect();
        Self { resolved }
    }

    /// Resolve a declared type spelling.
    pub fn resolve(&self, declared: &str) -> Resolution {
        let shape = parse_shape(declared);
        self.resolve_shape(&shape)
    }

    pub fn resolve_shape(&self, shape: &TypeShape) -> Resolution {
        match self.resolved.get(&shape.base) {
            Some(target) => Resolution {
                canonical: target.canonical.clone(),
                first_alias: Some(target.first.clone()),
                chain: target.chain.clone(),
                pointer_depth: shape.indirection() + target.pointer_depth,
                is_const: shape.is_const || target.is_const,
                elaborated: target.elaborated,
                cyclic: target.cyclic,
                function_syntax: shape.function_syntax || target.function_syntax,
            },
            None => Resolution {
                canonical: shape.base.clone(),
                first_alias: None,
                chain: Vec::new(),
                pointer_depth: shape.indirection(),
                is_const: shape.is_const,
                elaborated: shape.elaborated,
                cyclic: false,
                function_syntax: shape.function_syntax,
            },
        }
    }
}

fn resolve_alias(name: &str, aliases: &BTreeMap<String, String>) -> AliasTarget {
    let mut seen: HashSet<String> = HashSet::from([name.to_string()]);
    let mut chain = vec![name.to_string()];
    let mut current = name.to_string();
    let mut first = None;
    let mut pointer_depth = 0;
    let mut is_const = false;
    let mut elaborated = false;
    let mut cyclic = false;
    let mut function_syntax = false;

    while let Some(target) = aliases.get(&current) {
        let shape = parse_shape(target);
        pointer_depth += shape.indirection();
        is_const |= shape.is_const;
        elaborated = shape.elaborated;
        first.get_or_insert_with(|| shape.base.clone());

        if shape.function_syntax {
            function_syntax = true;
            break;
        }
        // `typedef struct Foo Foo;` names itself; that is a terminal, not a loop.
        if shape.base == current {
            break;
        }
        if seen.contains(&shape.base) {
            cyclic = true;
            break;
        }
        if aliases.contains_key(&shape.base) {
            seen.insert(shape.base.clone());
            chain.push(shape.base.clone());
        }
        current = shape.base;
    }

    AliasTarget {
        first: first.unwrap_or_else(|| name.to_string()),
        canonical: current,
        chain,
        pointer_depth,
        is_const,
        elaborated,
        cyclic,
        function_syntax,
    }
}
