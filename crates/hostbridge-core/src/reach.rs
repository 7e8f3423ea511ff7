//! Reachability closure and struct dependency ordering.
//!
//! Given a classified API and an export list, determines which types the
//! bridge must cover and the order in which struct codecs are emitted.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::{ClassifiedApi, ClassifiedFunction, ClassifiedStruct, TypeClassification};
use crate::ctype::{self, ANONYMOUS};
use crate::decl::{Constant, EnumDef};
use crate::error::{BridgeError, Result};
use crate::policy::BridgePolicy;

/// Storage shape of a residual native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeKind {
    /// Double-representable scalar: numeric get/set shims.
    Numeric,
    /// 64-bit integer: textual get/set shims.
    Oversized,
    /// Anything else: constructor only.
    Opaque,
}

/// A reachable type that is not a struct, enum, alias or function pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeType {
    pub name: String,
    pub kind: NativeKind,
}

/// The ordered subset of an API reachable from the export list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachableApi {
    /// Exported functions in export-list order.
    pub functions: Vec<ClassifiedFunction>,
    /// Reachable structs, every struct after the structs it embeds.
    pub structs: Vec<ClassifiedStruct>,
    pub enums: Vec<EnumDef>,
    pub function_pointers: Vec<String>,
    pub native_types: Vec<NativeType>,
    pub constants: BTreeMap<String, Constant>,
    /// Requested exports with no parsed prototype.
    pub missing_exports: Vec<String>,
    /// Functions dropped by `skip_function_prefixes`.
    pub skipped_by_prefix: Vec<String>,
}

impl ReachableApi {
    pub fn struct_order(&self) -> Vec<&str> {
        self.structs.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Select exported functions and compute the reachable closure.
///
/// With no export list every parsed function is a candidate.
#[tracing::instrument(level = "debug", skip_all, fields(functions = api.functions.len()))]
pub fn compute_reachable(
    api: &ClassifiedApi,
    exports: Option<&[String]>,
    policy: &BridgePolicy,
) -> Result<ReachableApi> {
    let requested: Vec<String> = match exports {
        Some(list) => list.to_vec(),
        None => {
            let mut seen = BTreeSet::new();
            api.functions
                .iter()
                .filter(|f| seen.insert(f.name.as_str()))
                .map(|f| f.name.clone())
                .collect()
        }
    };

    let mut functions = Vec::new();
    let mut missing_exports = Vec::new();
    let mut skipped_by_prefix = Vec::new();
    let mut selected = BTreeSet::new();
    for name in &requested {
        if policy.is_skipped(name) {
            debug!(function = %name, "skipped by prefix");
            skipped_by_prefix.push(name.clone());
            continue;
        }
        match api.function(name) {
            Some(f) if selected.insert(name.as_str()) => functions.push(f.clone()),
            Some(_) => {}
            None => {
                warn!(function = %name, "export has no parsed prototype");
                missing_exports.push(name.clone());
            }
        }
    }

    let reachable = reachable_types(api, &functions);

    let reachable_structs: BTreeSet<&str> = reachable
        .keys()
        .map(String::as_str)
        .filter(|name| api.structs.contains_key(*name))
        .collect();
    let order = order_structs(api, &reachable_structs)?;
    let structs = order
        .iter()
        .filter_map(|name| api.structs.get(name).cloned())
        .collect::<Vec<_>>();

    let tables = &api.tables;
    let enums = reachable
        .keys()
        .filter_map(|name| tables.enums.get(name).cloned())
        .collect::<Vec<_>>();
    let function_pointers = reachable
        .keys()
        .filter(|name| tables.is_function_pointer(name))
        .cloned()
        .collect::<Vec<_>>();

    let native_types = reachable
        .iter()
        .filter(|(name, class)| {
            !tables.is_struct(name)
                && !tables.is_enum(name)
                && !tables.is_alias(name)
                && !tables.is_function_pointer(name)
                && tables.function(name).is_none()
                && !class.is_function_pointer
                && !class.elaborated
                && name.as_str() != "void"
                && name.as_str() != ANONYMOUS
                && !name.is_empty()
        })
        .map(|(name, _)| NativeType {
            name: name.clone(),
            kind: if ctype::is_oversized(name) {
                NativeKind::Oversized
            } else if ctype::is_numeric_builtin(name) {
                NativeKind::Numeric
            } else {
                NativeKind::Opaque
            },
        })
        .collect::<Vec<_>>();

    info!(
        functions = functions.len(),
        structs = structs.len(),
        enums = enums.len(),
        native_types = native_types.len(),
        missing = missing_exports.len(),
        "reachable api computed"
    );

    Ok(ReachableApi {
        functions,
        structs,
        enums,
        function_pointers,
        native_types,
        constants: tables.constants.clone(),
        missing_exports,
        skipped_by_prefix,
    })
}

/// Canonical types transitively referenced by the given functions.
///
/// Keyed by canonical name; the value is the first classification seen.
pub fn reachable_types<'a>(
    api: &'a ClassifiedApi,
    functions: &'a [ClassifiedFunction],
) -> BTreeMap<String, &'a TypeClassification> {
    let mut found: BTreeMap<String, &TypeClassification> = BTreeMap::new();
    for f in functions {
        found.entry(f.ret.canonical_type.clone()).or_insert(&f.ret);
        for p in &f.params {
            found
                .entry(p.classification.canonical_type.clone())
                .or_insert(&p.classification);
        }
    }

    loop {
        let mut added = false;
        let structs: Vec<&ClassifiedStruct> = found
            .keys()
            .filter_map(|name| api.structs.get(name))
            .collect();
        for s in structs {
            for field in &s.fields {
                let class = field.storage();
                if !found.contains_key(&class.canonical_type) {
                    found.insert(class.canonical_type.clone(), class);
                    added = true;
                }
            }
        }
        if !added {
            break;
        }
    }
    found
}

/// Order structs so each comes after every struct it embeds by value.
///
/// Kahn's algorithm with a sorted ready queue. Pointer fields add no edge.
pub fn order_structs(api: &ClassifiedApi, names: &BTreeSet<&str>) -> Result<Vec<String>> {
    // dependency -> dependents
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = names.iter().map(|n| (*n, 0)).collect();

    for name in names {
        let Some(s) = api.structs.get(*name) else { continue };
        let deps: BTreeSet<&str> = s
            .fields
            .iter()
            .filter(|f| f.embeds_struct())
            .map(|f| f.storage().canonical_type.as_str())
            .filter(|dep| names.contains(dep))
            .collect();
        for dep in deps {
            dependents.entry(dep).or_default().push(*name);
            *in_degree.entry(*name).or_default() += 1;
        }
    }

    let mut queue: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| *id)
        .collect();
    // Reverse-sorted so `pop` yields the smallest name first.
    queue.sort_by(|a, b| b.cmp(a));

    let mut result = Vec::with_capacity(names.len());
    while let Some(node) = queue.pop() {
        result.push(node.to_string());
        if let Some(targets) = dependents.get(node) {
            for target in targets {
                if let Some(deg) = in_degree.get_mut(target) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push(*target);
                    }
                }
            }
        }
        queue.sort_by(|a, b| b.cmp(a));
    }

    if result.len() != names.len() {
        let mut structs: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, deg)| *deg > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        structs.sort();
        return Err(BridgeError::DependencyCycle { structs });
    }
    Ok(result)
}
