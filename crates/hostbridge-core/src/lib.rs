//! Core data model for the hostbridge pipeline.
//!
//! Holds the declaration tables produced by the extractor, resolves alias
//! chains, classifies every type occurrence into a marshalling category,
//! and computes the reachable subset of an API for a given export list.
//!
//! ## Modules
//!
//! - [`decl`]: Raw declaration tables (aliases, enums, structs, functions, constants)
//! - [`ctype`]: C type text utilities and builtin type families
//! - [`resolve`]: Memoized alias-chain resolution
//! - [`classify`]: Marshalling category assignment
//! - [`policy`]: Classification and generation policy
//! - [`reach`]: Reachability closure and struct dependency ordering

pub mod classify;
pub mod ctype;
pub mod decl;
pub mod error;
pub mod policy;
pub mod reach;
pub mod resolve;

// Re-export key types for convenience
pub use classify::{
    classify_api, ClassifiedApi, ClassifiedField, ClassifiedFunction, ClassifiedParam,
    ClassifiedStruct, Classifier, HostType, MarshalCategory, Position, TypeClassification,
};
pub use decl::{ArraySize, Constant, DeclTables, EnumDef, FieldDecl, FunctionDecl, ParamDecl, StructDef};
pub use error::BridgeError;
pub use policy::{BridgePolicy, UnsupportedPolicy};
pub use reach::{compute_reachable, NativeKind, NativeType, ReachableApi};
pub use resolve::{Resolution, TypeResolver};
