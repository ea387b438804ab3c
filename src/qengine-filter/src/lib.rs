//! # qengine-filter
//!
//! The typed half of the qengine pipeline: everything that happens after
//! input has been parsed and normalized.
//!
//! This crate provides:
//! - Validation of normalized clauses and built ASTs against a security policy
//! - AST construction from normalized clauses
//! - Semantics-preserving AST optimization
//! - The backend compiler contract, compiler/operator registries and the
//!   reference `document` backend

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::unused_self
)]

pub mod builder;
pub mod compiler;
pub mod document;
pub mod optimizer;
pub mod registry;
pub mod validator;

#[cfg(test)]
mod tests;

pub use builder::AstBuilder;
pub use compiler::{DynCompiler, QueryCompiler};
pub use document::{
    register_document_operators, DocumentCompiler, DocumentQuery, DOCUMENT_BACKEND,
};
pub use optimizer::{canonical_key, compare_values, AstOptimizer};
pub use registry::{
    global_compilers, global_operators, CompilerRegistry, OperatorHandler, OperatorRegistry,
};
pub use validator::{FilterValidator, ValidationRule};

/// Re-export commonly used types from the lower crates
pub use qengine_parser::{ConditionNode, FilterAST};
pub use qengine_shared::{QEngineError, Result};
