//! qengine-core: Core library for qengine filter processing
//!
//! This crate wires the parser and filter crates into a single pipeline that
//! turns loosely structured filter input into an optimized, backend-neutral
//! [`FilterAST`], and optionally compiles it for a registered backend.
//!
//! # Features
//!
//! - **Two Input Shapes**: JSON text/mappings and bracket-notation parameters
//! - **Security Policy**: field allow/block lists, operator allow-list,
//!   depth and array-size caps, always reported ahead of structural errors
//! - **Optimization**: logical flattening, range combination, redundancy
//!   removal and order de-duplication
//! - **Pluggable Backends**: compilers and custom operators registered at startup
//!
//! # Quick Start
//!
//! ```rust
//! use qengine_core::{ComparisonOperator, ConditionNode, QueryEngine};
//! use serde_json::json;
//!
//! let engine = QueryEngine::new();
//! let ast = engine.process_filter(r#"{"where": {"price": {"$gt": 10, "$gte": 5}}}"#)?;
//! assert_eq!(
//!     ast.where_clause,
//!     Some(ConditionNode::field("price", ComparisonOperator::Gt, json!(10)))
//! );
//!
//! let compiled = engine.compile(r#"{"where": {"price": {"$gt": 50}}, "order": "-price"}"#)?;
//! assert_eq!(compiled["filter"], json!({"price": {"$gt": 50}}));
//! assert_eq!(compiled["sort"], json!([["price", -1]]));
//! # Ok::<(), qengine_core::QEngineError>(())
//! ```
//!
//! # Error Handling
//!
//! Every stage returns [`Result<T>`](Result) over [`QEngineError`]:
//!
//! ```rust
//! use qengine_core::{QEngineConfig, QEngineError, QueryEngine, SecurityPolicy};
//!
//! let mut config = QEngineConfig::default();
//! config.security_policy = SecurityPolicy::default().with_allowed_fields(["name"]);
//! let engine = QueryEngine::with_config(config)?;
//!
//! match engine.process_filter(r#"{"where": {"price": {"$gt": 1}}}"#) {
//!     Err(QEngineError::Security { messages }) => assert_eq!(messages.len(), 1),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! # Ok::<(), QEngineError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

pub mod pipeline;

pub use pipeline::{ensure_builtin_backends, process_filter, QueryEngine};

pub use qengine_shared::{
    build_info, BuildInfo, ComparisonOperator, LogicalOperator, OptimizerConfig, ParserConfig,
    QEngineConfig, QEngineError, Result, SecurityPolicy, ValidatorConfig, VERSION,
};

pub use qengine_parser::{
    AstNode, ConditionNode, FieldCondition, FieldsSpec, FilterAST, LogicalCondition, NormalizedFilter,
    OrderEntry, OrderSpec, RawFilter,
};

pub use qengine_filter::{
    global_compilers, global_operators, DocumentCompiler, DocumentQuery, DynCompiler,
    OperatorHandler, QueryCompiler, ValidationRule,
};
