//! qengine: query filter processing
//!
//! Turns loosely structured filter input (JSON text, decoded mappings or
//! bracket-notation parameters) into a validated, optimized and
//! backend-neutral [`FilterAST`], and compiles it through pluggable
//! backend compilers.
//!
//! The heavy lifting lives in the workspace crates, re-exported here:
//!
//! - [`shared`] - configuration, operator vocabulary and errors
//! - [`parser`] - input decoding, normalization and the AST types
//! - [`filter`] - validation, AST building, optimization and compilers
//! - [`qengine_core`] - the assembled pipeline
//!
//! ```rust
//! let compiled = qengine::compile(r#"{"where": {"name": "ada"}, "fields": ["name"]}"#)?;
//! assert_eq!(compiled["filter"], serde_json::json!({"name": "ada"}));
//! # Ok::<(), qengine::QEngineError>(())
//! ```

pub use qengine_core::*;

pub use qengine_filter as filter;
pub use qengine_parser as parser;
pub use qengine_shared as shared;

/// Run the pipeline with the default configuration
pub fn process(input: impl Into<RawFilter>) -> Result<FilterAST> {
    QueryEngine::new().process_filter(input)
}

/// Run the pipeline and compile for the default backend
pub fn compile(input: impl Into<RawFilter>) -> Result<serde_json::Value> {
    QueryEngine::new().compile(input)
}
