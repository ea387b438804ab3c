//! qengine-parser: Input decoding for qengine filters
//!
//! This crate turns loosely structured filter input into canonical,
//! still-untyped clauses, and defines the typed AST the later stages build.
//!
//! # Features
//!
//! - **Shape Detection**: JSON text, direct mappings, and bracket-notation
//!   mappings (`filter[where][price][$gt]=50`)
//! - **Bracket Decoding**: nom-based key paths folded into nested mappings
//! - **Value Coercion**: booleans, null, numbers and embedded JSON from strings
//! - **Normalization**: operator aliases, `$eq` expansion, single-element
//!   logical collapse, order and projection canonicalization
//!
//! # Quick Start
//!
//! ```rust
//! use qengine_parser::{FilterNormalizer, FilterParser};
//! use qengine_shared::ParserConfig;
//!
//! let parser = FilterParser::new(ParserConfig::default());
//! let input = parser.parse(r#"{"where": {"price": {"$gt": 50}}, "order": "-price"}"#)?;
//!
//! let normalized = FilterNormalizer::new(ParserConfig::default()).normalize(&input)?;
//! assert_eq!(normalized.order.map(|o| o.len()), Some(1));
//! # Ok::<(), qengine_shared::QEngineError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation
)]

pub mod ast;
pub mod input;
mod normalizer;
mod order;
mod parser;

// Re-export main types
pub use ast::*;
pub use input::{FilterInput, NormalizedFilter, RawFilter};
pub use normalizer::{normalize_fields, FilterNormalizer};
pub use order::{normalize_order, parse_term};
pub use parser::{json_type_name, nesting_depth, FilterParser, CLAUSES};

// Re-export shared types
pub use qengine_shared::VERSION;
