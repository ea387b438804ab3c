//! qengine-shared: Shared types for qengine crates
//!
//! This crate contains the value objects every pipeline stage reads:
//! configuration and security policy, the operator vocabulary, and the
//! error taxonomy.
//!
//! # Features
//!
//! - **Common Result Type**: `Result<T>` over [`QEngineError`]
//! - **Operator Vocabulary**: closed [`ComparisonOperator`] / [`LogicalOperator`] enums
//! - **Configuration**: parser, validator, optimizer and security settings with TOML/env loading
//! - **Version Information**: build metadata

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

pub mod config;
pub mod error;
pub mod operators;

pub use config::{
    validate_config, OptimizerConfig, ParserConfig, QEngineConfig, SecurityPolicy,
    ValidatorConfig,
};
pub use error::{QEngineError, Violation, ViolationKind};
pub use operators::{canonical_operator, ComparisonOperator, LogicalOperator, OperatorKey};

/// Result type alias for qengine operations
pub type Result<T> = std::result::Result<T, QEngineError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information structure
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Package version
    pub version: &'static str,
    /// Enabled features
    pub features: &'static [&'static str],
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "qengine {}", self.version)?;
        if !self.features.is_empty() {
            writeln!(f, "Features: {}", self.features.join(", "))?;
        }
        Ok(())
    }
}

/// Get build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION,
        features: &[],
    }
}
