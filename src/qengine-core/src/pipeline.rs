//! The filter pipeline
//!
//! Raw input flows through parse, normalize, validate, build, AST
//! validation and optimize; [`QueryEngine::compile`] additionally hands the
//! result to a registered backend compiler.

use log::{debug, info, warn};
use qengine_filter::{
    global_compilers, global_operators, register_document_operators, AstBuilder, AstOptimizer,
    DocumentCompiler, FilterValidator, ValidationRule, DOCUMENT_BACKEND,
};
use qengine_parser::{FilterAST, FilterNormalizer, FilterParser, NormalizedFilter, RawFilter};
use qengine_shared::{validate_config, QEngineConfig, Result};
use serde_json::Value;
use std::sync::{Arc, Once};

static BUILTIN_BACKENDS: Once = Once::new();

/// Register the built-in backend compilers and their extension operators
/// with the process-wide registries.
///
/// Runs once per process; later calls are no-ops.
pub fn ensure_builtin_backends() {
    BUILTIN_BACKENDS.call_once(|| {
        if let Err(e) =
            global_compilers().register_compiler(DOCUMENT_BACKEND, Arc::new(DocumentCompiler::new()))
        {
            warn!("Failed to register built-in backend '{DOCUMENT_BACKEND}': {e}");
        }
        if let Err(e) = register_document_operators(global_operators()) {
            warn!("Failed to register '{DOCUMENT_BACKEND}' operators: {e}");
        }
    });
}

/// Configured pipeline stages
#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: QEngineConfig,
    parser: FilterParser,
    normalizer: FilterNormalizer,
    validator: FilterValidator,
    builder: AstBuilder,
    optimizer: AstOptimizer,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::from_valid_config(QEngineConfig::default())
    }
}

impl QueryEngine {
    /// Engine with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with a custom configuration, rejected if inconsistent
    pub fn with_config(config: QEngineConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: QEngineConfig) -> Self {
        Self {
            parser: FilterParser::new(config.parser.clone()),
            normalizer: FilterNormalizer::new(config.parser.clone()),
            validator: FilterValidator::new(
                config.validator.clone(),
                config.security_policy.clone(),
            ),
            builder: AstBuilder::new(),
            optimizer: AstOptimizer::new(config.optimizer.clone()),
            config,
        }
    }

    /// Configuration in force
    pub fn config(&self) -> &QEngineConfig {
        &self.config
    }

    /// Register a custom validation rule; it runs when named in
    /// `validator.custom_validators`
    pub fn with_validation_rule(mut self, rule: Arc<dyn ValidationRule>) -> Self {
        self.validator.register_rule(rule);
        self
    }

    /// Parse, normalize and validate without building an AST
    pub fn check(&self, input: impl Into<RawFilter>) -> Result<NormalizedFilter> {
        let parsed = self.parser.parse(input)?;
        let normalized = self.normalizer.normalize(&parsed)?;
        self.validator.validate(&normalized)?;
        Ok(normalized)
    }

    /// Run the whole pipeline and return the optimized AST
    pub fn process_filter(&self, input: impl Into<RawFilter>) -> Result<FilterAST> {
        let normalized = self.check(input)?;
        if self.config.debug {
            info!("Normalized filter: {normalized:?}");
        }

        let ast = self.builder.build(&normalized)?;
        self.validator.validate_ast(&ast)?;

        let optimized = self.optimizer.optimize(&ast)?;
        if self.config.debug {
            info!("Optimized AST: {optimized:?}");
        }
        debug!(
            "Processed filter with {} leaf condition(s)",
            optimized
                .where_clause
                .as_ref()
                .map_or(0, qengine_parser::ConditionNode::leaf_count)
        );
        Ok(optimized)
    }

    /// Run the pipeline and compile for the configured default backend
    pub fn compile(&self, input: impl Into<RawFilter>) -> Result<Value> {
        self.compile_for(input, &self.config.default_backend)
    }

    /// Run the pipeline and compile for `backend`
    pub fn compile_for(&self, input: impl Into<RawFilter>, backend: &str) -> Result<Value> {
        let ast = self.process_filter(input)?;
        self.compile_ast(&ast, backend)
    }

    /// Compile an already-built AST for `backend`
    pub fn compile_ast(&self, ast: &FilterAST, backend: &str) -> Result<Value> {
        ensure_builtin_backends();
        let compiler = global_compilers().get_compiler(backend)?;
        compiler.compile_json(ast)
    }
}

/// Run the pipeline once with `config`
pub fn process_filter(input: impl Into<RawFilter>, config: &QEngineConfig) -> Result<FilterAST> {
    QueryEngine::with_config(config.clone())?.process_filter(input)
}
