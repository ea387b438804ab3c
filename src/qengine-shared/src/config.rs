//! Configuration management for qengine
//!
//! Every pipeline stage reads one of the value objects defined here. They are
//! built once (defaults, then an optional TOML file, then environment
//! overrides) and shared read-only across calls.

use crate::error::QEngineError;
use crate::operators::ComparisonOperator;
use crate::Result;

use log::warn;
use serde::{Deserialize, Serialize};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Parser behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Coarse nesting limit applied while decoding input
    pub max_nesting_depth: usize,
    /// Reject ambiguous shapes and unknown top-level keys
    pub strict_mode: bool,
    /// Match operator keys exactly; otherwise case-fold them
    pub case_sensitive_operators: bool,
    /// Drop empty logical lists instead of reporting them
    pub allow_empty_conditions: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 10,
            strict_mode: false,
            case_sensitive_operators: true,
            allow_empty_conditions: false,
        }
    }
}

/// Validator behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Check operand types per operator family
    pub validate_types: bool,
    /// Reject unknown operator keys
    pub validate_operators: bool,
    /// Check field name syntax
    pub validate_field_names: bool,
    /// Names of registered validation rules to run, in order
    pub custom_validators: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            validate_types: true,
            validate_operators: true,
            validate_field_names: true,
            custom_validators: Vec::new(),
        }
    }
}

/// Optimizer behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Run the optimizer at all
    pub enabled: bool,
    /// Splice nested `$and`/`$or` into a parent of the same kind
    pub simplify_logical_operators: bool,
    /// Keep only the tightest bound per side for each field under `$and`
    pub combine_range_conditions: bool,
    /// Drop duplicate sibling conditions
    pub remove_redundant_conditions: bool,
    /// Keep only the first order entry per field
    pub deduplicate_order: bool,
    /// Upper bound on fixed-point iterations
    pub max_optimization_passes: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            simplify_logical_operators: true,
            combine_range_conditions: true,
            remove_redundant_conditions: true,
            deduplicate_order: true,
            max_optimization_passes: 3,
        }
    }
}

/// Limits a filter must respect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Maximum logical nesting depth
    pub max_depth: usize,
    /// Permitted comparison operators; `None` permits all
    pub allowed_operators: Option<HashSet<ComparisonOperator>>,
    /// Strict allow-list of fields; `None` permits all
    pub allowed_fields: Option<HashSet<String>>,
    /// Fields that are always rejected
    pub blocked_fields: HashSet<String>,
    /// Largest accepted array operand
    pub max_array_size: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_depth: 10,
            allowed_operators: None,
            allowed_fields: None,
            blocked_fields: HashSet::new(),
            max_array_size: 1000,
        }
    }
}

impl SecurityPolicy {
    /// Restrict fields to the given allow-list
    pub fn with_allowed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Add fields to the block-list
    pub fn with_blocked_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Restrict comparison operators
    pub fn with_allowed_operators<I>(mut self, operators: I) -> Self
    where
        I: IntoIterator<Item = ComparisonOperator>,
    {
        self.allowed_operators = Some(operators.into_iter().collect());
        self
    }

    /// Whether `field` passes the allow/block lists.
    ///
    /// A dotted path is blocked when any prefix is blocked and allowed when
    /// it or its root segment is allowed.
    pub fn is_field_allowed(&self, field: &str) -> bool {
        if self.is_field_blocked(field) {
            return false;
        }
        match &self.allowed_fields {
            None => true,
            Some(allowed) => {
                let root = field.split('.').next().unwrap_or(field);
                allowed.contains(field) || allowed.contains(root)
            }
        }
    }

    /// Whether `field` or one of its dotted prefixes is block-listed
    pub fn is_field_blocked(&self, field: &str) -> bool {
        self.blocked_fields.iter().any(|b| {
            field == b
                || field
                    .strip_prefix(b.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Whether a comparison operator is permitted
    pub fn is_operator_allowed(&self, op: ComparisonOperator) -> bool {
        self.allowed_operators
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&op))
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QEngineConfig {
    /// Backend used by `compile` when none is named
    pub default_backend: String,
    /// Verbose diagnostics
    pub debug: bool,
    /// Parser settings
    pub parser: ParserConfig,
    /// Validator settings
    pub validator: ValidatorConfig,
    /// Optimizer settings
    pub optimizer: OptimizerConfig,
    /// Security limits
    pub security_policy: SecurityPolicy,
    /// Free-form per-backend settings
    pub backend_settings: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl Default for QEngineConfig {
    fn default() -> Self {
        Self {
            default_backend: "document".to_string(),
            debug: false,
            parser: ParserConfig::default(),
            validator: ValidatorConfig::default(),
            optimizer: OptimizerConfig::default(),
            security_policy: SecurityPolicy::default(),
            backend_settings: HashMap::new(),
        }
    }
}

impl QEngineConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a backend-specific setting
    pub fn get_backend_setting(&self, backend: &str, key: &str) -> Option<&serde_json::Value> {
        self.backend_settings.get(backend)?.get(key)
    }

    /// Set a backend-specific setting
    pub fn set_backend_setting(
        &mut self,
        backend: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) {
        self.backend_settings
            .entry(backend.into())
            .or_default()
            .insert(key.into(), value);
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge_file(path)?;
        Ok(config)
    }

    /// Load configuration from an optional file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            config.merge_file(path)?;
        }
        config.merge_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Merge configuration from a TOML file; keys absent from the file keep their current value
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .map_err(|e| QEngineError::config(format!("Failed to read config file: {e}")))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        if extension != "toml" {
            return Err(QEngineError::config("Unsupported config file format"));
        }

        let file_value: toml::Value = toml::from_str(&content)
            .map_err(|e| QEngineError::config(format!("Invalid TOML config: {e}")))?;
        let overlay = serde_json::to_value(file_value)
            .map_err(|e| QEngineError::config(format!("Invalid TOML config: {e}")))?;
        let mut base = serde_json::to_value(&*self)
            .map_err(|e| QEngineError::config(format!("Failed to serialize config: {e}")))?;
        merge_values(&mut base, overlay);
        *self = serde_json::from_value(base)
            .map_err(|e| QEngineError::config(format!("Invalid config value: {e}")))?;
        Ok(())
    }

    /// Merge configuration from environment variables
    pub fn merge_env(&mut self) -> Result<()> {
        self.merge_env_with_reader(|key| std::env::var(key).ok())
    }

    /// Merge configuration from environment variables with custom reader
    pub fn merge_env_with_reader<F>(&mut self, env_reader: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // QENGINE_BACKEND
        if let Some(val) = env_reader("QENGINE_BACKEND") {
            self.default_backend = val;
        }

        // QENGINE_DEBUG
        if let Some(val) = env_reader("QENGINE_DEBUG") {
            self.debug = parse_flag(&val);
        }

        // QENGINE_STRICT
        if let Some(val) = env_reader("QENGINE_STRICT") {
            self.parser.strict_mode = parse_flag(&val);
        }

        // QENGINE_OPTIMIZE
        if let Some(val) = env_reader("QENGINE_OPTIMIZE") {
            self.optimizer.enabled = parse_flag(&val);
        }

        // QENGINE_MAX_NESTING_DEPTH
        if let Some(val) = env_reader("QENGINE_MAX_NESTING_DEPTH") {
            override_limit(&mut self.parser.max_nesting_depth, "QENGINE_MAX_NESTING_DEPTH", &val);
        }

        // QENGINE_MAX_DEPTH
        if let Some(val) = env_reader("QENGINE_MAX_DEPTH") {
            override_limit(&mut self.security_policy.max_depth, "QENGINE_MAX_DEPTH", &val);
        }

        // QENGINE_MAX_ARRAY_SIZE
        if let Some(val) = env_reader("QENGINE_MAX_ARRAY_SIZE") {
            override_limit(
                &mut self.security_policy.max_array_size,
                "QENGINE_MAX_ARRAY_SIZE",
                &val,
            );
        }

        Ok(())
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| QEngineError::config(format!("Failed to serialize TOML: {e}")))?;
        fs::write(path, content)
            .map_err(|e| QEngineError::config(format!("Failed to write config file: {e}")))
    }
}

fn parse_flag(val: &str) -> bool {
    val != "0" && val.to_lowercase() != "false"
}

fn override_limit(target: &mut usize, name: &str, val: &str) {
    match val.parse() {
        Ok(limit) => *target = limit,
        Err(_) => warn!("Ignoring invalid value for {name}: {val:?}"),
    }
}

fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Validate configuration
pub fn validate_config(config: &QEngineConfig) -> Result<()> {
    if config.default_backend.trim().is_empty() {
        return Err(QEngineError::config("Default backend must not be empty"));
    }

    if config.parser.max_nesting_depth == 0 {
        return Err(QEngineError::config(
            "Max nesting depth must be greater than 0",
        ));
    }

    if config.security_policy.max_depth == 0 {
        return Err(QEngineError::config("Max depth must be greater than 0"));
    }

    if config.security_policy.max_array_size == 0 {
        return Err(QEngineError::config(
            "Max array size must be greater than 0",
        ));
    }

    if config.optimizer.enabled && config.optimizer.max_optimization_passes == 0 {
        return Err(QEngineError::config(
            "Max optimization passes must be greater than 0 when the optimizer is enabled",
        ));
    }

    if config
        .validator
        .custom_validators
        .iter()
        .any(|name| name.trim().is_empty())
    {
        return Err(QEngineError::config("Custom validator names must not be empty"));
    }

    Ok(())
}
