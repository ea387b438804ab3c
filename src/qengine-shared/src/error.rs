//! Error taxonomy shared by every pipeline stage

/// Errors raised by the filter pipeline and the compiler boundary
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QEngineError {
    /// Malformed input, ambiguous input shape, or parse-time depth exceeded
    #[error("Filter parse error: {message}")]
    Parse {
        /// Description of the problem
        message: String,
    },

    /// Structural problems found while validating a filter
    #[error("Filter validation failed: {}", messages.join("; "))]
    Validation {
        /// Every structural violation, in discovery order
        messages: Vec<String>,
    },

    /// Security policy violations
    #[error("Security policy violation: {}", messages.join("; "))]
    Security {
        /// Every security violation, in discovery order
        messages: Vec<String>,
    },

    /// Operator not recognized by the builder or not supported by a backend
    #[error("Operator '{operator}' is not supported{}", backend.as_ref().map(|b| format!(" for backend '{b}'")).unwrap_or_default())]
    UnsupportedOperator {
        /// Operator as written in the input
        operator: String,
        /// Backend that rejected it, if any
        backend: Option<String>,
    },

    /// A rewrite pass broke a structural invariant
    #[error("Optimization error: {0}")]
    Optimization(String),

    /// Backend or operator lookup failure
    #[error("Registry error: {0}")]
    Registry(String),

    /// Failure inside a backend compiler
    #[error("Compiler error: {0}")]
    Compiler(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QEngineError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        QEngineError::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error with a single message
    pub fn validation(msg: impl Into<String>) -> Self {
        QEngineError::Validation {
            messages: vec![msg.into()],
        }
    }

    /// Create a security error with a single message
    pub fn security(msg: impl Into<String>) -> Self {
        QEngineError::Security {
            messages: vec![msg.into()],
        }
    }

    /// Create an unsupported operator error not tied to a backend
    pub fn unsupported(operator: impl Into<String>) -> Self {
        QEngineError::UnsupportedOperator {
            operator: operator.into(),
            backend: None,
        }
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        QEngineError::Registry(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        QEngineError::Config(msg.into())
    }

    /// Whether this is a security policy violation
    pub fn is_security(&self) -> bool {
        matches!(self, QEngineError::Security { .. })
    }

    /// Messages carried by an aggregated error, or the display text otherwise
    pub fn messages(&self) -> Vec<String> {
        match self {
            QEngineError::Validation { messages } | QEngineError::Security { messages } => {
                messages.clone()
            }
            other => vec![other.to_string()],
        }
    }
}

/// Severity class of a single validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Policy violation; always reported in preference to structural ones
    Security,
    /// Structural or typing problem
    Validation,
}

/// One finding produced by a validation walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Severity class
    pub kind: ViolationKind,
    /// Human readable message
    pub message: String,
}

impl Violation {
    /// A security finding
    pub fn security(message: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::Security,
            message: message.into(),
        }
    }

    /// A structural finding
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::Validation,
            message: message.into(),
        }
    }

    /// Combine findings into a single outcome.
    ///
    /// Security findings suppress structural ones. Messages keep discovery order.
    pub fn into_result(violations: Vec<Violation>) -> crate::Result<()> {
        if violations.is_empty() {
            return Ok(());
        }
        let (security, structural): (Vec<_>, Vec<_>) = violations
            .into_iter()
            .partition(|v| v.kind == ViolationKind::Security);
        if !security.is_empty() {
            return Err(QEngineError::Security {
                messages: security.into_iter().map(|v| v.message).collect(),
            });
        }
        Err(QEngineError::Validation {
            messages: structural.into_iter().map(|v| v.message).collect(),
        })
    }
}
