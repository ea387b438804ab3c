//! Backend compiler and custom operator registries
//!
//! Both registries are read-mostly: entries are registered at startup and
//! looked up per request from any thread. Process-wide instances are
//! available through [`global_compilers`] and [`global_operators`].

use crate::compiler::DynCompiler;
use indexmap::IndexMap;
use log::{debug, warn};
use once_cell::sync::Lazy;
use qengine_shared::{QEngineError, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

static COMPILERS: Lazy<CompilerRegistry> = Lazy::new(CompilerRegistry::new);
static OPERATORS: Lazy<OperatorRegistry> = Lazy::new(OperatorRegistry::new);

/// Process-wide compiler registry
pub fn global_compilers() -> &'static CompilerRegistry {
    &COMPILERS
}

/// Process-wide operator registry
pub fn global_operators() -> &'static OperatorRegistry {
    &OPERATORS
}

/// Backend name to compiler mapping
#[derive(Default)]
pub struct CompilerRegistry {
    compilers: RwLock<IndexMap<String, Arc<dyn DynCompiler>>>,
}

impl std::fmt::Debug for CompilerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompilerRegistry {{ backends: {:?} }}", self.list_backends())
    }
}

impl CompilerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `compiler` under `name`, replacing any previous entry
    pub fn register_compiler(
        &self,
        name: impl Into<String>,
        compiler: Arc<dyn DynCompiler>,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(QEngineError::registry("Backend name cannot be empty"));
        }
        let mut compilers = self.compilers.write().unwrap_or_else(PoisonError::into_inner);
        if compilers.insert(name.clone(), compiler).is_some() {
            warn!("Replacing compiler registered for backend '{name}'");
        } else {
            debug!("Registered compiler for backend '{name}'");
        }
        Ok(())
    }

    /// Look up the compiler for `name`
    pub fn get_compiler(&self, name: &str) -> Result<Arc<dyn DynCompiler>> {
        self.compilers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                QEngineError::registry(format!("No compiler registered for backend '{name}'"))
            })
    }

    /// Whether a compiler is registered for `name`
    pub fn is_registered(&self, name: &str) -> bool {
        self.compilers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered backend names in registration order
    pub fn list_backends(&self) -> Vec<String> {
        self.compilers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Remove a backend; returns whether it was present
    pub fn unregister_compiler(&self, name: &str) -> bool {
        self.compilers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(name)
            .is_some()
    }
}

/// Compiles a custom operator applied to one field
pub trait OperatorHandler: Send + Sync {
    /// Produce the backend fragment for `field` with operand `value`
    fn compile(&self, field: &str, value: &Value) -> Result<Value>;
}

impl<F> OperatorHandler for F
where
    F: Fn(&str, &Value) -> Result<Value> + Send + Sync,
{
    fn compile(&self, field: &str, value: &Value) -> Result<Value> {
        self(field, value)
    }
}

#[derive(Clone)]
struct OperatorEntry {
    handler: Arc<dyn OperatorHandler>,
    // None means every backend
    backends: Option<HashSet<String>>,
}

/// Custom operator name to handler mapping
#[derive(Default)]
pub struct OperatorRegistry {
    operators: RwLock<IndexMap<String, OperatorEntry>>,
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OperatorRegistry {{ operators: {:?} }}", self.list_operators())
    }
}

impl OperatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `name`; an empty `backends` list makes it available everywhere
    pub fn register_operator(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn OperatorHandler>,
        backends: &[&str],
    ) -> Result<()> {
        let name = name.into();
        if name.len() < 2 || !name.starts_with('$') {
            return Err(QEngineError::registry(format!(
                "Operator name '{name}' must start with '$'"
            )));
        }
        let entry = OperatorEntry {
            handler,
            backends: (!backends.is_empty())
                .then(|| backends.iter().map(|b| (*b).to_string()).collect()),
        };
        let mut operators = self.operators.write().unwrap_or_else(PoisonError::into_inner);
        if operators.insert(name.clone(), entry).is_some() {
            warn!("Replacing handler registered for operator '{name}'");
        } else {
            debug!("Registered operator '{name}'");
        }
        Ok(())
    }

    /// Handler for `name`, honoring the backend restriction when `backend` is given
    pub fn get_operator(&self, name: &str, backend: Option<&str>) -> Result<Arc<dyn OperatorHandler>> {
        let operators = self.operators.read().unwrap_or_else(PoisonError::into_inner);
        let entry = operators
            .get(name)
            .ok_or_else(|| QEngineError::registry(format!("Operator '{name}' is not registered")))?;

        match (backend, &entry.backends) {
            (Some(backend), Some(allowed)) if !allowed.contains(backend) => {
                Err(QEngineError::registry(format!(
                    "Operator '{name}' is not available for backend '{backend}'"
                )))
            }
            _ => Ok(Arc::clone(&entry.handler)),
        }
    }

    /// Whether `name` is usable, optionally for a specific backend
    pub fn is_registered(&self, name: &str, backend: Option<&str>) -> bool {
        self.get_operator(name, backend).is_ok()
    }

    /// Registered operator names in registration order
    pub fn list_operators(&self) -> Vec<String> {
        self.operators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Remove an operator; returns whether it was present
    pub fn unregister_operator(&self, name: &str) -> bool {
        self.operators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(name)
            .is_some()
    }
}
