//! Document-store reference backend
//!
//! Emits queries in the `{"field": {"$gt": 5}}` / `{"$or": [...]}` syntax
//! used by document databases, with sort pairs and an optional projection.

use crate::compiler::QueryCompiler;
use crate::registry::{global_operators, OperatorRegistry};
use log::trace;
use qengine_parser::{FieldCondition, FieldsSpec, LogicalCondition, OrderSpec};
use qengine_shared::{ComparisonOperator, QEngineError, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Registered name of [`DocumentCompiler`]
pub const DOCUMENT_BACKEND: &str = "document";

/// Register the document-store extension operators (`$text`, `$geoWithin`,
/// `$near`) for the `document` backend on `registry`.
///
/// These are not part of the comparison vocabulary a `where` clause may use;
/// callers composing document queries look them up by name.
pub fn register_document_operators(registry: &OperatorRegistry) -> Result<()> {
    registry.register_operator(
        "$text",
        Arc::new(|_field: &str, value: &Value| -> Result<Value> {
            Ok(json!({ "$text": { "$search": value } }))
        }),
        &[DOCUMENT_BACKEND],
    )?;
    for symbol in ["$geoWithin", "$near"] {
        registry.register_operator(
            symbol,
            Arc::new(move |field: &str, value: &Value| -> Result<Value> {
                Ok(json!({ field: { symbol: value } }))
            }),
            &[DOCUMENT_BACKEND],
        )?;
    }
    Ok(())
}

/// Compiled document-store query
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DocumentQuery {
    /// Predicate document; empty matches everything
    pub filter: Map<String, Value>,
    /// `(field, 1 | -1)` pairs, most significant first
    pub sort: Vec<(String, i8)>,
    /// Field to `1 | 0`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Map<String, Value>>,
}

/// Compiler for the `document` backend
#[derive(Debug, Clone, Default)]
pub struct DocumentCompiler {
    operators: Option<Arc<OperatorRegistry>>,
}

impl DocumentCompiler {
    /// Compiler using the process-wide operator registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiler using a private operator registry
    pub fn with_operators(operators: Arc<OperatorRegistry>) -> Self {
        Self {
            operators: Some(operators),
        }
    }

    fn operators(&self) -> &OperatorRegistry {
        match &self.operators {
            Some(registry) => registry,
            None => global_operators(),
        }
    }
}

impl QueryCompiler for DocumentCompiler {
    type Query = DocumentQuery;
    type Expr = Value;
    type Output = DocumentQuery;

    fn backend_name(&self) -> &str {
        DOCUMENT_BACKEND
    }

    fn create_base_query(&self) -> DocumentQuery {
        DocumentQuery::default()
    }

    fn apply_where(&self, mut query: DocumentQuery, condition: Value) -> Result<DocumentQuery> {
        match condition {
            Value::Object(filter) => {
                query.filter = filter;
                Ok(query)
            }
            other => Err(QEngineError::Compiler(format!(
                "Condition compiled to a non-document value: {other}"
            ))),
        }
    }

    fn apply_order(&self, mut query: DocumentQuery, order: &OrderSpec) -> Result<DocumentQuery> {
        query.sort = order
            .entries
            .iter()
            .map(|entry| (entry.field.clone(), if entry.ascending { 1 } else { -1 }))
            .collect();
        Ok(query)
    }

    fn apply_fields(&self, mut query: DocumentQuery, fields: &FieldsSpec) -> Result<DocumentQuery> {
        query.projection = Some(
            fields
                .inclusion
                .iter()
                .map(|(field, flag)| (field.clone(), Value::from(*flag)))
                .collect(),
        );
        Ok(query)
    }

    fn finalize_query(&self, query: DocumentQuery) -> Result<DocumentQuery> {
        Ok(query)
    }

    fn compile_field_condition(&self, condition: &FieldCondition) -> Result<Value> {
        let symbol = condition.operator.symbol();
        if let Ok(handler) = self.operators().get_operator(symbol, Some(DOCUMENT_BACKEND)) {
            trace!("Using registered handler for '{symbol}'");
            return handler.compile(&condition.field, &condition.value);
        }

        let mut document = Map::new();
        let operand = match (&condition.operator, &condition.value) {
            (ComparisonOperator::Eq, value) if !value.is_object() => value.clone(),
            (_, value) => json!({ symbol: value }),
        };
        document.insert(condition.field.clone(), operand);
        Ok(Value::Object(document))
    }

    fn compile_logical_condition(
        &self,
        condition: &LogicalCondition,
        children: Vec<Value>,
    ) -> Result<Value> {
        Ok(json!({ condition.operator.symbol(): children }))
    }
}
