//! Backend compiler contract
//!
//! A backend implements [`QueryCompiler`] by providing the per-node hooks;
//! the provided [`QueryCompiler::compile`] drives the shared template:
//! base query, `where`, `order`, `fields`, finalize.

use log::debug;
use qengine_parser::{ConditionNode, FieldCondition, FieldsSpec, FilterAST, LogicalCondition, OrderSpec};
use qengine_shared::{ComparisonOperator, QEngineError, Result};
use serde::Serialize;
use serde_json::Value;

/// Translates a [`FilterAST`] into a backend-specific query
pub trait QueryCompiler: Send + Sync {
    /// Query under construction
    type Query;
    /// Compiled form of a single condition
    type Expr;
    /// Finished query handed to the caller
    type Output;

    /// Name this backend is registered under
    fn backend_name(&self) -> &str;

    /// Operators this backend cannot express
    fn unsupported_operators(&self) -> &[ComparisonOperator] {
        &[]
    }

    /// Whether this compiler serves `backend`
    fn supports_backend(&self, backend: &str) -> bool {
        self.backend_name() == backend
    }

    /// Empty query to start from
    fn create_base_query(&self) -> Self::Query;

    /// Attach the compiled predicate
    fn apply_where(&self, query: Self::Query, condition: Self::Expr) -> Result<Self::Query>;

    /// Attach the sort specification
    fn apply_order(&self, query: Self::Query, order: &OrderSpec) -> Result<Self::Query>;

    /// Attach the projection
    fn apply_fields(&self, query: Self::Query, fields: &FieldsSpec) -> Result<Self::Query>;

    /// Turn the built query into the output form
    fn finalize_query(&self, query: Self::Query) -> Result<Self::Output>;

    /// Compile one leaf comparison
    fn compile_field_condition(&self, condition: &FieldCondition) -> Result<Self::Expr>;

    /// Combine already-compiled children under a logical operator
    fn compile_logical_condition(
        &self,
        condition: &LogicalCondition,
        children: Vec<Self::Expr>,
    ) -> Result<Self::Expr>;

    /// Compile a condition tree, children before parents
    fn compile_condition(&self, node: &ConditionNode) -> Result<Self::Expr> {
        match node {
            ConditionNode::Field(condition) => {
                if self.unsupported_operators().contains(&condition.operator) {
                    return Err(QEngineError::UnsupportedOperator {
                        operator: condition.operator.symbol().to_string(),
                        backend: Some(self.backend_name().to_string()),
                    });
                }
                self.compile_field_condition(condition)
            }
            ConditionNode::Logical(condition) => {
                let children = condition
                    .children
                    .iter()
                    .map(|child| self.compile_condition(child))
                    .collect::<Result<Vec<_>>>()?;
                self.compile_logical_condition(condition, children)
            }
        }
    }

    /// Compile a whole AST
    fn compile(&self, ast: &FilterAST) -> Result<Self::Output> {
        debug!("Compiling filter for backend '{}'", self.backend_name());
        let mut query = self.create_base_query();
        if let Some(condition) = &ast.where_clause {
            let expr = self.compile_condition(condition)?;
            query = self.apply_where(query, expr)?;
        }
        if let Some(order) = &ast.order {
            query = self.apply_order(query, order)?;
        }
        if let Some(fields) = &ast.fields {
            query = self.apply_fields(query, fields)?;
        }
        self.finalize_query(query)
    }
}

/// Object-safe view of a compiler whose output serializes to JSON
pub trait DynCompiler: Send + Sync {
    /// Registered backend name
    fn name(&self) -> &str;

    /// Compile to a JSON rendering of the backend output
    fn compile_json(&self, ast: &FilterAST) -> Result<Value>;
}

impl<C> DynCompiler for C
where
    C: QueryCompiler,
    C::Output: Serialize,
{
    fn name(&self) -> &str {
        self.backend_name()
    }

    fn compile_json(&self, ast: &FilterAST) -> Result<Value> {
        let output = self.compile(ast)?;
        serde_json::to_value(output).map_err(|e| QEngineError::Compiler(e.to_string()))
    }
}
