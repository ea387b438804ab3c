//! AST construction from normalized clauses

use qengine_parser::{
    ConditionNode, FieldCondition, FieldsSpec, FilterAST, LogicalCondition, NormalizedFilter,
    OrderSpec,
};
use qengine_shared::{ComparisonOperator, LogicalOperator, OperatorKey, QEngineError, Result};
use serde_json::{Map, Value};

/// Builds a typed [`FilterAST`] from normalized clauses.
///
/// Operator keys are re-checked here, independently of the validator, so
/// programmatic callers that skip validation still get
/// [`QEngineError::UnsupportedOperator`] for unknown operators.
#[derive(Debug, Clone, Copy, Default)]
pub struct AstBuilder;

impl AstBuilder {
    /// Create a builder
    pub fn new() -> Self {
        Self
    }

    /// Build the AST for all clauses
    pub fn build(&self, filter: &NormalizedFilter) -> Result<FilterAST> {
        let where_clause = filter
            .where_clause
            .as_ref()
            .map(|condition| self.build_condition(condition))
            .transpose()?;

        let order = filter
            .order
            .as_ref()
            .filter(|entries| !entries.is_empty())
            .map(|entries| OrderSpec::new(entries.clone()));

        let fields = match &filter.fields {
            Some(fields) if !fields.is_empty() => {
                let inclusion = fields
                    .iter()
                    .map(|(name, flag)| match flag {
                        0 | 1 => Ok((name.clone(), u8::from(*flag == 1))),
                        other => Err(QEngineError::validation(format!(
                            "Projection value for field '{name}' must be 0 or 1, got {other}"
                        ))),
                    })
                    .collect::<Result<_>>()?;
                Some(FieldsSpec::new(inclusion))
            }
            _ => None,
        };

        Ok(FilterAST {
            where_clause,
            order,
            fields,
        })
    }

    /// Build one condition mapping; several keys form an implicit `$and`
    pub fn build_condition(&self, condition: &Map<String, Value>) -> Result<ConditionNode> {
        let mut nodes = Vec::with_capacity(condition.len());
        for (key, value) in condition {
            if key.starts_with('$') {
                nodes.push(self.build_operator_key(key, value)?);
            } else {
                nodes.push(self.build_field(key, value)?);
            }
        }
        combine(LogicalOperator::And, nodes)
            .ok_or_else(|| QEngineError::validation("Empty condition"))
    }

    fn build_operator_key(&self, key: &str, value: &Value) -> Result<ConditionNode> {
        match OperatorKey::from_symbol(key) {
            Some(OperatorKey::Logical(op)) => self.build_logical(op, value),
            Some(OperatorKey::Comparison(op)) => Err(QEngineError::validation(format!(
                "Comparison operator '{op}' must be applied to a field"
            ))),
            None => Err(QEngineError::unsupported(key)),
        }
    }

    fn build_logical(&self, op: LogicalOperator, value: &Value) -> Result<ConditionNode> {
        let Value::Array(items) = value else {
            return Err(QEngineError::validation(format!(
                "Logical operator '{op}' requires an array value"
            )));
        };

        let children = items
            .iter()
            .map(|item| match item {
                Value::Object(child) => self.build_condition(child),
                _ => Err(QEngineError::validation(format!(
                    "Logical operator '{op}' items must be objects"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        combine(op, children).ok_or_else(|| {
            QEngineError::validation(format!("Logical operator '{op}' cannot have empty array"))
        })
    }

    fn build_field(&self, field: &str, value: &Value) -> Result<ConditionNode> {
        let Value::Object(operators) = value else {
            return Ok(ConditionNode::field(field, ComparisonOperator::Eq, value.clone()));
        };

        let mut nodes = Vec::with_capacity(operators.len());
        for (key, operand) in operators {
            let op = match OperatorKey::from_symbol(key) {
                Some(OperatorKey::Comparison(op)) => op,
                Some(OperatorKey::Logical(op)) => {
                    return Err(QEngineError::validation(format!(
                        "Logical operator '{op}' cannot be applied to field '{field}'"
                    )))
                }
                None => return Err(QEngineError::unsupported(key)),
            };
            nodes.push(ConditionNode::Field(FieldCondition::new(
                field,
                op,
                operand.clone(),
            )));
        }

        combine(LogicalOperator::And, nodes)
            .ok_or_else(|| QEngineError::validation(format!("Field '{field}' has an empty condition")))
    }
}

// A single child replaces its `$and`/`$or` parent; `$nor` always keeps its node.
fn combine(op: LogicalOperator, mut nodes: Vec<ConditionNode>) -> Option<ConditionNode> {
    match nodes.len() {
        0 => None,
        1 if op.is_associative() => nodes.pop(),
        _ => Some(ConditionNode::Logical(LogicalCondition::new(op, nodes))),
    }
}
