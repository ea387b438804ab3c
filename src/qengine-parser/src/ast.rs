//! Abstract Syntax Tree (AST) definitions for filters
//!
//! This module defines the typed query-intent tree produced by the builder
//! and consumed by the optimizer and backend compilers.

use indexmap::IndexMap;
use qengine_shared::{ComparisonOperator, LogicalOperator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single comparison on one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    /// Field name, possibly dotted
    pub field: String,
    /// Comparison operator
    pub operator: ComparisonOperator,
    /// Operand
    pub value: Value,
}

impl FieldCondition {
    /// Create a new field condition
    pub fn new(field: impl Into<String>, operator: ComparisonOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// A boolean combination of child conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalCondition {
    /// Combinator
    pub operator: LogicalOperator,
    /// Children in input order
    pub children: Vec<ConditionNode>,
}

impl LogicalCondition {
    /// Create a new logical condition
    pub fn new(operator: LogicalOperator, children: Vec<ConditionNode>) -> Self {
        Self { operator, children }
    }
}

/// A node that may appear in a `where` tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
pub enum ConditionNode {
    /// Leaf comparison
    Field(FieldCondition),
    /// Logical branch
    Logical(LogicalCondition),
}

impl ConditionNode {
    /// Leaf shorthand
    pub fn field(field: impl Into<String>, operator: ComparisonOperator, value: Value) -> Self {
        ConditionNode::Field(FieldCondition::new(field, operator, value))
    }

    /// `$and` shorthand
    pub fn and(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Logical(LogicalCondition::new(LogicalOperator::And, children))
    }

    /// `$or` shorthand
    pub fn or(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Logical(LogicalCondition::new(LogicalOperator::Or, children))
    }

    /// `$nor` shorthand
    pub fn nor(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Logical(LogicalCondition::new(LogicalOperator::Nor, children))
    }

    /// Logical nesting depth; a leaf has depth 0
    pub fn depth(&self) -> usize {
        match self {
            ConditionNode::Field(_) => 0,
            ConditionNode::Logical(logical) => {
                1 + logical
                    .children
                    .iter()
                    .map(ConditionNode::depth)
                    .max()
                    .unwrap_or(0)
            }
        }
    }

    /// Number of leaf comparisons
    pub fn leaf_count(&self) -> usize {
        match self {
            ConditionNode::Field(_) => 1,
            ConditionNode::Logical(logical) => {
                logical.children.iter().map(ConditionNode::leaf_count).sum()
            }
        }
    }

    /// Borrowed view for validation rules
    pub fn as_node(&self) -> AstNode<'_> {
        match self {
            ConditionNode::Field(cond) => AstNode::Field(cond),
            ConditionNode::Logical(cond) => AstNode::Logical(cond),
        }
    }
}

impl From<FieldCondition> for ConditionNode {
    fn from(cond: FieldCondition) -> Self {
        ConditionNode::Field(cond)
    }
}

impl From<LogicalCondition> for ConditionNode {
    fn from(cond: LogicalCondition) -> Self {
        ConditionNode::Logical(cond)
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderEntry {
    /// Field to sort by
    pub field: String,
    /// Ascending when true
    pub ascending: bool,
}

impl OrderEntry {
    /// Ascending entry
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    /// Descending entry
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

impl fmt::Display for OrderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.ascending { "ASC" } else { "DESC" };
        write!(f, "{} {direction}", self.field)
    }
}

/// Ordered sort specification
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Sort keys, most significant first
    pub entries: Vec<OrderEntry>,
}

impl OrderSpec {
    /// Create an order spec
    pub fn new(entries: Vec<OrderEntry>) -> Self {
        Self { entries }
    }
}

/// Field projection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldsSpec {
    /// Field to inclusion flag (1 include, 0 exclude)
    pub inclusion: IndexMap<String, u8>,
}

impl FieldsSpec {
    /// Create a fields spec
    pub fn new(inclusion: IndexMap<String, u8>) -> Self {
        Self { inclusion }
    }

    /// Inclusion projection over the given names
    pub fn including<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inclusion: fields.into_iter().map(|f| (f.into(), 1)).collect(),
        }
    }
}

/// The pipeline's final product
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterAST {
    /// Predicate
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<ConditionNode>,
    /// Sort specification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSpec>,
    /// Projection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldsSpec>,
}

impl FilterAST {
    /// AST with only a predicate
    pub fn with_where(node: ConditionNode) -> Self {
        Self {
            where_clause: Some(node),
            ..Self::default()
        }
    }

    /// True when no clause is present
    pub fn is_empty(&self) -> bool {
        self.where_clause.is_none() && self.order.is_none() && self.fields.is_none()
    }
}

/// Borrowed view over any AST node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AstNode<'a> {
    /// Leaf comparison
    Field(&'a FieldCondition),
    /// Logical branch
    Logical(&'a LogicalCondition),
    /// Sort specification
    Order(&'a OrderSpec),
    /// Projection
    Fields(&'a FieldsSpec),
}

impl fmt::Display for ConditionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionNode::Field(cond) => {
                write!(f, "{} {} {}", cond.field, cond.operator, cond.value)
            }
            ConditionNode::Logical(cond) => {
                let joiner = match cond.operator {
                    LogicalOperator::And => " AND ",
                    LogicalOperator::Or | LogicalOperator::Nor => " OR ",
                };
                if cond.operator == LogicalOperator::Nor {
                    write!(f, "NOT ")?;
                }
                write!(f, "(")?;
                for (i, child) in cond.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{joiner}")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}
