//! AST optimization
//!
//! Semantics-preserving rewrites applied bottom-up until a fixed point or the
//! configured pass limit:
//!
//! 1. logical flattening (`$and` inside `$and`, `$or` inside `$or`)
//! 2. range combination (tightest bound per side, per field, under `$and`)
//! 3. redundant sibling removal
//! 4. order de-duplication (first occurrence wins)
//!
//! Single-child `$and`/`$or` nodes are always collapsed; `$nor` is never
//! flattened or collapsed because it negates its children.

use indexmap::IndexMap;
use log::{debug, trace};
use qengine_parser::{ConditionNode, FieldCondition, FilterAST, LogicalCondition, OrderSpec};
use qengine_shared::{ComparisonOperator, LogicalOperator, OptimizerConfig, QEngineError, Result};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Rewrites ASTs into smaller equivalent ones
#[derive(Debug, Clone, Default)]
pub struct AstOptimizer {
    config: OptimizerConfig,
}

impl AstOptimizer {
    /// Create an optimizer
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Optimize `ast`, returning a new tree; the input is left untouched
    pub fn optimize(&self, ast: &FilterAST) -> Result<FilterAST> {
        if !self.config.enabled {
            return Ok(ast.clone());
        }

        let mut current = ast.clone();
        let mut passes = 0;
        while passes < self.config.max_optimization_passes {
            passes += 1;
            let next = self.run_pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        debug!("Optimizer finished after {passes} pass(es)");

        verify(&current)?;
        Ok(current)
    }

    fn run_pass(&self, ast: &FilterAST) -> FilterAST {
        FilterAST {
            where_clause: ast.where_clause.clone().map(|node| self.optimize_node(node)),
            order: ast.order.as_ref().map(|order| self.optimize_order(order)),
            fields: ast.fields.clone(),
        }
    }

    fn optimize_node(&self, node: ConditionNode) -> ConditionNode {
        let LogicalCondition { operator, children } = match node {
            ConditionNode::Field(_) => return node,
            ConditionNode::Logical(logical) => logical,
        };

        let mut children: Vec<ConditionNode> = children
            .into_iter()
            .map(|child| self.optimize_node(child))
            .collect();

        if self.config.simplify_logical_operators && operator.is_associative() {
            children = flatten(operator, children);
        }
        if self.config.combine_range_conditions && operator == LogicalOperator::And {
            children = combine_ranges(children);
        }
        if self.config.remove_redundant_conditions {
            children = remove_duplicates(children);
        }

        if children.len() == 1 && operator.is_associative() {
            trace!("Collapsing single-child {operator}");
            if let Some(only) = children.pop() {
                return only;
            }
        }
        ConditionNode::Logical(LogicalCondition::new(operator, children))
    }

    fn optimize_order(&self, order: &OrderSpec) -> OrderSpec {
        if !self.config.deduplicate_order {
            return order.clone();
        }
        let mut seen = HashSet::new();
        OrderSpec::new(
            order
                .entries
                .iter()
                .filter(|entry| seen.insert(entry.field.as_str()))
                .cloned()
                .collect(),
        )
    }
}

fn flatten(operator: LogicalOperator, children: Vec<ConditionNode>) -> Vec<ConditionNode> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            ConditionNode::Logical(inner) if inner.operator == operator => {
                trace!("Splicing nested {operator}");
                out.extend(inner.children);
            }
            other => out.push(other),
        }
    }
    out
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    Lower,
    Upper,
}

fn combine_ranges(children: Vec<ConditionNode>) -> Vec<ConditionNode> {
    // (field, side) -> indexes of the bounds on that side
    let mut groups: IndexMap<(&str, Side), Vec<usize>> = IndexMap::new();
    for (index, child) in children.iter().enumerate() {
        if let ConditionNode::Field(cond) = child {
            if cond.operator.is_range() {
                let side = if cond.operator.is_lower_bound() {
                    Side::Lower
                } else {
                    Side::Upper
                };
                groups.entry((cond.field.as_str(), side)).or_default().push(index);
            }
        }
    }

    let mut dropped = HashSet::new();
    for ((_, side), indexes) in &groups {
        if indexes.len() < 2 {
            continue;
        }
        let bounds: Vec<&FieldCondition> = indexes
            .iter()
            .filter_map(|&i| match &children[i] {
                ConditionNode::Field(cond) => Some(cond),
                ConditionNode::Logical(_) => None,
            })
            .collect();
        let Some(winner) = tightest(&bounds, *side) else {
            continue;
        };
        dropped.extend(
            indexes
                .iter()
                .enumerate()
                .filter(|(position, _)| *position != winner)
                .map(|(_, &i)| i),
        );
    }

    if dropped.is_empty() {
        return children;
    }
    trace!("Range combination dropped {} bound(s)", dropped.len());
    children
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !dropped.contains(i))
        .map(|(_, child)| child)
        .collect()
}

/// Position of the tightest bound, or `None` when the bounds are not mutually comparable
fn tightest(bounds: &[&FieldCondition], side: Side) -> Option<usize> {
    let mut best = 0;
    for candidate in 1..bounds.len() {
        let ordering = compare_values(&bounds[candidate].value, &bounds[best].value)?;
        let tighter = match (side, ordering) {
            (Side::Lower, Ordering::Greater) | (Side::Upper, Ordering::Less) => true,
            (_, Ordering::Equal) => {
                is_strict(bounds[candidate].operator) && !is_strict(bounds[best].operator)
            }
            _ => false,
        };
        if tighter {
            best = candidate;
        }
    }
    Some(best)
}

fn is_strict(op: ComparisonOperator) -> bool {
    matches!(op, ComparisonOperator::Gt | ComparisonOperator::Lt)
}

/// Ordering between two bound values of the same kind
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return Some(x.cmp(&y));
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return Some(x.cmp(&y));
            }
            // one side is a u64 above i64::MAX
            match (x.as_i64(), y.as_u64(), x.as_u64(), y.as_i64()) {
                (Some(_), Some(_), None, _) => Some(Ordering::Less),
                (_, None, Some(_), Some(_)) => Some(Ordering::Greater),
                _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
            }
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn remove_duplicates(children: Vec<ConditionNode>) -> Vec<ConditionNode> {
    let mut seen = HashSet::new();
    children
        .into_iter()
        .filter(|child| seen.insert(canonical_key(child)))
        .collect()
}

/// Canonical identity of a condition; `$and`/`$or` children compare as sets.
///
/// Keys are JSON arrays, so field names and operands are quoted and escaped
/// and two distinct conditions never share a key.
pub fn canonical_key(node: &ConditionNode) -> String {
    match node {
        ConditionNode::Field(cond) => {
            json!(["field", cond.field, cond.operator.symbol(), cond.value]).to_string()
        }
        ConditionNode::Logical(logical) => {
            let mut keys: Vec<String> = logical.children.iter().map(canonical_key).collect();
            if logical.operator.is_associative() {
                keys.sort();
            }
            json!(["logical", logical.operator.symbol(), keys]).to_string()
        }
    }
}

fn verify(ast: &FilterAST) -> Result<()> {
    fn check(node: &ConditionNode) -> Result<()> {
        match node {
            ConditionNode::Field(cond) if cond.field.is_empty() => Err(QEngineError::Optimization(
                "field condition lost its field name".to_string(),
            )),
            ConditionNode::Field(_) => Ok(()),
            ConditionNode::Logical(logical) => {
                if logical.children.len() == 1 && logical.operator.is_associative() {
                    return Err(QEngineError::Optimization(format!(
                        "{} node left with a single child",
                        logical.operator
                    )));
                }
                logical.children.iter().try_for_each(check)
            }
        }
    }

    match &ast.where_clause {
        Some(root) => check(root),
        None => Ok(()),
    }
}
