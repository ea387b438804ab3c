//! Filter validation
//!
//! The validator walks normalized clauses (and, separately, built ASTs)
//! collecting every violation before reporting. Security findings always win
//! over structural ones; see [`Violation::into_result`].

use indexmap::IndexMap;
use log::debug;
use qengine_parser::{
    json_type_name, AstNode, ConditionNode, FieldCondition, FieldsSpec, FilterAST,
    LogicalCondition, NormalizedFilter, OrderEntry, OrderSpec,
};
use qengine_shared::{
    ComparisonOperator, OperatorKey, Result, SecurityPolicy, ValidatorConfig, Violation,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A pluggable check run against every node of a built AST
pub trait ValidationRule: Send + Sync {
    /// Identifier referenced from `ValidatorConfig::custom_validators`
    fn name(&self) -> &str;

    /// Messages for every problem found at `node`; empty when valid
    fn validate(&self, node: AstNode<'_>) -> Vec<String>;
}

/// Validates filters against structural rules and a security policy
#[derive(Clone, Default)]
pub struct FilterValidator {
    config: ValidatorConfig,
    policy: SecurityPolicy,
    rules: IndexMap<String, Arc<dyn ValidationRule>>,
}

impl std::fmt::Debug for FilterValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterValidator")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FilterValidator {
    /// Create a validator
    pub fn new(config: ValidatorConfig, policy: SecurityPolicy) -> Self {
        Self {
            config,
            policy,
            rules: IndexMap::new(),
        }
    }

    /// Security policy in force
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Register a custom rule; it runs only when named in the configuration
    pub fn register_rule(&mut self, rule: Arc<dyn ValidationRule>) {
        self.rules.insert(rule.name().to_string(), rule);
    }

    /// Builder-style [`FilterValidator::register_rule`]
    pub fn with_rule(mut self, rule: Arc<dyn ValidationRule>) -> Self {
        self.register_rule(rule);
        self
    }

    /// Validate normalized clauses
    pub fn validate(&self, filter: &NormalizedFilter) -> Result<()> {
        let violations = self.collect_violations(filter);
        debug!("Validation found {} violation(s)", violations.len());
        Violation::into_result(violations)
    }

    /// Every violation in `filter`, in discovery order
    pub fn collect_violations(&self, filter: &NormalizedFilter) -> Vec<Violation> {
        let mut out = Vec::new();

        if let Some(where_clause) = &filter.where_clause {
            if where_clause.is_empty() {
                out.push(Violation::validation("Where clause cannot be empty"));
            }
            self.walk_condition(where_clause, 0, &mut out);
        }

        if let Some(order) = &filter.order {
            for entry in order {
                self.check_field(&entry.field, &mut out);
            }
        }

        if let Some(fields) = &filter.fields {
            self.check_projection(fields.iter().map(|(name, flag)| (name.as_str(), *flag)), &mut out);
        }

        out
    }

    /// Validate a built AST: policy checks on every node, then configured custom rules
    pub fn validate_ast(&self, ast: &FilterAST) -> Result<()> {
        let mut out = Vec::new();
        let mut nodes = Vec::new();

        if let Some(root) = &ast.where_clause {
            let depth = root.depth();
            if depth > self.policy.max_depth {
                out.push(depth_violation(depth, self.policy.max_depth));
            }
            collect_nodes(root, &mut nodes);
        }
        if let Some(order) = &ast.order {
            nodes.push(AstNode::Order(order));
        }
        if let Some(fields) = &ast.fields {
            nodes.push(AstNode::Fields(fields));
        }

        for node in &nodes {
            self.check_node(*node, &mut out);
        }

        for name in &self.config.custom_validators {
            match self.rules.get(name) {
                Some(rule) => {
                    for node in &nodes {
                        out.extend(rule.validate(*node).into_iter().map(Violation::validation));
                    }
                }
                None => out.push(Violation::validation(format!(
                    "Unknown custom validator '{name}'"
                ))),
            }
        }

        Violation::into_result(out)
    }

    /// Messages for every policy problem at one node
    pub fn validate_ast_node(&self, node: AstNode<'_>) -> Vec<String> {
        let mut out = Vec::new();
        self.check_node(node, &mut out);
        out.into_iter().map(|v| v.message).collect()
    }

    fn check_node(&self, node: AstNode<'_>, out: &mut Vec<Violation>) {
        match node {
            AstNode::Field(FieldCondition {
                field,
                operator,
                value,
            }) => {
                self.check_field(field, out);
                self.check_comparison(field, *operator, value, out);
            }
            AstNode::Logical(LogicalCondition { operator, children }) => {
                if children.is_empty() {
                    out.push(Violation::validation(format!(
                        "Logical operator '{operator}' cannot have empty array"
                    )));
                }
            }
            AstNode::Order(OrderSpec { entries }) => {
                for OrderEntry { field, .. } in entries {
                    self.check_field(field, out);
                }
            }
            AstNode::Fields(FieldsSpec { inclusion }) => {
                self.check_projection(
                    inclusion.iter().map(|(name, flag)| (name.as_str(), i64::from(*flag))),
                    out,
                );
            }
        }
    }

    fn walk_condition(&self, condition: &Map<String, Value>, depth: usize, out: &mut Vec<Violation>) {
        for (key, value) in condition {
            if !key.starts_with('$') {
                self.check_field(key, out);
                self.check_field_value(key, value, out);
                continue;
            }

            match OperatorKey::from_symbol(key) {
                Some(OperatorKey::Logical(op)) => {
                    let child_depth = depth + 1;
                    if child_depth > self.policy.max_depth {
                        out.push(depth_violation(child_depth, self.policy.max_depth));
                        continue;
                    }
                    let Value::Array(items) = value else {
                        out.push(Violation::validation(format!(
                            "Logical operator '{op}' requires an array value"
                        )));
                        continue;
                    };
                    if items.is_empty() {
                        out.push(Violation::validation(format!(
                            "Logical operator '{op}' cannot have empty array"
                        )));
                    }
                    for item in items {
                        match item {
                            Value::Object(child) => {
                                if child.is_empty() {
                                    out.push(Violation::validation(format!(
                                        "Logical operator '{op}' contains an empty condition"
                                    )));
                                }
                                self.walk_condition(child, child_depth, out);
                            }
                            other => out.push(Violation::validation(format!(
                                "Logical operator '{op}' items must be objects, got {}",
                                json_type_name(other)
                            ))),
                        }
                    }
                }
                Some(OperatorKey::Comparison(op)) => {
                    out.push(Violation::validation(format!(
                        "Comparison operator '{op}' must be applied to a field"
                    )));
                }
                None => {
                    if self.config.validate_operators {
                        out.push(Violation::validation(format!("Unknown operator '{key}'")));
                    }
                }
            }
        }
    }

    fn check_field_value(&self, field: &str, value: &Value, out: &mut Vec<Violation>) {
        let Value::Object(operators) = value else {
            self.check_comparison(field, ComparisonOperator::Eq, value, out);
            return;
        };

        if operators.is_empty() {
            out.push(Violation::validation(format!(
                "Field '{field}' has an empty condition"
            )));
        }

        for (key, operand) in operators {
            match OperatorKey::from_symbol(key) {
                Some(OperatorKey::Comparison(op)) => self.check_comparison(field, op, operand, out),
                Some(OperatorKey::Logical(op)) => out.push(Violation::validation(format!(
                    "Logical operator '{op}' cannot be applied to field '{field}'"
                ))),
                None => {
                    if self.config.validate_operators {
                        out.push(Violation::validation(format!(
                            "Unknown operator '{key}' on field '{field}'"
                        )));
                    }
                    self.check_array_size(field, key, operand, out);
                }
            }
        }
    }

    fn check_field(&self, field: &str, out: &mut Vec<Violation>) {
        if self.config.validate_field_names {
            if let Some(problem) = field_name_problem(field) {
                out.push(Violation::validation(format!(
                    "Invalid field name '{field}': {problem}"
                )));
            }
        }

        if self.policy.is_field_blocked(field) {
            out.push(Violation::security(format!("Field '{field}' is blocked")));
        } else if !self.policy.is_field_allowed(field) {
            out.push(Violation::security(format!("Field '{field}' is not allowed")));
        }
    }

    fn check_comparison(
        &self,
        field: &str,
        op: ComparisonOperator,
        operand: &Value,
        out: &mut Vec<Violation>,
    ) {
        if !self.policy.is_operator_allowed(op) {
            out.push(Violation::security(format!("Operator '{op}' is not allowed")));
        }

        self.check_array_size(field, op.symbol(), operand, out);

        if self.config.validate_types {
            if let Some(problem) = operand_problem(op, operand) {
                out.push(Violation::validation(format!(
                    "Operator '{op}' on field '{field}' {problem}"
                )));
            }
        }
    }

    fn check_array_size(&self, field: &str, op: &str, operand: &Value, out: &mut Vec<Violation>) {
        if let Value::Array(items) = operand {
            if items.len() > self.policy.max_array_size {
                out.push(Violation::security(format!(
                    "Array for operator '{op}' on field '{field}' has {} items, exceeding maximum of {}",
                    items.len(),
                    self.policy.max_array_size
                )));
            }
        }
    }

    fn check_projection<'a>(
        &self,
        fields: impl Iterator<Item = (&'a str, i64)>,
        out: &mut Vec<Violation>,
    ) {
        let mut seen_include = false;
        let mut seen_exclude = false;
        for (name, flag) in fields {
            self.check_field(name, out);
            match flag {
                1 => seen_include = true,
                0 => seen_exclude = true,
                other => out.push(Violation::validation(format!(
                    "Projection value for field '{name}' must be 0 or 1, got {other}"
                ))),
            }
        }
        if seen_include && seen_exclude {
            out.push(Violation::validation(
                "Cannot mix inclusion and exclusion in fields",
            ));
        }
    }
}

fn collect_nodes<'a>(node: &'a ConditionNode, nodes: &mut Vec<AstNode<'a>>) {
    nodes.push(node.as_node());
    if let ConditionNode::Logical(logical) = node {
        for child in &logical.children {
            collect_nodes(child, nodes);
        }
    }
}

fn depth_violation(depth: usize, max: usize) -> Violation {
    Violation::security(format!(
        "Query depth {depth} exceeds maximum allowed depth of {max}"
    ))
}

fn field_name_problem(field: &str) -> Option<&'static str> {
    if field.trim().is_empty() {
        Some("must not be empty")
    } else if field.starts_with('$') {
        Some("must not start with '$'")
    } else if field.split('.').any(str::is_empty) {
        Some("contains an empty path segment")
    } else if field.chars().any(char::is_control) {
        Some("contains control characters")
    } else {
        None
    }
}

fn operand_problem(op: ComparisonOperator, operand: &Value) -> Option<String> {
    match op {
        ComparisonOperator::In | ComparisonOperator::Nin => {
            (!operand.is_array()).then(|| "requires an array value".to_string())
        }
        ComparisonOperator::Regex => match operand {
            Value::String(pattern) => regex::Regex::new(pattern)
                .err()
                .map(|e| format!("has an invalid regular expression: {e}")),
            _ => Some("requires a string value".to_string()),
        },
        ComparisonOperator::Exists => {
            (!operand.is_boolean()).then(|| "requires a boolean value".to_string())
        }
        ComparisonOperator::Size => {
            (operand.as_u64().is_none()).then(|| "requires a non-negative integer".to_string())
        }
        ComparisonOperator::Type => match operand {
            Value::String(_) => None,
            Value::Number(n) if n.as_u64().is_some() => None,
            _ => Some("requires a type name or type code".to_string()),
        },
        ComparisonOperator::Gt
        | ComparisonOperator::Gte
        | ComparisonOperator::Lt
        | ComparisonOperator::Lte => (!(operand.is_number() || operand.is_string()))
            .then(|| format!("requires a number or string value, got {}", json_type_name(operand))),
        ComparisonOperator::Eq | ComparisonOperator::Ne => None,
    }
}
