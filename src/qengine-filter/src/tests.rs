use super::*;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use qengine_parser::{
    AstNode, FieldCondition, FieldsSpec, FilterNormalizer, FilterParser, LogicalCondition,
    NormalizedFilter, OrderEntry, OrderSpec,
};
use qengine_shared::{
    ComparisonOperator, LogicalOperator, OptimizerConfig, SecurityPolicy, ValidatorConfig,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn normalized(input: Value) -> NormalizedFilter {
    let parsed = FilterParser::default()
        .parse(input)
        .unwrap_or_else(|e| panic!("Failed to parse: {e}"));
    FilterNormalizer::default()
        .normalize(&parsed)
        .unwrap_or_else(|e| panic!("Failed to normalize: {e}"))
}

fn where_only(condition: Value) -> NormalizedFilter {
    let Value::Object(map) = condition else {
        panic!("where clause must be an object");
    };
    NormalizedFilter {
        where_clause: Some(map),
        ..NormalizedFilter::default()
    }
}

fn build_success(input: Value) -> FilterAST {
    AstBuilder::new()
        .build(&normalized(input))
        .unwrap_or_else(|e| panic!("Failed to build: {e}"))
}

fn validate_failure(validator: &FilterValidator, filter: &NormalizedFilter) -> QEngineError {
    match validator.validate(filter) {
        Ok(()) => panic!("Expected validation failure for {filter:?}"),
        Err(e) => e,
    }
}

fn optimize(ast: &FilterAST) -> FilterAST {
    AstOptimizer::default()
        .optimize(ast)
        .unwrap_or_else(|e| panic!("Failed to optimize: {e}"))
}

fn gt(field: &str, value: Value) -> ConditionNode {
    ConditionNode::field(field, ComparisonOperator::Gt, value)
}

fn eq(field: &str, value: Value) -> ConditionNode {
    ConditionNode::field(field, ComparisonOperator::Eq, value)
}

// Validator

#[test]
fn test_validate_accepts_well_formed_filter() {
    let filter = normalized(json!({
        "where": {"price": {"$gte": 10, "$lt": 100}, "tags": {"$in": ["a", "b"]}},
        "order": "-price",
        "fields": ["name", "price"]
    }));
    assert!(FilterValidator::default().validate(&filter).is_ok());
}

#[test]
fn test_validate_field_not_in_allow_list() {
    let policy = SecurityPolicy::default().with_allowed_fields(["name"]);
    let validator = FilterValidator::new(ValidatorConfig::default(), policy);

    let err = validate_failure(&validator, &normalized(json!({"where": {"price": {"$gt": 1}}})));
    assert_eq!(
        err,
        QEngineError::Security {
            messages: vec!["Field 'price' is not allowed".to_string()]
        }
    );
}

#[test]
fn test_validate_allow_list_covers_nested_paths() {
    let policy = SecurityPolicy::default().with_allowed_fields(["address"]);
    let validator = FilterValidator::new(ValidatorConfig::default(), policy);
    assert!(validator
        .validate(&normalized(json!({"where": {"address.city": "Paris"}})))
        .is_ok());
}

#[test]
fn test_validate_security_wins_over_structure() {
    let policy = SecurityPolicy::default().with_blocked_fields(["secret"]);
    let validator = FilterValidator::new(ValidatorConfig::default(), policy);

    let err = validate_failure(&validator, &where_only(json!({"secret": {"$in": 5}})));
    assert!(err.is_security());
    assert_eq!(err.messages(), vec!["Field 'secret' is blocked".to_string()]);
}

#[test]
fn test_validate_blocked_prefix_blocks_children() {
    let policy = SecurityPolicy::default().with_blocked_fields(["credentials"]);
    let validator = FilterValidator::new(ValidatorConfig::default(), policy);

    let err = validate_failure(
        &validator,
        &where_only(json!({"credentials.token": {"$eq": "x"}})),
    );
    assert_eq!(err.messages(), vec!["Field 'credentials.token' is blocked".to_string()]);
}

#[test]
fn test_validate_aggregates_every_structural_problem() {
    let err = validate_failure(
        &FilterValidator::default(),
        &where_only(json!({"a": {"$exists": "yes"}, "b": {"$size": -1}})),
    );
    assert!(matches!(err, QEngineError::Validation { .. }));
    assert_eq!(err.messages().len(), 2);
}

#[test]
fn test_validate_aggregates_every_security_problem() {
    let policy = SecurityPolicy::default()
        .with_blocked_fields(["ssn"])
        .with_allowed_operators([ComparisonOperator::Eq]);
    let validator = FilterValidator::new(ValidatorConfig::default(), policy);

    let err = validate_failure(&validator, &where_only(json!({"ssn": {"$gt": 1}})));
    assert_eq!(
        err.messages(),
        vec![
            "Field 'ssn' is blocked".to_string(),
            "Operator '$gt' is not allowed".to_string()
        ]
    );
}

#[test]
fn test_validate_depth_limit() {
    let policy = SecurityPolicy {
        max_depth: 1,
        ..SecurityPolicy::default()
    };
    let validator = FilterValidator::new(ValidatorConfig::default(), policy);
    let filter = where_only(json!({
        "$and": [
            {"$or": [{"a": {"$eq": 1}}, {"b": {"$eq": 2}}]},
            {"c": {"$eq": 3}}
        ]
    }));

    let err = validate_failure(&validator, &filter);
    assert_eq!(
        err.messages(),
        vec!["Query depth 2 exceeds maximum allowed depth of 1".to_string()]
    );
}

#[test]
fn test_validate_array_cap_boundary() {
    let policy = SecurityPolicy {
        max_array_size: 3,
        ..SecurityPolicy::default()
    };
    let validator = FilterValidator::new(ValidatorConfig::default(), policy);

    assert!(validator
        .validate(&where_only(json!({"id": {"$in": [1, 2, 3]}})))
        .is_ok());

    let err = validate_failure(&validator, &where_only(json!({"id": {"$in": [1, 2, 3, 4]}})));
    assert!(err.is_security());
}

#[test]
fn test_validate_operand_types() {
    let cases = [
        json!({"a": {"$in": "x"}}),
        json!({"a": {"$regex": "("}}),
        json!({"a": {"$regex": 5}}),
        json!({"a": {"$exists": 1}}),
        json!({"a": {"$type": -2}}),
        json!({"a": {"$gt": [1]}}),
    ];
    for case in cases {
        let err = validate_failure(&FilterValidator::default(), &where_only(case.clone()));
        assert!(
            matches!(err, QEngineError::Validation { .. }),
            "unexpected error for {case}: {err:?}"
        );
    }
}

#[test]
fn test_validate_skips_types_when_disabled() {
    let config = ValidatorConfig {
        validate_types: false,
        ..ValidatorConfig::default()
    };
    let validator = FilterValidator::new(config, SecurityPolicy::default());
    assert!(validator.validate(&where_only(json!({"a": {"$in": "x"}}))).is_ok());
}

#[test]
fn test_validate_unknown_operator() {
    let err = validate_failure(&FilterValidator::default(), &where_only(json!({"a": {"$near": 1}})));
    assert_eq!(
        err.messages(),
        vec!["Unknown operator '$near' on field 'a'".to_string()]
    );

    let lenient = FilterValidator::new(
        ValidatorConfig {
            validate_operators: false,
            ..ValidatorConfig::default()
        },
        SecurityPolicy::default(),
    );
    assert!(lenient.validate(&where_only(json!({"a": {"$near": 1}}))).is_ok());
}

#[test]
fn test_validate_logical_shape() {
    let err = validate_failure(&FilterValidator::default(), &where_only(json!({"$or": []})));
    assert_eq!(
        err.messages(),
        vec!["Logical operator '$or' cannot have empty array".to_string()]
    );

    let err = validate_failure(&FilterValidator::default(), &where_only(json!({"$and": {"a": 1}})));
    assert_eq!(
        err.messages(),
        vec!["Logical operator '$and' requires an array value".to_string()]
    );

    let err = validate_failure(&FilterValidator::default(), &where_only(json!({"$gt": 5})));
    assert_eq!(
        err.messages(),
        vec!["Comparison operator '$gt' must be applied to a field".to_string()]
    );
}

#[test]
fn test_validate_field_names() {
    let err = validate_failure(
        &FilterValidator::default(),
        &where_only(json!({"a..b": {"$eq": 1}})),
    );
    assert_eq!(
        err.messages(),
        vec!["Invalid field name 'a..b': contains an empty path segment".to_string()]
    );
}

#[test]
fn test_validate_projection_mixing() {
    let filter = NormalizedFilter {
        fields: Some(IndexMap::from([("name".to_string(), 1), ("secret".to_string(), 0)])),
        ..NormalizedFilter::default()
    };
    let err = validate_failure(&FilterValidator::default(), &filter);
    assert_eq!(
        err.messages(),
        vec!["Cannot mix inclusion and exclusion in fields".to_string()]
    );
}

#[test]
fn test_validate_order_fields_against_policy() {
    let policy = SecurityPolicy::default().with_allowed_fields(["name"]);
    let validator = FilterValidator::new(ValidatorConfig::default(), policy);
    let err = validate_failure(&validator, &normalized(json!({"order": "-price"})));
    assert!(err.is_security());
}

struct NoPasswordRule;

impl ValidationRule for NoPasswordRule {
    fn name(&self) -> &str {
        "no_password"
    }

    fn validate(&self, node: AstNode<'_>) -> Vec<String> {
        match node {
            AstNode::Field(cond) if cond.field.contains("password") => {
                vec![format!("Field '{}' must not be queried", cond.field)]
            }
            _ => Vec::new(),
        }
    }
}

#[test]
fn test_custom_rule_runs_when_configured() {
    let config = ValidatorConfig {
        custom_validators: vec!["no_password".to_string()],
        ..ValidatorConfig::default()
    };
    let validator = FilterValidator::new(config, SecurityPolicy::default())
        .with_rule(Arc::new(NoPasswordRule));
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        eq("name", json!("x")),
        eq("password", json!("hunter2")),
    ]));

    let err = validator.validate_ast(&ast).unwrap_err();
    assert_eq!(
        err.messages(),
        vec!["Field 'password' must not be queried".to_string()]
    );
}

#[test]
fn test_custom_rule_ignored_unless_configured() {
    let validator = FilterValidator::default().with_rule(Arc::new(NoPasswordRule));
    let ast = FilterAST::with_where(eq("password", json!("hunter2")));
    assert!(validator.validate_ast(&ast).is_ok());
}

#[test]
fn test_unknown_custom_rule_is_reported() {
    let config = ValidatorConfig {
        custom_validators: vec!["missing".to_string()],
        ..ValidatorConfig::default()
    };
    let validator = FilterValidator::new(config, SecurityPolicy::default());
    let err = validator.validate_ast(&FilterAST::default()).unwrap_err();
    assert_eq!(
        err.messages(),
        vec!["Unknown custom validator 'missing'".to_string()]
    );
}

#[test]
fn test_validate_ast_node() {
    let policy = SecurityPolicy::default().with_blocked_fields(["secret"]);
    let validator = FilterValidator::new(ValidatorConfig::default(), policy);
    let cond = FieldCondition::new("secret", ComparisonOperator::Eq, json!(1));
    assert_eq!(
        validator.validate_ast_node(AstNode::Field(&cond)),
        vec!["Field 'secret' is blocked".to_string()]
    );
}

// Builder

#[test]
fn test_build_bracket_scenario() {
    let parsed = FilterParser::default()
        .parse(qengine_parser::RawFilter::from_iter([("filter[where][price][$gt]", "50")]))
        .unwrap();
    let filter = FilterNormalizer::default().normalize(&parsed).unwrap();
    let ast = AstBuilder::new().build(&filter).unwrap();
    assert_eq!(ast, FilterAST::with_where(gt("price", json!(50))));
}

#[test]
fn test_build_or_scenario() {
    let ast = build_success(json!({
        "where": {"$or": [{"category": "electronics"}, {"price": {"$lt": 20}}]}
    }));
    assert_eq!(
        ast.where_clause,
        Some(ConditionNode::or(vec![
            eq("category", json!("electronics")),
            ConditionNode::field("price", ComparisonOperator::Lt, json!(20)),
        ]))
    );
}

#[test]
fn test_build_implicit_and() {
    let ast = build_success(json!({"where": {"category": "books", "price": {"$gte": 5, "$lte": 9}}}));
    assert_eq!(
        ast.where_clause,
        Some(ConditionNode::and(vec![
            eq("category", json!("books")),
            ConditionNode::and(vec![
                ConditionNode::field("price", ComparisonOperator::Gte, json!(5)),
                ConditionNode::field("price", ComparisonOperator::Lte, json!(9)),
            ]),
        ]))
    );
}

#[test]
fn test_build_collapse_matches_plain_condition() {
    let wrapped = build_success(json!({"where": {"$and": [{"category": "books"}]}}));
    let plain = build_success(json!({"where": {"category": "books"}}));
    assert_eq!(wrapped, plain);
}

#[test]
fn test_build_keeps_single_child_nor() {
    let ast = build_success(json!({"where": {"$nor": [{"status": "draft"}]}}));
    assert_eq!(
        ast.where_clause,
        Some(ConditionNode::nor(vec![eq("status", json!("draft"))]))
    );
}

#[test]
fn test_build_order_and_fields() {
    let ast = build_success(json!({"order": "price DESC, name ASC", "fields": ["name", "price"]}));
    assert_eq!(
        ast.order,
        Some(OrderSpec::new(vec![OrderEntry::desc("price"), OrderEntry::asc("name")]))
    );
    assert_eq!(ast.fields, Some(FieldsSpec::including(["name", "price"])));
    assert_eq!(ast.where_clause, None);
}

#[test]
fn test_build_unknown_operator_is_unsupported() {
    let err = AstBuilder::new()
        .build(&where_only(json!({"location": {"$near": [1, 2]}})))
        .unwrap_err();
    assert_eq!(
        err,
        QEngineError::UnsupportedOperator {
            operator: "$near".to_string(),
            backend: None
        }
    );

    let err = AstBuilder::new()
        .build(&where_only(json!({"$text": "x"})))
        .unwrap_err();
    assert!(matches!(err, QEngineError::UnsupportedOperator { .. }));
}

#[test]
fn test_build_rejects_invalid_projection_flag() {
    let filter = NormalizedFilter {
        fields: Some(IndexMap::from([("name".to_string(), 2)])),
        ..NormalizedFilter::default()
    };
    assert!(matches!(
        AstBuilder::new().build(&filter),
        Err(QEngineError::Validation { .. })
    ));
}

// Optimizer

#[test]
fn test_optimize_flattens_same_operator() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        eq("a", json!(1)),
        ConditionNode::and(vec![eq("b", json!(2)), eq("c", json!(3))]),
    ]));
    assert_eq!(
        optimize(&ast).where_clause,
        Some(ConditionNode::and(vec![
            eq("a", json!(1)),
            eq("b", json!(2)),
            eq("c", json!(3)),
        ]))
    );
}

#[test]
fn test_optimize_keeps_mixed_operators_nested() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        eq("a", json!(1)),
        ConditionNode::or(vec![eq("b", json!(2)), eq("c", json!(3))]),
    ]));
    assert_eq!(optimize(&ast), ast);
}

#[test]
fn test_optimize_does_not_flatten_nor() {
    let ast = FilterAST::with_where(ConditionNode::nor(vec![
        eq("a", json!(1)),
        ConditionNode::nor(vec![eq("b", json!(2)), eq("c", json!(3))]),
    ]));
    assert_eq!(optimize(&ast), ast);
}

#[test]
fn test_optimize_duplicate_lower_bound() {
    let ast = build_success(json!({
        "where": {"$and": [{"price": {"$gt": 10}}, {"price": {"$gt": 5}}]}
    }));
    assert_eq!(
        optimize(&ast).where_clause,
        Some(gt("price", json!(10)))
    );
}

#[test]
fn test_optimize_keeps_both_sides_of_range() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        gt("price", json!(10)),
        ConditionNode::field("price", ComparisonOperator::Lt, json!(50)),
        ConditionNode::field("price", ComparisonOperator::Lte, json!(80)),
    ]));
    assert_eq!(
        optimize(&ast).where_clause,
        Some(ConditionNode::and(vec![
            gt("price", json!(10)),
            ConditionNode::field("price", ComparisonOperator::Lt, json!(50)),
        ]))
    );
}

#[test]
fn test_optimize_strict_bound_wins_tie() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        ConditionNode::field("age", ComparisonOperator::Gte, json!(18)),
        gt("age", json!(18)),
    ]));
    assert_eq!(optimize(&ast).where_clause, Some(gt("age", json!(18))));
}

#[test]
fn test_optimize_leaves_incomparable_bounds() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        gt("code", json!(5)),
        gt("code", json!("a")),
    ]));
    assert_eq!(optimize(&ast), ast);
}

#[test]
fn test_optimize_does_not_combine_under_or() {
    let ast = FilterAST::with_where(ConditionNode::or(vec![
        gt("price", json!(10)),
        gt("price", json!(5)),
    ]));
    assert_eq!(optimize(&ast), ast);
}

#[test]
fn test_optimize_removes_duplicates_then_collapses() {
    let ast = FilterAST::with_where(ConditionNode::or(vec![
        eq("a", json!(1)),
        eq("a", json!(1)),
    ]));
    assert_eq!(optimize(&ast).where_clause, Some(eq("a", json!(1))));
}

#[test]
fn test_optimize_duplicate_logical_children_ignore_order() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        ConditionNode::or(vec![eq("a", json!(1)), eq("b", json!(2))]),
        ConditionNode::or(vec![eq("b", json!(2)), eq("a", json!(1))]),
    ]));
    assert_eq!(
        optimize(&ast).where_clause,
        Some(ConditionNode::or(vec![eq("a", json!(1)), eq("b", json!(2))]))
    );
}

#[test]
fn test_optimize_nor_children_compare_in_order() {
    let first = ConditionNode::nor(vec![eq("a", json!(1)), eq("b", json!(2))]);
    let second = ConditionNode::nor(vec![eq("b", json!(2)), eq("a", json!(1))]);
    assert_ne!(canonical_key(&first), canonical_key(&second));
}

#[test]
fn test_optimize_keeps_siblings_with_separator_characters() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        ConditionNode::nor(vec![eq("a", json!(1)), eq("b", json!(2))]),
        ConditionNode::nor(vec![eq("a:$eq:1,field:b", json!(2))]),
    ]));
    let optimized = optimize(&ast);
    assert_eq!(optimized, ast);
    assert_eq!(optimized.where_clause.map(|n| n.leaf_count()), Some(3));
}

#[test]
fn test_canonical_key_quotes_field_names() {
    let plain = eq("a", json!("1,b"));
    let tricky = eq("a\",\"$eq", json!("1"));
    assert_ne!(canonical_key(&plain), canonical_key(&tricky));
    assert_eq!(canonical_key(&plain), r#"["field","a","$eq","1,b"]"#);
}

#[test]
fn test_optimize_order_first_occurrence_wins() {
    let ast = FilterAST {
        order: Some(OrderSpec::new(vec![
            OrderEntry::desc("price"),
            OrderEntry::asc("name"),
            OrderEntry::asc("price"),
        ])),
        ..FilterAST::default()
    };
    assert_eq!(
        optimize(&ast).order,
        Some(OrderSpec::new(vec![OrderEntry::desc("price"), OrderEntry::asc("name")]))
    );
}

#[test]
fn test_optimize_disabled_returns_clone() {
    let optimizer = AstOptimizer::new(OptimizerConfig {
        enabled: false,
        ..OptimizerConfig::default()
    });
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        gt("price", json!(10)),
        gt("price", json!(5)),
    ]));
    assert_eq!(optimizer.optimize(&ast).unwrap(), ast);
}

#[test]
fn test_optimize_respects_rule_toggles() {
    let optimizer = AstOptimizer::new(OptimizerConfig {
        combine_range_conditions: false,
        ..OptimizerConfig::default()
    });
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        gt("price", json!(10)),
        gt("price", json!(5)),
    ]));
    assert_eq!(optimizer.optimize(&ast).unwrap(), ast);
}

#[test]
fn test_optimize_is_idempotent_on_nested_tree() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        ConditionNode::and(vec![gt("x", json!(1)), gt("x", json!(3))]),
        ConditionNode::or(vec![
            ConditionNode::or(vec![eq("y", json!("a"))]),
            eq("y", json!("b")),
        ]),
    ]));
    let once = optimize(&ast);
    assert_eq!(optimize(&once), once);
}

#[test]
fn test_compare_values_kinds() {
    use std::cmp::Ordering;
    assert_eq!(compare_values(&json!(2), &json!(1.5)), Some(Ordering::Greater));
    assert_eq!(compare_values(&json!("a"), &json!("b")), Some(Ordering::Less));
    assert_eq!(compare_values(&json!(1), &json!("1")), None);
}

#[test]
fn test_compare_values_large_unsigned() {
    use std::cmp::Ordering;
    let max = json!(u64::MAX);
    let below = json!(u64::MAX - 1);
    assert_eq!(compare_values(&max, &below), Some(Ordering::Greater));
    assert_eq!(compare_values(&below, &max), Some(Ordering::Less));
    assert_eq!(compare_values(&json!(-1), &max), Some(Ordering::Less));
    assert_eq!(compare_values(&max, &json!(i64::MIN)), Some(Ordering::Greater));
    assert_eq!(compare_values(&json!(7), &json!(7u64)), Some(Ordering::Equal));
}

#[test]
fn test_optimize_keeps_tighter_large_unsigned_bound() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        gt("n", json!(u64::MAX - 1)),
        gt("n", json!(u64::MAX)),
    ]));
    assert_eq!(optimize(&ast).where_clause, Some(gt("n", json!(u64::MAX))));
}

// Registries

#[test]
fn test_compiler_registry_lifecycle() {
    let registry = CompilerRegistry::new();
    assert!(!registry.is_registered("document"));

    registry
        .register_compiler("document", Arc::new(DocumentCompiler::new()))
        .unwrap();
    assert!(registry.is_registered("document"));
    assert_eq!(registry.list_backends(), vec!["document".to_string()]);
    assert_eq!(registry.get_compiler("document").unwrap().name(), "document");

    assert!(registry.unregister_compiler("document"));
    assert!(!registry.unregister_compiler("document"));
    assert_eq!(
        registry.get_compiler("document").err(),
        Some(QEngineError::Registry(
            "No compiler registered for backend 'document'".to_string()
        ))
    );
}

#[test]
fn test_compiler_registry_rejects_empty_name() {
    let registry = CompilerRegistry::new();
    assert!(registry
        .register_compiler("  ", Arc::new(DocumentCompiler::new()))
        .is_err());
}

#[test]
fn test_operator_registry_backend_restriction() {
    let registry = OperatorRegistry::new();
    let handler = |field: &str, value: &Value| -> Result<Value> {
        Ok(json!({ field: { "$near": value } }))
    };
    registry
        .register_operator("$near", Arc::new(handler), &["document"])
        .unwrap();

    assert!(registry.is_registered("$near", None));
    assert!(registry.is_registered("$near", Some("document")));
    assert!(!registry.is_registered("$near", Some("sql")));
    assert_eq!(registry.list_operators(), vec!["$near".to_string()]);

    let compiled = registry
        .get_operator("$near", Some("document"))
        .unwrap()
        .compile("loc", &json!([1, 2]))
        .unwrap();
    assert_eq!(compiled, json!({"loc": {"$near": [1, 2]}}));

    assert!(registry.unregister_operator("$near"));
    assert!(!registry.is_registered("$near", None));
}

#[test]
fn test_document_extension_operators() {
    let registry = OperatorRegistry::new();
    register_document_operators(&registry).unwrap();
    assert_eq!(
        registry.list_operators(),
        vec!["$text".to_string(), "$geoWithin".to_string(), "$near".to_string()]
    );
    assert!(!registry.is_registered("$near", Some("sql")));

    let compile = |name: &str, field: &str, value: Value| {
        registry
            .get_operator(name, Some(DOCUMENT_BACKEND))
            .unwrap()
            .compile(field, &value)
            .unwrap()
    };
    assert_eq!(
        compile("$text", "ignored", json!("search term")),
        json!({"$text": {"$search": "search term"}})
    );
    let polygon = json!({"$geometry": {"type": "Polygon", "coordinates": []}});
    assert_eq!(
        compile("$geoWithin", "location", polygon.clone()),
        json!({"location": {"$geoWithin": polygon}})
    );
    let point = json!({"$geometry": {"type": "Point", "coordinates": [0, 0]}});
    assert_eq!(
        compile("$near", "location", point.clone()),
        json!({"location": {"$near": point}})
    );
}

#[test]
fn test_operator_registry_requires_prefix() {
    let registry = OperatorRegistry::new();
    let handler = |_: &str, value: &Value| -> Result<Value> { Ok(value.clone()) };
    let err = registry
        .register_operator("near", Arc::new(handler), &[])
        .unwrap_err();
    assert_eq!(
        err,
        QEngineError::Registry("Operator name 'near' must start with '$'".to_string())
    );
}

// Compilers

#[test]
fn test_document_compiler_output() {
    let ast = FilterAST {
        where_clause: Some(ConditionNode::or(vec![
            eq("category", json!("electronics")),
            ConditionNode::field("price", ComparisonOperator::Lt, json!(20)),
        ])),
        order: Some(OrderSpec::new(vec![OrderEntry::desc("price"), OrderEntry::asc("name")])),
        fields: Some(FieldsSpec::including(["name"])),
    };

    let query = DocumentCompiler::new().compile(&ast).unwrap();
    let mut projection = Map::new();
    projection.insert("name".to_string(), json!(1));
    assert_eq!(
        query,
        DocumentQuery {
            filter: json!({"$or": [{"category": "electronics"}, {"price": {"$lt": 20}}]})
                .as_object()
                .cloned()
                .unwrap(),
            sort: vec![("price".to_string(), -1), ("name".to_string(), 1)],
            projection: Some(projection),
        }
    );
}

#[test]
fn test_document_compiler_eq_on_object_is_explicit() {
    let ast = FilterAST::with_where(eq("meta", json!({"a": 1})));
    let output = DocumentCompiler::new().compile_json(&ast).unwrap();
    assert_eq!(
        output,
        json!({"filter": {"meta": {"$eq": {"a": 1}}}, "sort": []})
    );
}

#[test]
fn test_document_compiler_uses_registered_handler() {
    let operators = Arc::new(OperatorRegistry::new());
    let handler = |field: &str, value: &Value| -> Result<Value> {
        Ok(json!({ field: { "$regularExpression": { "pattern": value, "options": "i" } } }))
    };
    operators
        .register_operator("$regex", Arc::new(handler), &["document"])
        .unwrap();

    let compiler = DocumentCompiler::with_operators(operators);
    let ast = FilterAST::with_where(ConditionNode::field(
        "name",
        ComparisonOperator::Regex,
        json!("^a"),
    ));
    let query = compiler.compile(&ast).unwrap();
    assert_eq!(
        Value::Object(query.filter),
        json!({"name": {"$regularExpression": {"pattern": "^a", "options": "i"}}})
    );
}

#[test]
fn test_document_compiler_empty_ast() {
    let query = DocumentCompiler::new().compile(&FilterAST::default()).unwrap();
    assert_eq!(query, DocumentQuery::default());
}

/// Renders conditions as infix text; rejects `$regex`
struct InfixCompiler;

impl QueryCompiler for InfixCompiler {
    type Query = Vec<String>;
    type Expr = String;
    type Output = String;

    fn backend_name(&self) -> &str {
        "infix"
    }

    fn unsupported_operators(&self) -> &[ComparisonOperator] {
        &[ComparisonOperator::Regex]
    }

    fn create_base_query(&self) -> Vec<String> {
        Vec::new()
    }

    fn apply_where(&self, mut query: Vec<String>, condition: String) -> Result<Vec<String>> {
        query.push(format!("WHERE {condition}"));
        Ok(query)
    }

    fn apply_order(&self, mut query: Vec<String>, order: &OrderSpec) -> Result<Vec<String>> {
        let terms: Vec<String> = order.entries.iter().map(ToString::to_string).collect();
        query.push(format!("ORDER BY {}", terms.join(", ")));
        Ok(query)
    }

    fn apply_fields(&self, query: Vec<String>, _fields: &FieldsSpec) -> Result<Vec<String>> {
        Ok(query)
    }

    fn finalize_query(&self, query: Vec<String>) -> Result<String> {
        Ok(query.join(" "))
    }

    fn compile_field_condition(&self, condition: &FieldCondition) -> Result<String> {
        Ok(format!("{} {} {}", condition.field, condition.operator, condition.value))
    }

    fn compile_logical_condition(
        &self,
        condition: &LogicalCondition,
        children: Vec<String>,
    ) -> Result<String> {
        let joined = children.join(&format!(" {} ", condition.operator));
        Ok(format!("({joined})"))
    }
}

#[test]
fn test_template_compiles_children_first() {
    let ast = FilterAST {
        where_clause: Some(ConditionNode::and(vec![
            gt("price", json!(5)),
            ConditionNode::Logical(LogicalCondition::new(
                LogicalOperator::Or,
                vec![eq("a", json!(1)), eq("b", json!(2))],
            )),
        ])),
        order: Some(OrderSpec::new(vec![OrderEntry::desc("price")])),
        fields: None,
    };
    assert_eq!(
        InfixCompiler.compile(&ast).unwrap(),
        "WHERE (price $gt 5 $and (a $eq 1 $or b $eq 2)) ORDER BY price DESC"
    );
    assert!(InfixCompiler.supports_backend("infix"));
}

#[test]
fn test_template_reports_unsupported_operator() {
    let ast = FilterAST::with_where(ConditionNode::and(vec![
        eq("a", json!(1)),
        ConditionNode::field("name", ComparisonOperator::Regex, json!("^x")),
    ]));
    assert_eq!(
        InfixCompiler.compile(&ast).unwrap_err(),
        QEngineError::UnsupportedOperator {
            operator: "$regex".to_string(),
            backend: Some("infix".to_string())
        }
    );
}
