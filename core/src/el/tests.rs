//! Tests for the expression language

use super::*;
use maplit::hashmap;
use serde_json::json;

// ============================================================================
// Helper Functions
// ============================================================================

fn eval(text: &str) -> EvaluationResult {
    let language = FeelExpressionLanguage;
    let expression = language.parse_expression(text);
    language.evaluate_expression(&expression, &EmptyVariables)
}

fn eval_with(text: &str, variables: &HashMap<String, JsonValue>) -> EvaluationResult {
    let language = FeelExpressionLanguage;
    let expression = language.parse_expression(text);
    language.evaluate_expression(&expression, variables)
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_static_value() {
    let expression = FeelExpressionLanguage.parse_expression("order-created");

    assert!(expression.is_valid());
    assert!(expression.is_static());
    assert_eq!(expression.expression(), "order-created");
    assert_eq!(expression.to_string(), "order-created");
}

#[test]
fn test_expression_strips_marker() {
    let expression = FeelExpressionLanguage.parse_expression("=order.id");

    assert!(expression.is_valid());
    assert!(!expression.is_static());
    assert_eq!(expression.expression(), "order.id");
    assert_eq!(expression.to_string(), "=order.id");
    assert_eq!(
        expression.ast(),
        Some(&Expr::Path(vec!["order".to_string(), "id".to_string()]))
    );
}

#[test]
fn test_precedence() {
    let expression = FeelExpressionLanguage.parse_expression("=1 + 2 * 3");

    let expected = Expr::Binary {
        op: BinaryOp::Add,
        left: Box::new(Expr::Number(1.0)),
        right: Box::new(Expr::Binary {
            op: BinaryOp::Mul,
            left: Box::new(Expr::Number(2.0)),
            right: Box::new(Expr::Number(3.0)),
        }),
    };
    assert_eq!(expression.ast(), Some(&expected));
}

#[test]
fn test_keyword_prefixed_names_are_paths() {
    let expression = FeelExpressionLanguage.parse_expression("=nothing + order");

    assert!(expression.is_valid(), "{:?}", expression.failure_message());
}

#[test]
fn test_parse_failure_message() {
    let expression = FeelExpressionLanguage.parse_expression("=?!");

    assert!(!expression.is_valid());
    assert_eq!(
        expression.failure_message(),
        Some("failed to parse expression '?!': [1.2] failure: end of input expected\n\n?!\n ^")
    );
}

#[test]
fn test_parse_failure_points_at_column() {
    let expression = FeelExpressionLanguage.parse_expression("=a ? b");

    let message = expression.failure_message().unwrap();
    assert!(
        message.starts_with("failed to parse expression 'a ? b': [1.3] failure:"),
        "unexpected message: {}",
        message
    );
    assert!(message.ends_with("a ? b\n  ^"), "unexpected message: {}", message);
}

#[test]
fn test_unterminated_string_fails() {
    let expression = FeelExpressionLanguage.parse_expression("=\"foo");

    assert!(!expression.is_valid());
    assert!(expression
        .failure_message()
        .unwrap()
        .starts_with("failed to parse expression '\"foo'"));
}

#[test]
fn test_empty_body_fails() {
    let expression = FeelExpressionLanguage.parse_expression("=");

    assert!(!expression.is_valid());
    assert_eq!(expression.expression(), "");
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn test_static_value_evaluates_to_string() {
    let result = eval("order-created");

    assert!(!result.is_failure());
    assert_eq!(result.result_type(), ResultType::String);
    assert_eq!(result.string(), Some("order-created"));
}

#[test]
fn test_string_concatenation() {
    let result = eval("=\"order-\" + \"created\"");

    assert_eq!(result.string(), Some("order-created"));
    assert_eq!(result.expression(), "\"order-\" + \"created\"");
}

#[test]
fn test_arithmetic_keeps_integers() {
    assert_eq!(eval("=1 + 2 * 3").value(), Some(&json!(7)));
    assert_eq!(eval("=-(4 - 6)").value(), Some(&json!(2)));
    assert_eq!(eval("=7 / 2").value(), Some(&json!(3.5)));
    assert_eq!(eval("=1 / 0").result_type(), ResultType::Null);
}

#[test]
fn test_comparison_and_logic() {
    assert_eq!(eval("=1 < 2 and \"a\" = \"a\"").value(), Some(&json!(true)));
    assert_eq!(eval("=1 >= 2 or false").value(), Some(&json!(false)));
    assert_eq!(eval("=not(1 != 1)").value(), Some(&json!(true)));
    assert_eq!(eval("=null = null").value(), Some(&json!(true)));
}

#[test]
fn test_result_types() {
    assert_eq!(eval("=null").result_type(), ResultType::Null);
    assert_eq!(eval("=true").result_type(), ResultType::Boolean);
    assert_eq!(eval("=1.5").result_type(), ResultType::Number);
    assert_eq!(eval("=\"x\"").result_type(), ResultType::String);
    assert_eq!(eval("=[1, \"a\"]").result_type(), ResultType::Array);
    assert_eq!(ResultType::Number.to_string(), "NUMBER");
}

#[test]
fn test_variables_and_member_access() {
    let variables = hashmap! {
        "order".to_string() => json!({ "id": "o-1", "total": 40 }),
        "prefix".to_string() => json!("order-"),
    };

    let result = eval_with("=prefix + order.id", &variables);
    assert_eq!(result.string(), Some("order-o-1"));

    let result = eval_with("=order.total * 2", &variables);
    assert_eq!(result.value(), Some(&json!(80)));

    let result = eval_with("=order.missing", &variables);
    assert_eq!(result.result_type(), ResultType::Null);
}

#[test]
fn test_closure_resolver() {
    let language = FeelExpressionLanguage;
    let expression = language.parse_expression("=x + 1");
    let resolver = |name: &str| (name == "x").then(|| json!(41));

    let result = language.evaluate_expression(&expression, &resolver);

    assert_eq!(result.value(), Some(&json!(42)));
}

#[test]
fn test_unknown_variable_is_failure() {
    let result = eval("=foo");

    assert!(result.is_failure());
    assert_eq!(
        result.failure_message(),
        Some("no variable found for name 'foo'")
    );
    assert_eq!(result.result_type(), ResultType::Null);
    assert_eq!(result.string(), None);
}

#[test]
fn test_type_mismatch_is_failure() {
    let result = eval("=\"a\" + 1");

    assert!(result.is_failure());
    assert_eq!(
        result.failure_message(),
        Some("can't apply '+' to STRING and NUMBER")
    );
}

#[test]
fn test_invalid_expression_evaluates_to_failure() {
    let language = FeelExpressionLanguage;
    let expression = language.parse_expression("=a ?");

    let result = language.evaluate_expression(&expression, &EmptyVariables);

    assert!(result.is_failure());
    assert_eq!(result.failure_message(), expression.failure_message());
}
