//! Tests for deploy-time validation

use serde_json::{json, Value};

use super::*;
use crate::el::FeelExpressionLanguage;
use crate::model::validation::rules::INVALID_TIMER_START_EVENT_MESSAGE;

const INVALID_EXPRESSION: &str = "=?!";
const INVALID_EXPRESSION_MESSAGE: &str =
    "failed to parse expression '?!': [1.2] failure: end of input expected\n\n?!\n ^";
const STATIC_EXPRESSION_MESSAGE: &str =
    "Expected expression but found static value 'x'. An expression must start with '=' (e.g. '=x').";
const MISSING_EXPRESSION_MESSAGE: &str = "Expected expression but not found.";
const MISSING_PATH_EXPRESSION_MESSAGE: &str = "Expected path expression but not found.";
const INVALID_PATH_EXPRESSION_MESSAGE: &str =
    "Expected path expression 'a ? b' but doesn't match the pattern '[a-zA-Z][a-zA-Z0-9_]*(\\.[a-zA-Z][a-zA-Z0-9_]*)*'.";

// ============================================================================
// Helper Functions
// ============================================================================

/// Build `start -> <element> -> end` around the given element
fn around(element: Value) -> Process {
    let id = element["id"].as_str().unwrap_or("task").to_string();
    serde_json::from_value(json!({
        "id": "process",
        "elements": [
            { "id": "start", "type": "startEvent" },
            element,
            { "id": "end", "type": "endEvent" }
        ],
        "sequenceFlows": [
            { "id": "f1", "source": "start", "target": id },
            { "id": "f2", "source": id, "target": "end" }
        ]
    }))
    .expect("valid process")
}

fn process(value: Value) -> Process {
    serde_json::from_value(value).expect("valid process")
}

fn validate(process: &Process) -> Vec<ValidationError> {
    Validator::new().validate(process, &FeelExpressionLanguage)
}

/// Assert that exactly the expected `(element type, message)` pairs are reported
fn assert_errors(errors: &[ValidationError], expected: &[(&str, &str)]) {
    let actual: Vec<(&str, &str)> = errors
        .iter()
        .map(|e| (e.element_type, e.message.as_str()))
        .collect();
    assert_eq!(actual, expected, "errors: {:#?}", errors);
}

fn service_task(extra: Value) -> Value {
    let mut task = json!({
        "id": "task",
        "type": "serviceTask",
        "taskDefinition": { "type": "payment" }
    });
    if let (Some(task), Value::Object(extra)) = (task.as_object_mut(), extra) {
        task.extend(extra);
    }
    task
}

// ============================================================================
// Valid Processes
// ============================================================================

#[test]
fn test_valid_process_has_no_errors() {
    let process = around(service_task(json!({
        "inputs": [{ "source": "=order.id", "target": "orderId" }],
        "outputs": [{ "source": "=result", "target": "order.result" }],
        "multiInstance": { "inputCollection": "=items", "outputElement": "=item" }
    })));

    assert_errors(&validate(&process), &[]);
}

#[test]
fn test_rules_are_listed() {
    let validator = Validator::new();
    let ids: Vec<_> = validator.rules().map(|(id, _)| id).collect();

    assert!(ids.contains(&"io-mapping"));
    assert!(ids.contains(&"start-event-timer"));
}

// ============================================================================
// Condition Expressions
// ============================================================================

fn gateway_with_condition(condition: &str) -> Process {
    process(json!({
        "id": "process",
        "elements": [
            { "id": "start", "type": "startEvent" },
            { "id": "gateway", "type": "exclusiveGateway" },
            { "id": "end", "type": "endEvent" }
        ],
        "sequenceFlows": [
            { "id": "f1", "source": "start", "target": "gateway" },
            { "id": "flow", "source": "gateway", "target": "end", "condition": condition }
        ]
    }))
}

#[test]
fn test_condition_invalid_expression() {
    let errors = validate(&gateway_with_condition(INVALID_EXPRESSION));

    assert_errors(&errors, &[("ConditionExpression", INVALID_EXPRESSION_MESSAGE)]);
    assert_eq!(errors[0].element_id, "flow");
    assert_eq!(errors[0].rule_id, "condition-expression");
}

#[test]
fn test_condition_static_value() {
    let errors = validate(&gateway_with_condition("x"));

    assert_errors(&errors, &[("ConditionExpression", STATIC_EXPRESSION_MESSAGE)]);
}

// ============================================================================
// IO Mappings
// ============================================================================

fn with_mapping(kind: &str, source: &str, target: &str) -> Process {
    let mut extra = serde_json::Map::new();
    extra.insert(
        kind.to_string(),
        json!([{ "source": source, "target": target }]),
    );
    around(service_task(Value::Object(extra)))
}

#[test]
fn test_input_invalid_expression() {
    let errors = validate(&with_mapping("inputs", INVALID_EXPRESSION, "foo"));
    assert_errors(&errors, &[("ZeebeInput", INVALID_EXPRESSION_MESSAGE)]);
}

#[test]
fn test_input_static_value() {
    let errors = validate(&with_mapping("inputs", "x", "bar"));
    assert_errors(&errors, &[("ZeebeInput", STATIC_EXPRESSION_MESSAGE)]);
}

#[test]
fn test_input_empty_expression() {
    let errors = validate(&with_mapping("inputs", "", "bar"));
    assert_errors(&errors, &[("ZeebeInput", MISSING_EXPRESSION_MESSAGE)]);
}

#[test]
fn test_input_empty_path() {
    let errors = validate(&with_mapping("inputs", "=foo", ""));
    assert_errors(&errors, &[("ZeebeInput", MISSING_PATH_EXPRESSION_MESSAGE)]);
}

#[test]
fn test_input_invalid_path() {
    let errors = validate(&with_mapping("inputs", "=foo", "a ? b"));
    assert_errors(&errors, &[("ZeebeInput", INVALID_PATH_EXPRESSION_MESSAGE)]);
}

#[test]
fn test_output_mapping_messages() {
    let cases = [
        (INVALID_EXPRESSION, "foo", INVALID_EXPRESSION_MESSAGE),
        ("x", "bar", STATIC_EXPRESSION_MESSAGE),
        ("", "bar", MISSING_EXPRESSION_MESSAGE),
        ("=foo", "a ? b", INVALID_PATH_EXPRESSION_MESSAGE),
        ("=foo", "", MISSING_PATH_EXPRESSION_MESSAGE),
    ];

    for (source, target, message) in cases {
        let errors = validate(&with_mapping("outputs", source, target));
        assert_errors(&errors, &[("ZeebeOutput", message)]);
    }
}

// ============================================================================
// Message Subscriptions
// ============================================================================

#[test]
fn test_correlation_key_messages() {
    for element_type in ["intermediateCatchEvent", "receiveTask"] {
        let catch = |correlation_key: &str| {
            around(json!({
                "id": "catch",
                "type": element_type,
                "message": { "name": "message", "correlationKey": correlation_key }
            }))
        };

        assert_errors(
            &validate(&catch(INVALID_EXPRESSION)),
            &[("ZeebeSubscription", INVALID_EXPRESSION_MESSAGE)],
        );
        assert_errors(
            &validate(&catch("x")),
            &[("ZeebeSubscription", STATIC_EXPRESSION_MESSAGE)],
        );
        assert_errors(&validate(&catch("=orderId")), &[]);
    }
}

// ============================================================================
// Loop Characteristics
// ============================================================================

#[test]
fn test_input_collection_messages() {
    let with_collection = |collection: &str| {
        around(service_task(json!({ "multiInstance": { "inputCollection": collection } })))
    };

    assert_errors(
        &validate(&with_collection(INVALID_EXPRESSION)),
        &[("ZeebeLoopCharacteristics", INVALID_EXPRESSION_MESSAGE)],
    );
    assert_errors(
        &validate(&with_collection("x")),
        &[("ZeebeLoopCharacteristics", STATIC_EXPRESSION_MESSAGE)],
    );
}

#[test]
fn test_output_element_messages() {
    let with_output = |output: &str| {
        around(service_task(json!({
            "multiInstance": {
                "inputCollection": "=foo",
                "outputCollection": "bar",
                "outputElement": output
            }
        })))
    };

    assert_errors(
        &validate(&with_output(INVALID_EXPRESSION)),
        &[("ZeebeLoopCharacteristics", INVALID_EXPRESSION_MESSAGE)],
    );
    assert_errors(
        &validate(&with_output("x")),
        &[("ZeebeLoopCharacteristics", STATIC_EXPRESSION_MESSAGE)],
    );
}

// ============================================================================
// Task Definitions and Called Elements
// ============================================================================

#[test]
fn test_job_type_invalid_expression() {
    let process = around(json!({
        "id": "task",
        "type": "serviceTask",
        "taskDefinition": { "type": INVALID_EXPRESSION }
    }));

    assert_errors(
        &validate(&process),
        &[("ZeebeTaskDefinition", INVALID_EXPRESSION_MESSAGE)],
    );
}

#[test]
fn test_job_retries_invalid_expression() {
    let process = around(json!({
        "id": "task",
        "type": "serviceTask",
        "taskDefinition": { "type": "test", "retries": INVALID_EXPRESSION }
    }));

    assert_errors(
        &validate(&process),
        &[("ZeebeTaskDefinition", INVALID_EXPRESSION_MESSAGE)],
    );
}

#[test]
fn test_called_process_id_invalid_expression() {
    let process = around(json!({
        "id": "call",
        "type": "callActivity",
        "processId": INVALID_EXPRESSION
    }));

    assert_errors(
        &validate(&process),
        &[("ZeebeCalledElement", INVALID_EXPRESSION_MESSAGE)],
    );
}

// ============================================================================
// Messages
// ============================================================================

#[test]
fn test_message_name_expression_must_parse() {
    let process = process(json!({
        "id": "process",
        "elements": [{ "id": "start", "type": "startEvent", "message": { "name": INVALID_EXPRESSION } }]
    }));

    assert_errors(&validate(&process), &[("Message", INVALID_EXPRESSION_MESSAGE)]);
}

#[test]
fn test_duplicate_message_start_event_names() {
    let process = process(json!({
        "id": "process",
        "elements": [
            { "id": "a", "type": "startEvent", "message": { "name": "order" } },
            { "id": "b", "type": "startEvent", "message": { "name": "order" } }
        ]
    }));

    let errors = validate(&process);

    assert_errors(
        &errors,
        &[(
            "Message",
            "Multiple message start events with the same name 'order' are not allowed.",
        )],
    );
    assert_eq!(errors[0].element_id, "b");
}

// ============================================================================
// Timers
// ============================================================================

fn timer_start(cycle: &str) -> Process {
    process(json!({
        "id": "process",
        "elements": [{ "id": "start", "type": "startEvent", "timer": { "cycle": cycle } }]
    }))
}

#[test]
fn test_timer_start_event_invalid_expression() {
    let errors = validate(&timer_start(INVALID_EXPRESSION));

    let timer_start_message = format!(
        "{}{}",
        INVALID_TIMER_START_EVENT_MESSAGE, INVALID_EXPRESSION_MESSAGE
    );
    assert_errors(
        &errors,
        &[
            ("TimerEventDefinition", INVALID_EXPRESSION_MESSAGE),
            ("StartEvent", timer_start_message.as_str()),
        ],
    );
}

#[test]
fn test_timer_start_event_not_a_cycle() {
    let errors = validate(&timer_start("=\"PT1H\""));

    let message = format!(
        "{}Repetition spec must start with R",
        INVALID_TIMER_START_EVENT_MESSAGE
    );
    assert_errors(&errors, &[("StartEvent", message.as_str())]);
}

#[test]
fn test_timer_start_event_cycle_expression() {
    assert_errors(&validate(&timer_start("=\"R3/\" + \"PT1H\"")), &[]);
    assert_errors(&validate(&timer_start("R/PT10S")), &[]);
}

#[test]
fn test_timer_start_event_with_variable_fails() {
    let errors = validate(&timer_start("=cycle"));

    let message = format!(
        "{}no variable found for name 'cycle'",
        INVALID_TIMER_START_EVENT_MESSAGE
    );
    assert_errors(&errors, &[("StartEvent", message.as_str())]);
}

#[test]
fn test_timer_requires_exactly_one_kind() {
    let process = around(json!({
        "id": "wait",
        "type": "intermediateCatchEvent",
        "timer": { "duration": "PT1M", "date": "2026-10-18T10:00:00Z" }
    }));

    assert_errors(
        &validate(&process),
        &[(
            "TimerEventDefinition",
            "Must have exactly one type of timer: cycle, duration or date",
        )],
    );
}

#[test]
fn test_timer_static_duration_must_parse() {
    let process = around(json!({
        "id": "wait",
        "type": "intermediateCatchEvent",
        "timer": { "duration": "one minute" }
    }));

    assert_errors(
        &validate(&process),
        &[("TimerEventDefinition", "Invalid duration 'one minute'")],
    );
}

// ============================================================================
// Flow Structure
// ============================================================================

#[test]
fn test_missing_start_event() {
    let process = process(json!({
        "id": "process",
        "elements": [{ "id": "end", "type": "endEvent" }]
    }));

    let errors = validate(&process);

    assert_errors(&errors, &[("Process", "Must have at least one start event")]);
    assert_eq!(errors[0].element_id, "process");
}

#[test]
fn test_dangling_sequence_flow() {
    let process = process(json!({
        "id": "process",
        "elements": [{ "id": "start", "type": "startEvent" }],
        "sequenceFlows": [{ "id": "f1", "source": "start", "target": "nowhere" }]
    }));

    assert_errors(
        &validate(&process),
        &[(
            "SequenceFlow",
            "Expected target 'nowhere' to be an element of 'process'",
        )],
    );
}

#[test]
fn test_sub_process_start_event_must_be_none() {
    let process = around(json!({
        "id": "sub",
        "type": "subProcess",
        "elements": [
            { "id": "inner-start", "type": "startEvent", "message": { "name": "nested" } }
        ]
    }));

    assert_errors(
        &validate(&process),
        &[(
            "StartEvent",
            "Start events in sub-processes must be of type none",
        )],
    );
}

#[test]
fn test_error_display() {
    let error =
        ValidationError::error("flow", "ConditionExpression", "bad", "condition-expression");

    assert_eq!(
        error.to_string(),
        "- Element: flow (ConditionExpression)\n    - ERROR: bad"
    );
}
