//! Rule: Timer Event Definition
//!
//! A timer has exactly one of cycle, duration or date. Static durations and
//! dates must parse; static cycles of start events are checked by
//! `StartEventTimerRule`.

use crate::model::definition::{FlowNode, FlowNodeKind, Process, TimerDefinition};
use crate::model::timer::{parse_date, parse_duration};

use super::super::{ExpressionVerifier, ValidationContext, ValidationError, ValidationRule};

pub struct TimerDefinitionRule;

impl TimerDefinitionRule {
    fn check(
        &self,
        node: &FlowNode,
        timer: &TimerDefinition,
        verifier: &ExpressionVerifier<'_>,
    ) -> Vec<String> {
        let attributes = [
            timer.cycle.as_deref(),
            timer.duration.as_deref(),
            timer.date.as_deref(),
        ];
        if attributes.iter().flatten().count() != 1 {
            return vec![
                "Must have exactly one type of timer: cycle, duration or date".to_string(),
            ];
        }

        let mut messages = Vec::new();
        for text in attributes.into_iter().flatten() {
            match verifier.static_or_expression(text) {
                Err(message) => messages.push(message),
                Ok(expression) if expression.is_static() => {
                    if let Some(duration) = timer.duration.as_deref() {
                        messages.extend(parse_duration(duration).err().map(|e| e.to_string()));
                    }
                    if let Some(date) = timer.date.as_deref() {
                        messages.extend(parse_date(date).err().map(|e| e.to_string()));
                    }
                }
                Ok(_) => {}
            }
        }

        if timer.cycle.is_some() && !matches!(node.kind, FlowNodeKind::StartEvent(_)) {
            messages.push("Timer cycles are only supported on start events".to_string());
        }

        messages
    }
}

impl ValidationRule for TimerDefinitionRule {
    fn id(&self) -> &'static str {
        "timer-definition"
    }

    fn description(&self) -> &'static str {
        "Timer definitions must be static values or valid expressions"
    }

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError> {
        let verifier = context.verifier();
        let mut errors = Vec::new();

        for node in process.flow_nodes() {
            let Some(timer) = node.kind.timer() else {
                continue;
            };
            for message in self.check(node, timer, &verifier) {
                errors.push(ValidationError::error(
                    &node.id,
                    "TimerEventDefinition",
                    message,
                    self.id(),
                ));
            }
        }

        errors
    }
}
