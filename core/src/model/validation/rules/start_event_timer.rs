//! Rule: Start Event Timer
//!
//! Timer start events are scheduled at deploy time, before any variables
//! exist. Their cycle or date must therefore evaluate without variables and
//! the result must be a valid repeating interval or date.
//!
//! ```json
//! { "id": "every-hour", "type": "startEvent", "timer": { "cycle": "R/PT1H" } }
//! ```

use crate::el::{EmptyVariables, ResultType};
use crate::model::definition::{FlowNodeKind, Process};
use crate::model::timer::{parse_date, RepeatingInterval};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub const INVALID_TIMER_START_EVENT_MESSAGE: &str =
    "Expected a valid timer expression for start event, but encountered the following error: ";

pub struct StartEventTimerRule;

impl StartEventTimerRule {
    /// Evaluate `text` without variables and hand the string result to `check`
    fn evaluate(
        &self,
        text: &str,
        context: &ValidationContext<'_>,
        check: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        let language = context.expression_language;
        let expression = language.parse_expression(text);
        let result = language.evaluate_expression(&expression, &EmptyVariables);

        if let Some(failure) = result.failure_message() {
            return Some(failure.to_string());
        }
        match result.string() {
            Some(value) if result.result_type() == ResultType::String => check(value),
            _ => Some(format!(
                "Expected FEEL expression or static value of '{}' of type STRING, but was: {}",
                result.expression(),
                result.result_type()
            )),
        }
    }
}

impl ValidationRule for StartEventTimerRule {
    fn id(&self) -> &'static str {
        "start-event-timer"
    }

    fn description(&self) -> &'static str {
        "Timer start events must evaluate to a repeating interval or date without variables"
    }

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for node in process.flow_nodes() {
            let FlowNodeKind::StartEvent(start) = &node.kind else {
                continue;
            };
            let Some(timer) = start.timer.as_ref() else {
                continue;
            };

            let mut failures = Vec::new();
            if let Some(cycle) = timer.cycle.as_deref() {
                failures.extend(self.evaluate(cycle, context, |value| {
                    value.parse::<RepeatingInterval>().err().map(|e| e.to_string())
                }));
            }
            if let Some(date) = timer.date.as_deref() {
                failures.extend(self.evaluate(date, context, |value| {
                    parse_date(value).err().map(|e| e.to_string())
                }));
            }

            errors.extend(failures.into_iter().map(|failure| {
                ValidationError::error(
                    &node.id,
                    "StartEvent",
                    format!("{}{}", INVALID_TIMER_START_EVENT_MESSAGE, failure),
                    self.id(),
                )
            }));
        }

        errors
    }
}
