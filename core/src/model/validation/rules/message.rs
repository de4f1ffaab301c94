//! Rule: Message
//!
//! Every message catching element names its message, either statically or
//! with an expression. Message start events of one process must use distinct
//! names since each name opens exactly one subscription per workflow.

use std::collections::HashSet;

use crate::model::definition::{FlowNodeKind, Process};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct MessageRule;

impl ValidationRule for MessageRule {
    fn id(&self) -> &'static str {
        "message-name"
    }

    fn description(&self) -> &'static str {
        "Message names must be static values or valid expressions"
    }

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError> {
        let verifier = context.verifier();
        let mut errors = Vec::new();

        for node in process.flow_nodes() {
            let Some(message) = node.kind.message() else {
                continue;
            };

            let result = match message.name.as_deref() {
                None | Some("") => Err("Expected message name but not found.".to_string()),
                Some(name) => verifier.static_or_expression(name).map(|_| ()),
            };

            if let Err(error) = result {
                errors.push(ValidationError::error(&node.id, "Message", error, self.id()));
            }
        }

        let mut seen = HashSet::new();
        for node in &process.elements {
            let FlowNodeKind::StartEvent(start) = &node.kind else {
                continue;
            };
            let Some(name) = start.message.as_ref().and_then(|m| m.name.as_deref()) else {
                continue;
            };
            if !name.is_empty() && !seen.insert(name) {
                errors.push(ValidationError::error(
                    &node.id,
                    "Message",
                    format!(
                        "Multiple message start events with the same name '{}' are not allowed.",
                        name
                    ),
                    self.id(),
                ));
            }
        }

        errors
    }
}
