//! Rule: Message Subscription
//!
//! Messages caught inside a running instance are correlated by key, so the
//! correlation key must be an expression over instance variables. Message
//! start events have no instance yet and carry no correlation key.

use crate::model::definition::{FlowNodeKind, Process};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct SubscriptionRule;

impl ValidationRule for SubscriptionRule {
    fn id(&self) -> &'static str {
        "message-subscription"
    }

    fn description(&self) -> &'static str {
        "Correlation keys of caught messages must be expressions"
    }

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError> {
        let verifier = context.verifier();
        let mut errors = Vec::new();

        for node in process.flow_nodes() {
            if matches!(node.kind, FlowNodeKind::StartEvent(_)) {
                continue;
            }
            let Some(message) = node.kind.message() else {
                continue;
            };

            let correlation_key = message.correlation_key.as_deref().unwrap_or("");
            if let Err(error) = verifier.expression_required(correlation_key) {
                errors.push(ValidationError::error(
                    &node.id,
                    "ZeebeSubscription",
                    error,
                    self.id(),
                ));
            }
        }

        errors
    }
}
