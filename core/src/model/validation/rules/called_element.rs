//! Rule: Called Element

use crate::model::definition::{FlowNodeKind, Process};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct CalledElementRule;

impl ValidationRule for CalledElementRule {
    fn id(&self) -> &'static str {
        "called-element"
    }

    fn description(&self) -> &'static str {
        "Called process ids must be static values or valid expressions"
    }

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError> {
        let verifier = context.verifier();

        process
            .flow_nodes()
            .into_iter()
            .filter_map(|node| {
                let FlowNodeKind::CallActivity(call) = &node.kind else {
                    return None;
                };
                let message = if call.process_id.is_empty() {
                    "Expected process id but not found.".to_string()
                } else {
                    verifier.static_or_expression(&call.process_id).err()?
                };
                Some(ValidationError::error(
                    &node.id,
                    "ZeebeCalledElement",
                    message,
                    self.id(),
                ))
            })
            .collect()
    }
}
