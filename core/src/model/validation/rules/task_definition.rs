//! Rule: Task Definition

use crate::model::definition::{FlowNodeKind, Process};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct TaskDefinitionRule;

impl ValidationRule for TaskDefinitionRule {
    fn id(&self) -> &'static str {
        "task-definition"
    }

    fn description(&self) -> &'static str {
        "Job type and retries must be static values or valid expressions"
    }

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError> {
        let verifier = context.verifier();
        let mut errors = Vec::new();

        for node in process.flow_nodes() {
            let FlowNodeKind::ServiceTask(task) = &node.kind else {
                continue;
            };
            let definition = &task.task_definition;

            if definition.job_type.is_empty() {
                errors.push(ValidationError::error(
                    &node.id,
                    "ZeebeTaskDefinition",
                    "Expected job type but not found.",
                    self.id(),
                ));
            }

            let attributes = std::iter::once(definition.job_type.as_str())
                .chain(definition.retries.as_deref())
                .filter(|text| !text.is_empty());

            for text in attributes {
                if let Err(message) = verifier.static_or_expression(text) {
                    errors.push(ValidationError::error(
                        &node.id,
                        "ZeebeTaskDefinition",
                        message,
                        self.id(),
                    ));
                }
            }
        }

        errors
    }
}
