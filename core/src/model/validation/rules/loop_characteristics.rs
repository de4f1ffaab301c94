//! Rule: Loop Characteristics
//!
//! A multi-instance activity needs an input collection expression. The
//! output element, when given, is an expression evaluated per instance.

use crate::model::definition::Process;

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct LoopCharacteristicsRule;

impl ValidationRule for LoopCharacteristicsRule {
    fn id(&self) -> &'static str {
        "loop-characteristics"
    }

    fn description(&self) -> &'static str {
        "Multi-instance collections must be expressions"
    }

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError> {
        let verifier = context.verifier();
        let mut errors = Vec::new();

        for node in process.flow_nodes() {
            let Some(multi_instance) = node.kind.multi_instance() else {
                continue;
            };

            let input_collection = multi_instance.input_collection.as_deref().unwrap_or("");
            let mut messages: Vec<String> = verifier
                .expression_required(input_collection)
                .err()
                .into_iter()
                .collect();

            if let Some(output_element) = multi_instance.output_element.as_deref() {
                messages.extend(verifier.expression_required(output_element).err());
            }

            errors.extend(messages.into_iter().map(|message| {
                ValidationError::error(&node.id, "ZeebeLoopCharacteristics", message, self.id())
            }));
        }

        errors
    }
}
