//! Rule: IO Mapping
//!
//! Input and output mappings copy the result of the `source` expression into
//! the variable path `target`.
//!
//! # Notes
//!
//! - `source` must be an expression (`=order.id`), never a static value
//! - `target` is a plain path and never starts with `=`

use crate::model::definition::{Mapping, Process};

use super::super::{ExpressionVerifier, ValidationContext, ValidationError, ValidationRule};

pub struct IoMappingRule;

impl IoMappingRule {
    fn check(
        &self,
        element_id: &str,
        element_type: &'static str,
        mappings: &[Mapping],
        verifier: &ExpressionVerifier<'_>,
        errors: &mut Vec<ValidationError>,
    ) {
        for mapping in mappings {
            if let Err(message) = verifier.expression_required(&mapping.source) {
                errors.push(ValidationError::error(element_id, element_type, message, self.id()));
            }
            if let Err(message) = verifier.path_required(&mapping.target) {
                errors.push(ValidationError::error(element_id, element_type, message, self.id()));
            }
        }
    }
}

impl ValidationRule for IoMappingRule {
    fn id(&self) -> &'static str {
        "io-mapping"
    }

    fn description(&self) -> &'static str {
        "Mapping sources must be expressions and targets must be variable paths"
    }

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError> {
        let verifier = context.verifier();
        let mut errors = Vec::new();

        for node in process.flow_nodes() {
            self.check(&node.id, "ZeebeInput", &node.inputs, &verifier, &mut errors);
            self.check(&node.id, "ZeebeOutput", &node.outputs, &verifier, &mut errors);
        }

        errors
    }
}
