//! Rule: Condition Expression
//!
//! A sequence flow condition must be an expression; a static value would
//! always take (or never take) the flow.
//!
//! ```json
//! { "id": "flow", "source": "gateway", "target": "end", "condition": "=total > 100" }
//! ```

use crate::model::definition::Process;

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct ConditionExpressionRule;

impl ValidationRule for ConditionExpressionRule {
    fn id(&self) -> &'static str {
        "condition-expression"
    }

    fn description(&self) -> &'static str {
        "Sequence flow conditions must be valid expressions"
    }

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError> {
        let verifier = context.verifier();

        process
            .all_sequence_flows()
            .into_iter()
            .filter_map(|flow| {
                let condition = flow.condition.as_deref()?;
                let message = verifier.expression_required(condition).err()?;
                Some(ValidationError::error(
                    &flow.id,
                    "ConditionExpression",
                    message,
                    self.id(),
                ))
            })
            .collect()
    }
}
