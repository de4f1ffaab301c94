//! Deploy-time validation of workflow descriptions
//!
//! Runs before transformation and checks everything the JSON schema can't:
//! expression attributes must parse, mapping targets must be variable paths,
//! timer start events must be statically evaluable, and so on.
//!
//! # Architecture
//!
//! 1. **ValidationRule trait** - Each rule checks one kind of attribute
//! 2. **Validator** - Collects and runs all rules
//! 3. **ValidationError** - Element id, element type, message and rule id
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `validation/rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to the `Validator::new()` constructor

pub mod expression;
pub mod rules;

#[cfg(test)]
mod tests;

use std::fmt;

use crate::el::ExpressionLanguage;
use crate::model::definition::Process;

pub use expression::ExpressionVerifier;

// ============================================================================
// Validation Error Types
// ============================================================================

/// A problem found in a workflow description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Id of the element carrying the offending attribute
    pub element_id: String,
    /// Type of the offending element or attribute, e.g. `ZeebeInput`
    pub element_type: &'static str,
    pub message: String,
    /// Which rule produced this error
    pub rule_id: &'static str,
}

impl ValidationError {
    pub fn error(
        element_id: impl Into<String>,
        element_type: &'static str,
        message: impl Into<String>,
        rule_id: &'static str,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            element_type,
            message: message.into(),
            rule_id,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "- Element: {} ({})\n    - ERROR: {}",
            self.element_id, self.element_type, self.message
        )
    }
}

impl std::error::Error for ValidationError {}

/// Render a list of errors one per block, as reported to clients
pub fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Everything a rule may consult besides the process itself
pub struct ValidationContext<'a> {
    pub expression_language: &'a dyn ExpressionLanguage,
}

impl<'a> ValidationContext<'a> {
    pub fn new(expression_language: &'a dyn ExpressionLanguage) -> Self {
        Self {
            expression_language,
        }
    }

    pub fn verifier(&self) -> ExpressionVerifier<'a> {
        ExpressionVerifier::new(self.expression_language)
    }
}

/// Trait that all validation rules must implement.
///
/// Rules are independent of each other and report every problem they find
/// rather than stopping at the first.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "io-mapping")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    fn validate(&self, process: &Process, context: &ValidationContext<'_>) -> Vec<ValidationError>;
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(rules::FlowStructureRule),
                Box::new(rules::ConditionExpressionRule),
                Box::new(rules::IoMappingRule),
                Box::new(rules::SubscriptionRule),
                Box::new(rules::LoopCharacteristicsRule),
                Box::new(rules::TaskDefinitionRule),
                Box::new(rules::CalledElementRule),
                Box::new(rules::MessageRule),
                Box::new(rules::TimerDefinitionRule),
                Box::new(rules::StartEventTimerRule),
            ],
        }
    }

    /// Run all validation rules and collect errors.
    pub fn validate(
        &self,
        process: &Process,
        expression_language: &dyn ExpressionLanguage,
    ) -> Vec<ValidationError> {
        let context = ValidationContext::new(expression_language);
        self.rules
            .iter()
            .flat_map(|rule| rule.validate(process, &context))
            .collect()
    }

    /// Registered rules as `(id, description)`
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
