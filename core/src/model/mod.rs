//! Workflow model: resource descriptions, validation and the executable graph

pub mod definition;
pub mod executable;
pub mod timer;
pub mod transform;
pub mod validation;

use thiserror::Error;

pub use definition::Definitions;
pub use executable::{ExecutableStartEvent, ExecutableWorkflow};
pub use transform::WorkflowTransformer;
pub use validation::{ValidationError, Validator};

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to parse resource: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{}", validation::format_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("- Element: {element_id}\n    - ERROR: {message}")]
    Binding { element_id: String, message: String },

    #[error("Expected element '{0}' to exist, but it was not found")]
    MissingElement(String),

    #[error("Expected at least one executable process, but none found")]
    NoExecutableProcess,
}

impl TransformError {
    pub fn binding(element_id: impl Into<String>, message: impl Into<String>) -> Self {
        TransformError::Binding {
            element_id: element_id.into(),
            message: message.into(),
        }
    }
}
