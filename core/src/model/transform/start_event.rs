//! Start event binding
//!
//! Message start events open subscriptions when the workflow is deployed,
//! before any instance (and thus any variable) exists. A message name given
//! as an expression is therefore evaluated here, once, without variables and
//! stored as the literal name.

use crate::el::{EmptyVariables, ResultType};
use crate::model::definition::{FlowNode, FlowNodeKind};
use crate::model::executable::{
    BpmnStep, ElementKind, ExecutableMessage, ExecutableTimer, WorkflowInstanceIntent,
};
use crate::model::TransformError;

use super::{static_timer, ElementTransformer, TransformContext};

pub struct StartEventTransformer;

impl ElementTransformer for StartEventTransformer {
    fn applies_to(&self, node: &FlowNode) -> bool {
        matches!(node.kind, FlowNodeKind::StartEvent(_))
    }

    fn transform(
        &self,
        node: &FlowNode,
        scope: Option<&str>,
        context: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let FlowNodeKind::StartEvent(definition) = &node.kind else {
            return Ok(());
        };

        let message = match &definition.message {
            Some(message) => {
                let mut message = context.message(message);
                bind_message_name(&mut message, context)
                    .map_err(|error| TransformError::binding(&node.id, error))?;
                Some(message)
            }
            None => None,
        };

        let timer = match &definition.timer {
            Some(timer) => context
                .timer(timer)
                .and_then(|timer| timer.map(|t| bind_timer(t, context)).transpose())
                .map_err(|error| TransformError::binding(&node.id, error))?,
            None => None,
        };

        let element = context.element_mut(&node.id)?;
        if let ElementKind::StartEvent(start) = &mut element.kind {
            start.interrupting = definition.interrupting;
            start.message = message;
            start.timer = timer;
        }
        element.bind_lifecycle_state(
            WorkflowInstanceIntent::EventOccurred,
            BpmnStep::StartEventEventOccurred,
        );

        match scope {
            Some(container_id) => {
                let container = context.element_mut(container_id)?;
                if let ElementKind::Container { start_events, .. } = &mut container.kind {
                    start_events.push(node.id.clone());
                }
            }
            None => context.workflow_mut().add_start_event(&node.id),
        }

        Ok(())
    }
}

/// Evaluate a non-literal message name without variables
fn bind_message_name(
    message: &mut ExecutableMessage,
    context: &TransformContext<'_>,
) -> Result<(), String> {
    if message.name.is_some() {
        return Ok(());
    }

    let result = context
        .expression_language()
        .evaluate_expression(&message.name_expression, &EmptyVariables);

    if let Some(failure) = result.failure_message() {
        return Err(format!(
            "Error while evaluating '{}': {}",
            message.name_expression.expression(),
            failure
        ));
    }

    match result.string() {
        Some(name) if result.result_type() == ResultType::String => {
            message.name = Some(name.to_string());
            Ok(())
        }
        _ => Err(format!(
            "Expected FEEL expression or static value of '{}' of type STRING, but was: {}",
            result.expression(),
            result.result_type()
        )),
    }
}

/// Timer start events are scheduled at deploy time, so dynamic values are
/// resolved now
fn bind_timer(
    timer: ExecutableTimer,
    context: &TransformContext<'_>,
) -> Result<ExecutableTimer, String> {
    let (kind, expression) = match timer {
        ExecutableTimer::Dynamic(kind, expression) => (kind, expression),
        resolved => return Ok(resolved),
    };

    let result = context
        .expression_language()
        .evaluate_expression(&expression, &EmptyVariables);

    if let Some(failure) = result.failure_message() {
        return Err(format!(
            "Error while evaluating '{}': {}",
            expression.expression(),
            failure
        ));
    }

    match result.string() {
        Some(value) => static_timer(kind, value),
        None => Err(format!(
            "Expected FEEL expression or static value of '{}' of type STRING, but was: {}",
            result.expression(),
            result.result_type()
        )),
    }
}
