//! Intermediate catch event binding
//!
//! Unlike start events, catch events wait inside a running instance; message
//! names and correlation keys stay expressions until a subscription is opened.

use crate::model::definition::{FlowNode, FlowNodeKind};
use crate::model::executable::{BpmnStep, ElementKind, WorkflowInstanceIntent};
use crate::model::TransformError;

use super::{ElementTransformer, TransformContext};

pub struct CatchEventTransformer;

impl ElementTransformer for CatchEventTransformer {
    fn applies_to(&self, node: &FlowNode) -> bool {
        matches!(node.kind, FlowNodeKind::IntermediateCatchEvent(_))
    }

    fn transform(
        &self,
        node: &FlowNode,
        _scope: Option<&str>,
        context: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let FlowNodeKind::IntermediateCatchEvent(definition) = &node.kind else {
            return Ok(());
        };

        let bound_message = definition.message.as_ref().map(|m| context.message(m));
        let bound_timer = match &definition.timer {
            Some(timer) => context
                .timer(timer)
                .map_err(|error| TransformError::binding(&node.id, error))?,
            None => None,
        };

        let element = context.element_mut(&node.id)?;
        if let ElementKind::IntermediateCatchEvent { message, timer } = &mut element.kind {
            *message = bound_message;
            *timer = bound_timer;
        }
        element.bind_lifecycle_state(
            WorkflowInstanceIntent::EventOccurred,
            BpmnStep::IntermediateCatchEventEventOccurred,
        );

        Ok(())
    }
}
