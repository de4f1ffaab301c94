//! Second pass: sequence flows become elements and connect their endpoints

use crate::model::definition::SequenceFlow;
use crate::model::executable::{
    BpmnElementType, BpmnStep, ElementKind, ExecutableElement, WorkflowInstanceIntent,
};
use crate::model::TransformError;

use super::TransformContext;

pub(super) fn transform(
    flows: &[SequenceFlow],
    scope: Option<&str>,
    context: &mut TransformContext<'_>,
) -> Result<(), TransformError> {
    for flow in flows {
        let condition = flow.condition.as_deref().map(|text| context.parse(text));

        context.element_mut(&flow.source)?.outgoing.push(flow.id.clone());
        context.element_mut(&flow.target)?.incoming.push(flow.id.clone());

        let mut element = ExecutableElement::new(
            &flow.id,
            BpmnElementType::SequenceFlow,
            ElementKind::SequenceFlow {
                source: flow.source.clone(),
                target: flow.target.clone(),
                condition,
            },
        );
        element.scope = scope.map(str::to_string);
        element.bind_lifecycle_state(
            WorkflowInstanceIntent::SequenceFlowTaken,
            BpmnStep::SequenceFlowTaken,
        );

        context.workflow_mut().add_element(element);
    }

    Ok(())
}
