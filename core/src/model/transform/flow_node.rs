//! First pass: one executable element per flow node

use crate::model::definition::{FlowNode, FlowNodeKind, Mapping, MultiInstance};
use crate::model::executable::{
    BpmnElementType, BpmnStep, ElementKind, ExecutableElement, ExecutableLoopCharacteristics,
    ExecutableStartEvent, VariableMapping, WorkflowInstanceIntent,
};

use super::TransformContext;

const DEFAULT_JOB_RETRIES: &str = "3";

pub(super) fn instantiate(
    node: &FlowNode,
    scope: Option<&str>,
    context: &mut TransformContext<'_>,
) {
    let (element_type, kind) = match &node.kind {
        FlowNodeKind::StartEvent(_) => (
            BpmnElementType::StartEvent,
            ElementKind::StartEvent(ExecutableStartEvent::default()),
        ),
        FlowNodeKind::EndEvent => (BpmnElementType::EndEvent, ElementKind::EndEvent),
        FlowNodeKind::ServiceTask(task) => (
            BpmnElementType::ServiceTask,
            ElementKind::ServiceTask {
                job_type: context.parse(&task.task_definition.job_type),
                retries: context.parse(
                    task.task_definition
                        .retries
                        .as_deref()
                        .unwrap_or(DEFAULT_JOB_RETRIES),
                ),
            },
        ),
        FlowNodeKind::ReceiveTask(task) => (
            BpmnElementType::ReceiveTask,
            ElementKind::ReceiveTask {
                message: context.message(&task.message),
            },
        ),
        FlowNodeKind::IntermediateCatchEvent(_) => (
            BpmnElementType::IntermediateCatchEvent,
            ElementKind::IntermediateCatchEvent {
                message: None,
                timer: None,
            },
        ),
        FlowNodeKind::ExclusiveGateway(gateway) => (
            BpmnElementType::ExclusiveGateway,
            ElementKind::ExclusiveGateway {
                default_flow: gateway.default_flow.clone(),
            },
        ),
        FlowNodeKind::SubProcess(sub) => (
            BpmnElementType::SubProcess,
            ElementKind::Container {
                start_events: Vec::new(),
                children: sub.elements.iter().map(|e| e.id.clone()).collect(),
            },
        ),
        FlowNodeKind::CallActivity(call) => (
            BpmnElementType::CallActivity,
            ElementKind::CallActivity {
                process_id: context.parse(&call.process_id),
            },
        ),
    };

    let mut element = ExecutableElement::new(&node.id, element_type, kind);
    element.scope = scope.map(str::to_string);
    element.inputs = mappings(&node.inputs, context);
    element.outputs = mappings(&node.outputs, context);
    element.loop_characteristics = node
        .kind
        .multi_instance()
        .map(|multi_instance| loop_characteristics(multi_instance, context));

    bind_lifecycle(&mut element);
    context.workflow_mut().add_element(element);
}

fn mappings(mappings: &[Mapping], context: &TransformContext<'_>) -> Vec<VariableMapping> {
    mappings
        .iter()
        .map(|mapping| VariableMapping {
            source: context.parse(&mapping.source),
            target: mapping.target.clone(),
        })
        .collect()
}

fn loop_characteristics(
    multi_instance: &MultiInstance,
    context: &TransformContext<'_>,
) -> ExecutableLoopCharacteristics {
    ExecutableLoopCharacteristics {
        sequential: multi_instance.sequential,
        input_collection: context.parse(multi_instance.input_collection.as_deref().unwrap_or("")),
        input_element: multi_instance.input_element.clone(),
        output_collection: multi_instance.output_collection.clone(),
        output_element: multi_instance
            .output_element
            .as_deref()
            .map(|text| context.parse(text)),
    }
}

fn bind_lifecycle(element: &mut ExecutableElement) {
    use WorkflowInstanceIntent as Intent;

    element.bind_lifecycle_state(Intent::ElementActivating, BpmnStep::ElementActivating);
    element.bind_lifecycle_state(Intent::ElementActivated, BpmnStep::ElementActivated);
    element.bind_lifecycle_state(Intent::ElementCompleting, BpmnStep::ElementCompleting);
    element.bind_lifecycle_state(Intent::ElementCompleted, BpmnStep::ElementCompleted);
    element.bind_lifecycle_state(Intent::ElementTerminating, BpmnStep::ElementTerminating);

    match element.element_type {
        BpmnElementType::ServiceTask
        | BpmnElementType::ReceiveTask
        | BpmnElementType::CallActivity => {
            element.bind_lifecycle_state(Intent::EventOccurred, BpmnStep::ActivityEventOccurred);
        }
        BpmnElementType::ExclusiveGateway => {
            element.bind_lifecycle_state(Intent::ElementActivating, BpmnStep::ExclusiveSplit);
        }
        BpmnElementType::SubProcess => {
            element.bind_lifecycle_state(
                Intent::ElementActivated,
                BpmnStep::ContainerElementActivated,
            );
            element.bind_lifecycle_state(
                Intent::ElementCompleted,
                BpmnStep::ContainerElementCompleted,
            );
        }
        _ => {}
    }
}
