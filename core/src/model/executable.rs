//! Executable workflow graph
//!
//! Produced once per deployed workflow by the transformer and shared
//! read-only (`Arc`) afterwards. Elements reference each other by id; the
//! workflow owns every element in a single map.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, TimeDelta};

use crate::el::Expression;
use crate::model::timer::RepeatingInterval;

/// Lifecycle states an element instance passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkflowInstanceIntent {
    ElementActivating,
    ElementActivated,
    ElementCompleting,
    ElementCompleted,
    ElementTerminating,
    ElementTerminated,
    EventOccurred,
    SequenceFlowTaken,
}

/// Step the engine executes when an element enters a lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BpmnStep {
    ElementActivating,
    ElementActivated,
    ElementCompleting,
    ElementCompleted,
    ElementTerminating,
    ActivityEventOccurred,
    StartEventEventOccurred,
    IntermediateCatchEventEventOccurred,
    ExclusiveSplit,
    SequenceFlowTaken,
    ContainerElementActivated,
    ContainerElementCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BpmnElementType {
    Process,
    SubProcess,
    StartEvent,
    EndEvent,
    ServiceTask,
    ReceiveTask,
    IntermediateCatchEvent,
    ExclusiveGateway,
    CallActivity,
    SequenceFlow,
}

/* ===================== Elements ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableMessage {
    /// Literal name; unset until a name expression has been bound
    pub name: Option<String>,
    pub name_expression: Expression,
    pub correlation_key: Option<Expression>,
}

impl ExecutableMessage {
    pub fn message_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutableTimer {
    Cycle(RepeatingInterval),
    Duration(TimeDelta),
    Date(DateTime<FixedOffset>),
    /// Evaluated when the timer is scheduled
    Dynamic(TimerKind, Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Cycle,
    Duration,
    Date,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutableStartEvent {
    pub interrupting: bool,
    pub message: Option<ExecutableMessage>,
    pub timer: Option<ExecutableTimer>,
}

impl ExecutableStartEvent {
    pub fn is_message(&self) -> bool {
        self.message.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableMapping {
    pub source: Expression,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableLoopCharacteristics {
    pub sequential: bool,
    pub input_collection: Expression,
    pub input_element: Option<String>,
    pub output_collection: Option<String>,
    pub output_element: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    StartEvent(ExecutableStartEvent),
    EndEvent,
    ServiceTask {
        job_type: Expression,
        retries: Expression,
    },
    ReceiveTask {
        message: ExecutableMessage,
    },
    IntermediateCatchEvent {
        message: Option<ExecutableMessage>,
        timer: Option<ExecutableTimer>,
    },
    ExclusiveGateway {
        default_flow: Option<String>,
    },
    /// Sub-process; child elements live in the workflow's element map
    Container {
        start_events: Vec<String>,
        children: Vec<String>,
    },
    CallActivity {
        process_id: Expression,
    },
    SequenceFlow {
        source: String,
        target: String,
        condition: Option<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableElement {
    pub id: String,
    pub element_type: BpmnElementType,
    /// Enclosing sub-process, `None` for top-level elements
    pub scope: Option<String>,
    pub incoming: Vec<String>,
    pub outgoing: Vec<String>,
    pub inputs: Vec<VariableMapping>,
    pub outputs: Vec<VariableMapping>,
    pub loop_characteristics: Option<ExecutableLoopCharacteristics>,
    pub lifecycle: BTreeMap<WorkflowInstanceIntent, BpmnStep>,
    pub kind: ElementKind,
}

impl ExecutableElement {
    pub fn new(id: impl Into<String>, element_type: BpmnElementType, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            element_type,
            scope: None,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            loop_characteristics: None,
            lifecycle: BTreeMap::new(),
            kind,
        }
    }

    pub fn bind_lifecycle_state(&mut self, state: WorkflowInstanceIntent, step: BpmnStep) {
        self.lifecycle.insert(state, step);
    }

    pub fn step(&self, state: WorkflowInstanceIntent) -> Option<BpmnStep> {
        self.lifecycle.get(&state).copied()
    }

    pub fn as_start_event(&self) -> Option<&ExecutableStartEvent> {
        match &self.kind {
            ElementKind::StartEvent(start) => Some(start),
            _ => None,
        }
    }
}

/* ===================== Workflow ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableWorkflow {
    bpmn_process_id: String,
    elements: BTreeMap<String, ExecutableElement>,
    start_events: Vec<String>,
}

impl ExecutableWorkflow {
    pub fn new(bpmn_process_id: impl Into<String>) -> Self {
        Self {
            bpmn_process_id: bpmn_process_id.into(),
            elements: BTreeMap::new(),
            start_events: Vec::new(),
        }
    }

    pub fn bpmn_process_id(&self) -> &str {
        &self.bpmn_process_id
    }

    pub fn add_element(&mut self, element: ExecutableElement) {
        self.elements.insert(element.id.clone(), element);
    }

    pub fn element(&self, id: &str) -> Option<&ExecutableElement> {
        self.elements.get(id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut ExecutableElement> {
        self.elements.get_mut(id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &ExecutableElement> {
        self.elements.values()
    }

    /// Register a top-level start event; keeps declaration order
    pub fn add_start_event(&mut self, id: impl Into<String>) {
        self.start_events.push(id.into());
    }

    /// Top-level start events in declaration order
    pub fn start_events(&self) -> Vec<(&str, &ExecutableStartEvent)> {
        self.start_events
            .iter()
            .filter_map(|id| {
                self.elements
                    .get(id)
                    .and_then(ExecutableElement::as_start_event)
                    .map(|start| (id.as_str(), start))
            })
            .collect()
    }

    /// Top-level message start events with their bound message names
    pub fn message_start_events(&self) -> Vec<(&str, &str)> {
        self.start_events()
            .into_iter()
            .filter_map(|(id, start)| {
                start
                    .message
                    .as_ref()
                    .and_then(ExecutableMessage::message_name)
                    .map(|name| (id, name))
            })
            .collect()
    }

    pub fn has_message_start_event(&self) -> bool {
        !self.message_start_events().is_empty()
    }
}
