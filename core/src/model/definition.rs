//! Workflow description resources
//!
//! A deployment resource is a JSON document describing one or more
//! processes. Attribute values that may be expressions are kept as raw text
//! here; validation and transformation decide how to read them.
//!
//! ```json
//! {
//!   "processes": [{
//!     "id": "order-process",
//!     "elements": [
//!       { "id": "start", "type": "startEvent", "message": { "name": "order-created" } },
//!       { "id": "pay", "type": "serviceTask", "taskDefinition": { "type": "payment" } },
//!       { "id": "end", "type": "endEvent" }
//!     ],
//!     "sequenceFlows": [
//!       { "id": "f1", "source": "start", "target": "pay" },
//!       { "id": "f2", "source": "pay", "target": "end" }
//!     ]
//!   }]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Root of a workflow resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definitions {
    pub processes: Vec<Process>,
}

impl Definitions {
    pub fn from_json(resource: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(resource)
    }

    /// Processes marked executable; only those are deployed
    pub fn executable_processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.iter().filter(|p| p.executable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub executable: bool,
    #[serde(default)]
    pub elements: Vec<FlowNode>,
    #[serde(default)]
    pub sequence_flows: Vec<SequenceFlow>,
}

impl Process {
    /// Every flow node of the process, including those nested in sub-processes
    pub fn flow_nodes(&self) -> Vec<&FlowNode> {
        let mut nodes = Vec::new();
        collect_flow_nodes(&self.elements, &mut nodes);
        nodes
    }

    /// Every sequence flow of the process, including nested ones
    pub fn all_sequence_flows(&self) -> Vec<&SequenceFlow> {
        let mut flows: Vec<&SequenceFlow> = self.sequence_flows.iter().collect();
        for node in self.flow_nodes() {
            if let FlowNodeKind::SubProcess(sub) = &node.kind {
                flows.extend(sub.sequence_flows.iter());
            }
        }
        flows
    }
}

fn collect_flow_nodes<'a>(elements: &'a [FlowNode], out: &mut Vec<&'a FlowNode>) {
    for element in elements {
        out.push(element);
        if let FlowNodeKind::SubProcess(sub) = &element.kind {
            collect_flow_nodes(&sub.elements, out);
        }
    }
}

/* ===================== Flow Nodes ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<Mapping>,
    #[serde(default)]
    pub outputs: Vec<Mapping>,
    #[serde(flatten)]
    pub kind: FlowNodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlowNodeKind {
    StartEvent(StartEvent),
    EndEvent,
    ServiceTask(ServiceTask),
    ReceiveTask(ReceiveTask),
    IntermediateCatchEvent(CatchEvent),
    ExclusiveGateway(ExclusiveGateway),
    SubProcess(SubProcess),
    CallActivity(CallActivity),
}

impl FlowNodeKind {
    /// Element type name used in logs and validation output
    pub fn type_name(&self) -> &'static str {
        match self {
            FlowNodeKind::StartEvent(_) => "StartEvent",
            FlowNodeKind::EndEvent => "EndEvent",
            FlowNodeKind::ServiceTask(_) => "ServiceTask",
            FlowNodeKind::ReceiveTask(_) => "ReceiveTask",
            FlowNodeKind::IntermediateCatchEvent(_) => "IntermediateCatchEvent",
            FlowNodeKind::ExclusiveGateway(_) => "ExclusiveGateway",
            FlowNodeKind::SubProcess(_) => "SubProcess",
            FlowNodeKind::CallActivity(_) => "CallActivity",
        }
    }

    /// Message definition of a message catching element
    pub fn message(&self) -> Option<&MessageDefinition> {
        match self {
            FlowNodeKind::StartEvent(start) => start.message.as_ref(),
            FlowNodeKind::ReceiveTask(task) => Some(&task.message),
            FlowNodeKind::IntermediateCatchEvent(catch) => catch.message.as_ref(),
            _ => None,
        }
    }

    pub fn timer(&self) -> Option<&TimerDefinition> {
        match self {
            FlowNodeKind::StartEvent(start) => start.timer.as_ref(),
            FlowNodeKind::IntermediateCatchEvent(catch) => catch.timer.as_ref(),
            _ => None,
        }
    }

    pub fn multi_instance(&self) -> Option<&MultiInstance> {
        match self {
            FlowNodeKind::ServiceTask(task) => task.multi_instance.as_ref(),
            FlowNodeKind::SubProcess(sub) => sub.multi_instance.as_ref(),
            FlowNodeKind::CallActivity(call) => call.multi_instance.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartEvent {
    #[serde(default = "default_true")]
    pub interrupting: bool,
    #[serde(default)]
    pub message: Option<MessageDefinition>,
    #[serde(default)]
    pub timer: Option<TimerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTask {
    pub task_definition: TaskDefinition,
    #[serde(default)]
    pub multi_instance: Option<MultiInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveTask {
    pub message: MessageDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchEvent {
    #[serde(default)]
    pub message: Option<MessageDefinition>,
    #[serde(default)]
    pub timer: Option<TimerDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusiveGateway {
    #[serde(default)]
    pub default_flow: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubProcess {
    #[serde(default)]
    pub elements: Vec<FlowNode>,
    #[serde(default)]
    pub sequence_flows: Vec<SequenceFlow>,
    #[serde(default)]
    pub multi_instance: Option<MultiInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallActivity {
    pub process_id: String,
    #[serde(default)]
    pub multi_instance: Option<MultiInstance>,
}

/* ===================== Attributes ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub correlation_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerDefinition {
    #[serde(default)]
    pub cycle: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub retries: Option<String>,
}

/// Input or output variable mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiInstance {
    #[serde(default)]
    pub sequential: bool,
    #[serde(default)]
    pub input_collection: Option<String>,
    #[serde(default)]
    pub input_element: Option<String>,
    #[serde(default)]
    pub output_collection: Option<String>,
    #[serde(default)]
    pub output_element: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceFlow {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub condition: Option<String>,
}

fn default_true() -> bool {
    true
}
