use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the entity a record is about; generated per partition
pub type Key = i64;

/// Position of a record in its partition's log; starts at 1
pub type Position = u64;

pub type PartitionId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    Command,
    Event,
    CommandRejection,
}

/* ===================== Intents ===================== */

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentIntent {
    Create,
    Created,
    Distribute,
    Distributed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageIntent {
    Publish,
    Published,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStartEventSubscriptionIntent {
    Open,
    Opened,
    Close,
    Closed,
}

/// What a record says happened (event) or should happen (command)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "valueType", content = "intent", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Deployment(DeploymentIntent),
    Message(MessageIntent),
    MessageStartEventSubscription(MessageStartEventSubscriptionIntent),
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Deployment(intent) => write!(f, "DEPLOYMENT:{:?}", intent),
            Intent::Message(intent) => write!(f, "MESSAGE:{:?}", intent),
            Intent::MessageStartEventSubscription(intent) => {
                write!(f, "MESSAGE_START_EVENT_SUBSCRIPTION:{:?}", intent)
            }
        }
    }
}

/* ===================== Record Values ===================== */

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResource {
    pub resource_name: String,
    /// Workflow description (JSON)
    pub resource: String,
}

/// Metadata of one deployed workflow; assigned by the deployment partition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub bpmn_process_id: String,
    pub version: i32,
    pub key: Key,
    pub resource_name: String,
    /// SHA-256 of the resource, hex encoded
    pub checksum: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub resources: Vec<DeploymentResource>,
    #[serde(default)]
    pub workflows: Vec<WorkflowRecord>,
}

impl DeploymentRecord {
    pub fn resource(&self, resource_name: &str) -> Option<&DeploymentResource> {
        self.resources
            .iter()
            .find(|r| r.resource_name == resource_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub name: String,
    pub correlation_key: String,
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// Subscription of a workflow's message start event; `Close` only carries
/// the workflow key
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageStartEventSubscriptionRecord {
    pub workflow_key: Key,
    #[serde(default)]
    pub bpmn_process_id: String,
    #[serde(default)]
    pub start_event_id: String,
    #[serde(default)]
    pub message_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "valueType", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordValue {
    Deployment(DeploymentRecord),
    Message(MessageRecord),
    MessageStartEventSubscription(MessageStartEventSubscriptionRecord),
}

/* ===================== Records ===================== */

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionType {
    InvalidArgument,
    InvalidState,
    NotFound,
    AlreadyExists,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub rejection_type: RejectionType,
    pub reason: String,
}

/// Identifies the client request a command came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub request_id: Uuid,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
        }
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable entry of a partition's log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub key: Key,
    pub position: Position,
    /// Position of the command this record was written for
    pub source_position: Option<Position>,
    pub partition_id: PartitionId,
    pub record_type: RecordType,
    pub intent: Intent,
    pub value: RecordValue,
    pub request: Option<RequestMetadata>,
    pub rejection: Option<Rejection>,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    pub fn is_command(&self) -> bool {
        self.record_type == RecordType::Command
    }

    pub fn deployment(&self) -> Option<&DeploymentRecord> {
        match &self.value {
            RecordValue::Deployment(value) => Some(value),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&MessageRecord> {
        match &self.value {
            RecordValue::Message(value) => Some(value),
            _ => None,
        }
    }

    pub fn subscription(&self) -> Option<&MessageStartEventSubscriptionRecord> {
        match &self.value {
            RecordValue::MessageStartEventSubscription(value) => Some(value),
            _ => None,
        }
    }
}

/// A record before it is appended: the log assigns position, partition and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub key: Key,
    pub source_position: Option<Position>,
    pub record_type: RecordType,
    pub intent: Intent,
    pub value: RecordValue,
    pub request: Option<RequestMetadata>,
    pub rejection: Option<Rejection>,
}

impl LogEntry {
    /// A new command from a client or another partition; keys are assigned later
    pub fn command(intent: Intent, value: RecordValue) -> Self {
        Self {
            key: -1,
            source_position: None,
            record_type: RecordType::Command,
            intent,
            value,
            request: None,
            rejection: None,
        }
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.key = key;
        self
    }

    pub fn with_request(mut self, request: RequestMetadata) -> Self {
        self.request = Some(request);
        self
    }

    /// Whether `record` is what appending this entry produced
    pub fn matches(&self, record: &Record) -> bool {
        self.key == record.key
            && self.record_type == record.record_type
            && self.intent == record.intent
            && self.value == record.value
    }
}
