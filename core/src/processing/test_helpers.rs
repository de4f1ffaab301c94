//! Test harness for partitions and their processors

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::el::FeelExpressionLanguage;
use crate::log::LogStream;
use crate::model::WorkflowTransformer;
use crate::processors::{register_processors, PartitionTopology};
use crate::state::{PartitionState, StateSnapshot};
use crate::types::{
    DeploymentIntent, DeploymentRecord, DeploymentResource, Intent, LogEntry, MessageIntent,
    MessageRecord, PartitionId, Position, Record, RecordType, RecordValue, RequestMetadata,
};

use super::{CommandRouter, ResponseChannel, SideEffectError, SideEffects, StreamProcessor};

pub(crate) const DEPLOYMENT_PARTITION: PartitionId = 1;

// ============================================================================
// Resources
// ============================================================================

/// A process with one message start event per `(start event id, message name)`
pub(crate) fn message_start_workflow(process_id: &str, start_events: &[(&str, &str)]) -> String {
    let mut elements: Vec<Value> = start_events
        .iter()
        .map(|(id, name)| json!({ "id": id, "type": "startEvent", "message": { "name": name } }))
        .collect();
    elements.push(json!({ "id": "end", "type": "endEvent" }));

    json!({ "processes": [{ "id": process_id, "elements": elements }] }).to_string()
}

/// A process with a plain start event; `marker` makes the checksum differ
pub(crate) fn plain_workflow(process_id: &str, marker: &str) -> String {
    json!({
        "processes": [{
            "id": process_id,
            "name": marker,
            "elements": [
                { "id": "start", "type": "startEvent" },
                { "id": "end", "type": "endEvent" }
            ],
            "sequenceFlows": [{ "id": "f1", "source": "start", "target": "end" }]
        }]
    })
    .to_string()
}

pub(crate) fn transformer() -> Arc<WorkflowTransformer> {
    Arc::new(WorkflowTransformer::new(Arc::new(FeelExpressionLanguage)))
}

pub(crate) fn create_deployment(resources: &[(&str, String)]) -> LogEntry {
    LogEntry::command(
        Intent::Deployment(DeploymentIntent::Create),
        RecordValue::Deployment(DeploymentRecord {
            resources: resources
                .iter()
                .map(|(name, resource)| DeploymentResource {
                    resource_name: name.to_string(),
                    resource: resource.clone(),
                })
                .collect(),
            workflows: Vec::new(),
        }),
    )
    .with_request(RequestMetadata::new())
}

pub(crate) fn publish_message(name: &str, correlation_key: &str) -> LogEntry {
    LogEntry::command(
        Intent::Message(MessageIntent::Publish),
        RecordValue::Message(MessageRecord {
            name: name.to_string(),
            correlation_key: correlation_key.to_string(),
            payload: b"{}".to_vec(),
        }),
    )
    .with_request(RequestMetadata::new())
}

// ============================================================================
// Side Effects
// ============================================================================

#[derive(Clone, Default)]
pub(crate) struct Recorded {
    pub responses: Arc<Mutex<Vec<(RequestMetadata, LogEntry)>>>,
    pub forwards: Arc<Mutex<Vec<(PartitionId, LogEntry)>>>,
    /// Number of upcoming side effects that fail
    pub failures: Arc<Mutex<u32>>,
    /// Number of upcoming forwards that fail
    pub forward_failures: Arc<Mutex<u32>>,
    pub attempts: Arc<Mutex<u32>>,
}

impl Recorded {
    fn fail(&self) -> bool {
        *self.attempts.lock().unwrap() += 1;
        Self::take_failure(&self.failures)
    }

    fn take_failure(counter: &Mutex<u32>) -> bool {
        let mut failures = counter.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            true
        } else {
            false
        }
    }
}

impl ResponseChannel for Recorded {
    fn respond(
        &mut self,
        request: RequestMetadata,
        response: &LogEntry,
    ) -> Result<(), SideEffectError> {
        if self.fail() {
            return Err(SideEffectError::ResponseDropped(request.request_id));
        }
        self.responses.lock().unwrap().push((request, response.clone()));
        Ok(())
    }
}

impl CommandRouter for Recorded {
    fn send(
        &mut self,
        partition_id: PartitionId,
        command: LogEntry,
    ) -> Result<(), SideEffectError> {
        if self.fail() || Self::take_failure(&self.forward_failures) {
            return Err(SideEffectError::PartitionUnreachable(partition_id));
        }
        self.forwards.lock().unwrap().push((partition_id, command));
        Ok(())
    }
}

// ============================================================================
// Test Partition
// ============================================================================

pub(crate) struct TestPartition {
    pub processor: StreamProcessor,
    pub recorded: Recorded,
}

impl TestPartition {
    pub fn new(partition_id: PartitionId, partition_count: u32) -> Self {
        Self::with_log(LogStream::new(partition_id), partition_count)
    }

    /// Partition over an existing log, nothing processed yet
    pub fn with_log(log: LogStream, partition_count: u32) -> Self {
        let recorded = Recorded::default();
        let topology =
            PartitionTopology::new(log.partition_id(), DEPLOYMENT_PARTITION, partition_count);
        let processor = StreamProcessor::new(
            log,
            register_processors(&topology, transformer()),
            SideEffects::new(Box::new(recorded.clone()), Box::new(recorded.clone())),
        );

        Self {
            processor,
            recorded,
        }
    }

    /// Partition continuing from `snapshot`; `recover` still has to run
    pub fn from_snapshot(log: LogStream, snapshot: StateSnapshot, partition_count: u32) -> Self {
        let recorded = Recorded::default();
        let topology =
            PartitionTopology::new(log.partition_id(), DEPLOYMENT_PARTITION, partition_count);
        let transformer = transformer();
        let processor = StreamProcessor::from_snapshot(
            log,
            snapshot,
            &transformer,
            register_processors(&topology, transformer.clone()),
            SideEffects::new(Box::new(recorded.clone()), Box::new(recorded.clone())),
        )
        .expect("snapshot restores");

        Self {
            processor,
            recorded,
        }
    }

    pub fn append(&mut self, command: LogEntry) -> Position {
        self.processor.append_command(command).expect("log accepts command")
    }

    /// Append a command and process everything it leads to on this partition
    pub fn execute(&mut self, command: LogEntry) -> Position {
        let position = self.append(command);
        self.process();
        position
    }

    pub fn process(&mut self) -> usize {
        self.processor.process_until_idle().expect("processing succeeds")
    }

    pub fn state(&self) -> &PartitionState {
        self.processor.state()
    }

    pub fn records(&self) -> &[Record] {
        self.processor.log().records()
    }

    pub fn records_with(&self, record_type: RecordType, intent: Intent) -> Vec<&Record> {
        self.records()
            .iter()
            .filter(|r| r.record_type == record_type && r.intent == intent)
            .collect()
    }

    pub fn responses(&self) -> Vec<(RequestMetadata, LogEntry)> {
        self.recorded.responses.lock().unwrap().clone()
    }

    /// Forwarded commands, removed from the recording
    pub fn take_forwards(&self) -> Vec<(PartitionId, LogEntry)> {
        std::mem::take(&mut *self.recorded.forwards.lock().unwrap())
    }
}

// ============================================================================
// Test Cluster
// ============================================================================

pub(crate) struct TestCluster {
    pub partitions: Vec<TestPartition>,
}

impl TestCluster {
    pub fn new(partition_count: u32) -> Self {
        Self {
            partitions: (1..=partition_count)
                .map(|id| TestPartition::new(id, partition_count))
                .collect(),
        }
    }

    pub fn partition(&mut self, partition_id: PartitionId) -> &mut TestPartition {
        &mut self.partitions[(partition_id - 1) as usize]
    }

    /// Append to one partition, then process and deliver forwards until quiet
    pub fn execute(&mut self, partition_id: PartitionId, command: LogEntry) -> Position {
        let position = self.partition(partition_id).append(command);
        self.run();
        position
    }

    pub fn run(&mut self) {
        loop {
            let mut forwards = Vec::new();
            for partition in &mut self.partitions {
                partition.process();
                forwards.extend(partition.take_forwards());
            }
            if forwards.is_empty() {
                break;
            }
            for (partition_id, command) in forwards {
                self.partition(partition_id).append(command);
            }
        }
    }
}
