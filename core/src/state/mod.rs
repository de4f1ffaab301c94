//! Materialized state of one partition
//!
//! State is only ever changed by the `update_state` phase of a processor, so
//! replaying the log from a snapshot rebuilds it exactly.

pub mod keys;
pub mod message;
pub mod subscription;
pub mod workflow;

use serde::{Deserialize, Serialize};

use crate::model::{TransformError, WorkflowTransformer};
use crate::types::{MessageStartEventSubscriptionRecord, PartitionId, Position};

pub use keys::KeyGenerator;
pub use message::{MessageEntry, MessageState};
pub use subscription::SubscriptionState;
pub use workflow::{checksum, DeployedWorkflow, PersistedWorkflow, WorkflowState};

#[derive(Debug)]
pub struct PartitionState {
    partition_id: PartitionId,
    pub workflows: WorkflowState,
    pub messages: MessageState,
    pub subscriptions: SubscriptionState,
}

impl PartitionState {
    pub fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            workflows: WorkflowState::new(),
            messages: MessageState::new(),
            subscriptions: SubscriptionState::new(),
        }
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    /// Capture state and key generator as of `position`
    pub fn snapshot(&self, position: Position, keys: &KeyGenerator) -> StateSnapshot {
        StateSnapshot {
            partition_id: self.partition_id,
            position,
            keys: keys.clone(),
            workflows: self.workflows.persisted(),
            messages: self.messages.messages().cloned().collect(),
            subscriptions: self.subscriptions.subscriptions().cloned().collect(),
        }
    }

    /// Rebuild state from a snapshot; workflows are transformed again
    pub fn restore(
        snapshot: StateSnapshot,
        transformer: &WorkflowTransformer,
    ) -> Result<(Self, KeyGenerator, Position), TransformError> {
        let state = Self {
            partition_id: snapshot.partition_id,
            workflows: WorkflowState::restore(snapshot.workflows, transformer)?,
            messages: MessageState::from_entries(snapshot.messages),
            subscriptions: SubscriptionState::from_subscriptions(snapshot.subscriptions),
        };
        Ok((state, snapshot.keys, snapshot.position))
    }
}

/// Serializable copy of a partition's state at a log position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub partition_id: PartitionId,
    /// Last log position reflected in the snapshot
    pub position: Position,
    pub keys: KeyGenerator,
    pub workflows: Vec<PersistedWorkflow>,
    pub messages: Vec<MessageEntry>,
    pub subscriptions: Vec<MessageStartEventSubscriptionRecord>,
}

impl StateSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
