//! In-process broker: partition actors plus the gateway clients talk to
//!
//! Every partition runs as its own tokio task and owns its log, state and
//! processors. Partitions only talk to each other through their command
//! channels.

mod partition;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::el::{ExpressionLanguage, FeelExpressionLanguage};
use crate::log::LogStream;
use crate::model::WorkflowTransformer;
use crate::processing::{SideEffects, StreamProcessor};
use crate::processors::{register_processors, PartitionTopology};
use crate::state::StateSnapshot;
use crate::types::{
    DeploymentIntent, DeploymentRecord, DeploymentResource, Intent, Key, LogEntry, MessageIntent,
    MessageRecord, PartitionId, RecordType, RecordValue, RejectionType, RequestMetadata,
};

use partition::{PartitionActor, PartitionCommand, PartitionRouter, PendingResponses};

pub use partition::{PartitionView, WorkflowView};

/// A command was rejected by the partition that processed it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command rejected ({rejection_type:?}): {reason}")]
pub struct CommandRejected {
    pub rejection_type: RejectionType,
    pub reason: String,
}

/// Partition a message is published on, derived from its correlation key
pub fn partition_for_correlation_key(correlation_key: &str, partition_count: u32) -> PartitionId {
    let digest = Sha256::digest(correlation_key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % u64::from(partition_count.max(1))) as PartitionId + 1
}

/* ===================== Builder ===================== */

pub struct BrokerBuilder {
    config: BrokerConfig,
    expression_language: Arc<dyn ExpressionLanguage>,
}

impl BrokerBuilder {
    pub fn new() -> Self {
        Self {
            config: BrokerConfig::default(),
            expression_language: Arc::new(FeelExpressionLanguage),
        }
    }

    pub fn config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn partition_count(mut self, count: u32) -> Self {
        self.config.partition_count = count;
        self
    }

    pub fn expression_language(mut self, language: Arc<dyn ExpressionLanguage>) -> Self {
        self.expression_language = language;
        self
    }

    /// Spawn one task per partition; needs a running tokio runtime
    pub fn start(self) -> Result<Broker> {
        let config = self.config;
        if config.partition_count == 0
            || config.deployment_partition == 0
            || config.deployment_partition > config.partition_count
        {
            return Err(anyhow!(
                "deployment partition {} is not one of {} partitions",
                config.deployment_partition,
                config.partition_count
            ));
        }

        let transformer = Arc::new(WorkflowTransformer::new(self.expression_language));
        let shutdown = CancellationToken::new();

        let mut senders = HashMap::new();
        let mut receivers = Vec::new();
        for partition_id in 1..=config.partition_count {
            let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
            senders.insert(partition_id, sender);
            receivers.push((partition_id, receiver));
        }
        let router = PartitionRouter::new(senders.clone());

        let mut handles = Vec::new();
        for (partition_id, receiver) in receivers {
            let topology = PartitionTopology::new(
                partition_id,
                config.deployment_partition,
                config.partition_count,
            );
            let responses = PendingResponses::default();
            let processor = StreamProcessor::new(
                LogStream::new(partition_id),
                register_processors(&topology, transformer.clone()),
                SideEffects::new(Box::new(responses.clone()), Box::new(router.clone())),
            )
            .with_side_effect_retries(config.side_effect_retries);

            let actor =
                PartitionActor::new(processor, responses, receiver, shutdown.child_token());
            handles.push(tokio::spawn(actor.run()));
        }

        info!(
            partitions = config.partition_count,
            deployment_partition = config.deployment_partition,
            "Broker started"
        );

        Ok(Broker {
            config,
            partitions: senders,
            handles,
            shutdown,
        })
    }
}

impl Default for BrokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/* ===================== Gateway ===================== */

pub struct Broker {
    config: BrokerConfig,
    partitions: HashMap<PartitionId, mpsc::Sender<PartitionCommand>>,
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Broker {
    pub fn builder() -> BrokerBuilder {
        BrokerBuilder::new()
    }

    pub fn partition_count(&self) -> u32 {
        self.config.partition_count
    }

    pub fn partition_ids(&self) -> Vec<PartitionId> {
        (1..=self.config.partition_count).collect()
    }

    fn sender(&self, partition_id: PartitionId) -> Result<&mpsc::Sender<PartitionCommand>> {
        self.partitions
            .get(&partition_id)
            .ok_or_else(|| anyhow!("Unknown partition {}", partition_id))
    }

    /// Send a client command and wait until the partition answers it
    async fn execute(&self, partition_id: PartitionId, command: LogEntry) -> Result<LogEntry> {
        let (respond_to, response) = oneshot::channel();
        self.sender(partition_id)?
            .send(PartitionCommand::Append {
                command: command.with_request(RequestMetadata::new()),
                respond_to,
            })
            .await
            .map_err(|_| anyhow!("Partition {} is not running", partition_id))?;

        let response = response
            .await
            .with_context(|| format!("Partition {} dropped the request", partition_id))?;

        if response.record_type == RecordType::CommandRejection {
            let rejection = response
                .rejection
                .ok_or_else(|| anyhow!("Rejection without a reason"))?;
            return Err(CommandRejected {
                rejection_type: rejection.rejection_type,
                reason: rejection.reason,
            }
            .into());
        }
        Ok(response)
    }

    /// Deploy resources; returns the created deployment with versions and keys
    pub async fn deploy(
        &self,
        resources: Vec<DeploymentResource>,
    ) -> Result<(Key, DeploymentRecord)> {
        let command = LogEntry::command(
            Intent::Deployment(DeploymentIntent::Create),
            RecordValue::Deployment(DeploymentRecord {
                resources,
                workflows: Vec::new(),
            }),
        );

        let response = self.execute(self.config.deployment_partition, command).await?;
        match response.value {
            RecordValue::Deployment(deployment) => Ok((response.key, deployment)),
            other => Err(anyhow!("Unexpected deployment response: {:?}", other)),
        }
    }

    /// Publish a message on the partition of its correlation key; returns its key
    pub async fn publish_message(
        &self,
        name: impl Into<String>,
        correlation_key: impl Into<String>,
        payload: Vec<u8>,
    ) -> Result<Key> {
        let message = MessageRecord {
            name: name.into(),
            correlation_key: correlation_key.into(),
            payload,
        };
        let partition_id =
            partition_for_correlation_key(&message.correlation_key, self.config.partition_count);

        let command = LogEntry::command(
            Intent::Message(MessageIntent::Publish),
            RecordValue::Message(message),
        );
        let response = self.execute(partition_id, command).await?;
        Ok(response.key)
    }

    pub async fn partition_view(&self, partition_id: PartitionId) -> Result<PartitionView> {
        let (respond_to, view) = oneshot::channel();
        self.sender(partition_id)?
            .send(PartitionCommand::Inspect(respond_to))
            .await
            .map_err(|_| anyhow!("Partition {} is not running", partition_id))?;
        view.await
            .with_context(|| format!("Partition {} didn't answer", partition_id))
    }

    pub async fn snapshot(&self, partition_id: PartitionId) -> Result<StateSnapshot> {
        let (respond_to, snapshot) = oneshot::channel();
        self.sender(partition_id)?
            .send(PartitionCommand::Snapshot(respond_to))
            .await
            .map_err(|_| anyhow!("Partition {} is not running", partition_id))?;
        snapshot
            .await
            .with_context(|| format!("Partition {} didn't answer", partition_id))
    }

    /// Stop all partitions after the commands already queued
    pub async fn shutdown(mut self) -> Result<()> {
        for (partition_id, sender) in &self.partitions {
            if sender.send(PartitionCommand::Shutdown).await.is_err() {
                warn!(partition_id, "Partition already stopped");
            }
        }

        for handle in std::mem::take(&mut self.handles) {
            handle.await.context("Partition task failed")?;
        }

        info!("Broker stopped");
        Ok(())
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
