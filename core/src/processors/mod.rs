//! Processors for deployments, messages and message start event subscriptions

mod deployment;
mod message;
mod subscription;


use std::sync::Arc;

use crate::model::WorkflowTransformer;
use crate::processing::RecordProcessors;
use crate::types::{
    DeploymentIntent, Intent, MessageIntent, MessageStartEventSubscriptionIntent, PartitionId,
    RecordType,
};

pub use deployment::{
    DeploymentCreateProcessor, DeploymentCreatedProcessor, DeploymentDistributeProcessor,
    DeploymentReceiveProcessor,
};
pub use message::PublishMessageProcessor;
pub use subscription::{CloseSubscriptionProcessor, OpenSubscriptionProcessor};

/// Where a partition sits in the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTopology {
    pub partition_id: PartitionId,
    /// The partition that versions deployments and distributes them
    pub deployment_partition: PartitionId,
    pub partition_ids: Vec<PartitionId>,
}

impl PartitionTopology {
    pub fn new(
        partition_id: PartitionId,
        deployment_partition: PartitionId,
        partition_count: u32,
    ) -> Self {
        Self {
            partition_id,
            deployment_partition,
            partition_ids: (1..=partition_count).collect(),
        }
    }

    pub fn is_deployment_partition(&self) -> bool {
        self.partition_id == self.deployment_partition
    }

    /// All partitions except this one
    pub fn other_partitions(&self) -> Vec<PartitionId> {
        self.partition_ids
            .iter()
            .copied()
            .filter(|id| *id != self.partition_id)
            .collect()
    }
}

/// The processors one partition runs
pub fn register_processors(
    topology: &PartitionTopology,
    transformer: Arc<WorkflowTransformer>,
) -> RecordProcessors {
    let mut processors = RecordProcessors::new();

    if topology.is_deployment_partition() {
        processors
            .register(
                RecordType::Command,
                Intent::Deployment(DeploymentIntent::Create),
                DeploymentCreateProcessor::new(transformer.clone()),
            )
            .register(
                RecordType::Command,
                Intent::Deployment(DeploymentIntent::Distribute),
                DeploymentDistributeProcessor::new(topology.other_partitions()),
            );
    } else {
        processors.register(
            RecordType::Command,
            Intent::Deployment(DeploymentIntent::Distribute),
            DeploymentReceiveProcessor::new(transformer),
        );
    }

    processors
        .register(
            RecordType::Event,
            Intent::Deployment(DeploymentIntent::Created),
            DeploymentCreatedProcessor::new(topology.is_deployment_partition()),
        )
        .register(
            RecordType::Command,
            Intent::Message(MessageIntent::Publish),
            PublishMessageProcessor,
        )
        .register(
            RecordType::Command,
            Intent::MessageStartEventSubscription(MessageStartEventSubscriptionIntent::Open),
            OpenSubscriptionProcessor,
        )
        .register(
            RecordType::Command,
            Intent::MessageStartEventSubscription(MessageStartEventSubscriptionIntent::Close),
            CloseSubscriptionProcessor,
        );

    processors
}
