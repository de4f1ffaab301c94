//! Deployment lifecycle
//!
//! CREATE is versioned on the deployment partition, which writes CREATED and
//! then distributes the deployment to every other partition. Each partition
//! handles CREATED the same way: the previous message start event
//! subscriptions of a process are closed and those of the new latest
//! version are opened.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::model::{ExecutableWorkflow, WorkflowTransformer};
use crate::processing::{ProcessingResult, RecordProcessor};
use crate::state::{checksum, KeyGenerator, PartitionState};
use crate::types::{
    DeploymentIntent, DeploymentRecord, DeploymentResource, Intent, LogEntry,
    MessageStartEventSubscriptionIntent, MessageStartEventSubscriptionRecord, PartitionId, Record,
    RecordValue, RejectionType, WorkflowRecord,
};

const NO_RESOURCES_MESSAGE: &str = "Expected to deploy at least one resource, but none given";
const INVALID_RESOURCES_MESSAGE: &str =
    "Expected to deploy new resources, but encountered the following errors:";

fn deployment_intent(intent: DeploymentIntent) -> Intent {
    Intent::Deployment(intent)
}

fn subscription_intent(intent: MessageStartEventSubscriptionIntent) -> Intent {
    Intent::MessageStartEventSubscription(intent)
}

/// Put the workflows of the CREATED record written for `record` into state
fn apply_created(
    result: &ProcessingResult,
    state: &mut PartitionState,
    transformer: &WorkflowTransformer,
) {
    let created = result
        .follow_ups()
        .iter()
        .filter(|entry| entry.intent == deployment_intent(DeploymentIntent::Created));

    for entry in created {
        let RecordValue::Deployment(deployment) = &entry.value else {
            continue;
        };
        match state.workflows.put_deployment(deployment, transformer) {
            Ok(added) => debug!(deployment_key = entry.key, added, "Stored deployed workflows"),
            Err(e) => error!(
                deployment_key = entry.key,
                error = %e,
                "Failed to store deployed workflows"
            ),
        }
    }
}

/* ===================== Create ===================== */

/// Versions a new deployment; runs on the deployment partition only
pub struct DeploymentCreateProcessor {
    transformer: Arc<WorkflowTransformer>,
}

impl DeploymentCreateProcessor {
    pub fn new(transformer: Arc<WorkflowTransformer>) -> Self {
        Self { transformer }
    }

    fn transform<'r>(
        &self,
        resources: &'r [DeploymentResource],
    ) -> Result<Vec<(&'r DeploymentResource, Vec<ExecutableWorkflow>)>, Vec<String>> {
        let mut errors = Vec::new();
        let mut transformed = Vec::new();

        for resource in resources {
            match self.transformer.transform(resource.resource.as_bytes()) {
                Ok(workflows) => transformed.push((resource, workflows)),
                Err(e) => errors.push(format!("'{}': {}", resource.resource_name, e)),
            }
        }

        let mut seen: HashMap<&str, &str> = HashMap::new();
        for (resource, workflows) in &transformed {
            for workflow in workflows {
                if let Some(first) =
                    seen.insert(workflow.bpmn_process_id(), resource.resource_name.as_str())
                {
                    errors.push(format!(
                        "Duplicated process id '{}' in resources '{}' and '{}'",
                        workflow.bpmn_process_id(),
                        first,
                        resource.resource_name
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(transformed)
        } else {
            Err(errors)
        }
    }
}

impl RecordProcessor for DeploymentCreateProcessor {
    fn process_record(
        &self,
        record: &Record,
        state: &PartitionState,
        keys: &mut KeyGenerator,
        result: &mut ProcessingResult,
    ) {
        let Some(deployment) = record.deployment() else {
            return;
        };

        if deployment.resources.is_empty() {
            result.write_rejection(record, RejectionType::InvalidArgument, NO_RESOURCES_MESSAGE);
            return;
        }

        let transformed = match self.transform(&deployment.resources) {
            Ok(transformed) => transformed,
            Err(errors) => {
                debug!(errors = errors.len(), "Rejecting deployment");
                result.write_rejection(
                    record,
                    RejectionType::InvalidArgument,
                    format!("{}\n{}", INVALID_RESOURCES_MESSAGE, errors.join("\n")),
                );
                return;
            }
        };

        let deployment_key = keys.next_key();
        let mut workflows = Vec::new();

        for (resource, executables) in &transformed {
            let checksum = checksum(&resource.resource);

            for executable in executables {
                let bpmn_process_id = executable.bpmn_process_id();
                let latest = state.workflows.latest_version(bpmn_process_id);

                let (key, version) = match latest {
                    Some(latest) if latest.checksum == checksum => (latest.key, latest.version),
                    latest => (keys.next_key(), latest.map_or(1, |l| l.version + 1)),
                };

                workflows.push(WorkflowRecord {
                    bpmn_process_id: bpmn_process_id.to_string(),
                    version,
                    key,
                    resource_name: resource.resource_name.clone(),
                    checksum: checksum.clone(),
                });
            }
        }

        info!(
            deployment_key,
            workflows = workflows.len(),
            "Deployment created"
        );

        let created = result
            .write_follow_up_event(
                deployment_key,
                deployment_intent(DeploymentIntent::Created),
                RecordValue::Deployment(DeploymentRecord {
                    resources: deployment.resources.clone(),
                    workflows,
                }),
            )
            .clone();
        result.respond(record, created);
    }

    fn update_state(
        &self,
        _record: &Record,
        result: &ProcessingResult,
        state: &mut PartitionState,
    ) {
        apply_created(result, state, &self.transformer);
    }
}

/* ===================== Created ===================== */

/// Moves message start event subscriptions to the latest workflow versions
pub struct DeploymentCreatedProcessor {
    is_deployment_partition: bool,
}

impl DeploymentCreatedProcessor {
    pub fn new(is_deployment_partition: bool) -> Self {
        Self {
            is_deployment_partition,
        }
    }

    fn is_latest_workflow(state: &PartitionState, workflow: &WorkflowRecord) -> bool {
        state
            .workflows
            .latest_version(&workflow.bpmn_process_id)
            .is_some_and(|latest| latest.version == workflow.version)
    }

    fn close_existing_subscriptions(
        state: &PartitionState,
        workflow: &WorkflowRecord,
        result: &mut ProcessingResult,
    ) {
        for version in (1..workflow.version).rev() {
            let Some(previous) = state
                .workflows
                .workflow_by_process_id_and_version(&workflow.bpmn_process_id, version)
            else {
                continue;
            };

            if previous.workflow.has_message_start_event() {
                result.append_follow_up_command(
                    -1,
                    subscription_intent(MessageStartEventSubscriptionIntent::Close),
                    RecordValue::MessageStartEventSubscription(MessageStartEventSubscriptionRecord {
                        workflow_key: previous.key,
                        ..Default::default()
                    }),
                );
                return;
            }
        }
    }

    fn open_subscriptions(
        state: &PartitionState,
        workflow: &WorkflowRecord,
        result: &mut ProcessingResult,
    ) {
        let Some(deployed) = state.workflows.workflow_by_key(workflow.key) else {
            return;
        };

        for (start_event_id, message_name) in deployed.workflow.message_start_events() {
            result.append_follow_up_command(
                -1,
                subscription_intent(MessageStartEventSubscriptionIntent::Open),
                RecordValue::MessageStartEventSubscription(MessageStartEventSubscriptionRecord {
                    workflow_key: workflow.key,
                    bpmn_process_id: deployed.workflow.bpmn_process_id().to_string(),
                    start_event_id: start_event_id.to_string(),
                    message_name: message_name.to_string(),
                }),
            );
        }
    }
}

impl RecordProcessor for DeploymentCreatedProcessor {
    fn process_record(
        &self,
        record: &Record,
        state: &PartitionState,
        _keys: &mut KeyGenerator,
        result: &mut ProcessingResult,
    ) {
        let Some(deployment) = record.deployment() else {
            return;
        };

        if self.is_deployment_partition {
            result.append_follow_up_command(
                record.key,
                deployment_intent(DeploymentIntent::Distribute),
                record.value.clone(),
            );
        }

        for workflow in &deployment.workflows {
            if Self::is_latest_workflow(state, workflow) {
                Self::close_existing_subscriptions(state, workflow, result);
                Self::open_subscriptions(state, workflow, result);
            }
        }
    }
}

/* ===================== Distribute ===================== */

/// Sends a created deployment to every other partition
pub struct DeploymentDistributeProcessor {
    partitions: Vec<PartitionId>,
}

impl DeploymentDistributeProcessor {
    pub fn new(partitions: Vec<PartitionId>) -> Self {
        Self { partitions }
    }
}

impl RecordProcessor for DeploymentDistributeProcessor {
    fn process_record(
        &self,
        record: &Record,
        _state: &PartitionState,
        _keys: &mut KeyGenerator,
        result: &mut ProcessingResult,
    ) {
        result.write_follow_up_event(
            record.key,
            deployment_intent(DeploymentIntent::Distributed),
            record.value.clone(),
        );

        for partition_id in &self.partitions {
            let command = LogEntry::command(
                deployment_intent(DeploymentIntent::Distribute),
                record.value.clone(),
            )
            .with_key(record.key);
            result.forward(*partition_id, command);
        }

        info!(
            deployment_key = record.key,
            partitions = ?self.partitions,
            "Distributing deployment"
        );
    }
}

/// Takes over a deployment distributed by the deployment partition
pub struct DeploymentReceiveProcessor {
    transformer: Arc<WorkflowTransformer>,
}

impl DeploymentReceiveProcessor {
    pub fn new(transformer: Arc<WorkflowTransformer>) -> Self {
        Self { transformer }
    }
}

impl RecordProcessor for DeploymentReceiveProcessor {
    fn process_record(
        &self,
        record: &Record,
        state: &PartitionState,
        _keys: &mut KeyGenerator,
        result: &mut ProcessingResult,
    ) {
        let Some(deployment) = record.deployment() else {
            return;
        };

        if deployment
            .workflows
            .iter()
            .all(|workflow| state.workflows.contains(workflow.key))
        {
            debug!(deployment_key = record.key, "Ignoring already received deployment");
            return;
        }

        for resource in &deployment.resources {
            if let Err(e) = self.transformer.transform(resource.resource.as_bytes()) {
                error!(
                    deployment_key = record.key,
                    resource = %resource.resource_name,
                    error = %e,
                    "Failed to transform distributed resource"
                );
                return;
            }
        }

        result.write_follow_up_event(
            record.key,
            deployment_intent(DeploymentIntent::Created),
            record.value.clone(),
        );
    }

    fn update_state(
        &self,
        _record: &Record,
        result: &ProcessingResult,
        state: &mut PartitionState,
    ) {
        apply_created(result, state, &self.transformer);
    }
}
