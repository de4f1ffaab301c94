//! Deployed workflows of one partition, by key and by (process id, version)

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use crate::model::{ExecutableWorkflow, TransformError, WorkflowTransformer};
use crate::types::{DeploymentRecord, Key, WorkflowRecord};

/// Hex-encoded SHA-256 of a workflow resource
pub fn checksum(resource: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(resource.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A workflow as stored, enough to rebuild the executable after a restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWorkflow {
    pub key: Key,
    pub version: i32,
    pub bpmn_process_id: String,
    pub resource_name: String,
    pub checksum: String,
    pub resource: String,
}

#[derive(Debug)]
pub struct DeployedWorkflow {
    pub key: Key,
    pub version: i32,
    pub bpmn_process_id: String,
    pub resource_name: String,
    pub checksum: String,
    pub workflow: Arc<ExecutableWorkflow>,
    resource: String,
}

impl DeployedWorkflow {
    fn persisted(&self) -> PersistedWorkflow {
        PersistedWorkflow {
            key: self.key,
            version: self.version,
            bpmn_process_id: self.bpmn_process_id.clone(),
            resource_name: self.resource_name.clone(),
            checksum: self.checksum.clone(),
            resource: self.resource.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct WorkflowState {
    by_key: BTreeMap<Key, Arc<DeployedWorkflow>>,
    versions: HashMap<String, BTreeMap<i32, Key>>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store every workflow of a deployment that isn't known yet
    ///
    /// Workflows are transformed from the resources carried in the record.
    /// Already known keys are skipped, so re-applying a deployment is a no-op.
    pub fn put_deployment(
        &mut self,
        deployment: &DeploymentRecord,
        transformer: &WorkflowTransformer,
    ) -> Result<usize, TransformError> {
        let mut transformed: HashMap<&str, Vec<ExecutableWorkflow>> = HashMap::new();
        let mut added = 0;

        for record in &deployment.workflows {
            if self.by_key.contains_key(&record.key) {
                continue;
            }

            let Some(resource) = deployment.resource(&record.resource_name) else {
                error!(
                    workflow_key = record.key,
                    resource = %record.resource_name,
                    "Deployment lacks the resource of a workflow"
                );
                continue;
            };

            if !transformed.contains_key(record.resource_name.as_str()) {
                let workflows = transformer.transform(resource.resource.as_bytes())?;
                transformed.insert(record.resource_name.as_str(), workflows);
            }

            let executable = transformed
                .get(record.resource_name.as_str())
                .and_then(|workflows| {
                    workflows
                        .iter()
                        .find(|w| w.bpmn_process_id() == record.bpmn_process_id)
                })
                .cloned()
                .ok_or_else(|| TransformError::MissingElement(record.bpmn_process_id.clone()))?;

            self.insert(record, resource.resource.clone(), executable);
            added += 1;
        }

        Ok(added)
    }

    fn insert(&mut self, record: &WorkflowRecord, resource: String, workflow: ExecutableWorkflow) {
        debug!(
            key = record.key,
            bpmn_process_id = %record.bpmn_process_id,
            version = record.version,
            "Storing workflow"
        );

        self.versions
            .entry(record.bpmn_process_id.clone())
            .or_default()
            .insert(record.version, record.key);

        self.by_key.insert(
            record.key,
            Arc::new(DeployedWorkflow {
                key: record.key,
                version: record.version,
                bpmn_process_id: record.bpmn_process_id.clone(),
                resource_name: record.resource_name.clone(),
                checksum: record.checksum.clone(),
                workflow: Arc::new(workflow),
                resource,
            }),
        );
    }

    pub fn latest_version(&self, bpmn_process_id: &str) -> Option<Arc<DeployedWorkflow>> {
        self.versions
            .get(bpmn_process_id)
            .and_then(|versions| versions.values().next_back())
            .and_then(|key| self.by_key.get(key))
            .cloned()
    }

    pub fn workflow_by_process_id_and_version(
        &self,
        bpmn_process_id: &str,
        version: i32,
    ) -> Option<Arc<DeployedWorkflow>> {
        self.versions
            .get(bpmn_process_id)
            .and_then(|versions| versions.get(&version))
            .and_then(|key| self.by_key.get(key))
            .cloned()
    }

    pub fn workflow_by_key(&self, key: Key) -> Option<Arc<DeployedWorkflow>> {
        self.by_key.get(&key).cloned()
    }

    pub fn contains(&self, key: Key) -> bool {
        self.by_key.contains_key(&key)
    }

    /// All workflows ordered by key
    pub fn workflows(&self) -> Vec<Arc<DeployedWorkflow>> {
        self.by_key.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn persisted(&self) -> Vec<PersistedWorkflow> {
        self.by_key.values().map(|w| w.persisted()).collect()
    }

    /// Rebuild from persisted workflows, transforming each resource again
    pub fn restore(
        persisted: Vec<PersistedWorkflow>,
        transformer: &WorkflowTransformer,
    ) -> Result<Self, TransformError> {
        let mut state = Self::new();

        for workflow in persisted {
            let executable = transformer
                .transform(workflow.resource.as_bytes())?
                .into_iter()
                .find(|w| w.bpmn_process_id() == workflow.bpmn_process_id)
                .ok_or_else(|| TransformError::MissingElement(workflow.bpmn_process_id.clone()))?;

            let record = WorkflowRecord {
                bpmn_process_id: workflow.bpmn_process_id,
                version: workflow.version,
                key: workflow.key,
                resource_name: workflow.resource_name,
                checksum: workflow.checksum,
            };
            state.insert(&record, workflow.resource, executable);
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::el::FeelExpressionLanguage;
    use crate::types::DeploymentResource;
    use serde_json::json;

    fn transformer() -> WorkflowTransformer {
        WorkflowTransformer::new(Arc::new(FeelExpressionLanguage))
    }

    fn resource(message: &str) -> String {
        json!({
            "processes": [{
                "id": "order",
                "elements": [{ "id": "start", "type": "startEvent", "message": { "name": message } }]
            }]
        })
        .to_string()
    }

    fn deployment(key: Key, version: i32, resource: String) -> DeploymentRecord {
        DeploymentRecord {
            workflows: vec![WorkflowRecord {
                bpmn_process_id: "order".to_string(),
                version,
                key,
                resource_name: "order.json".to_string(),
                checksum: checksum(&resource),
            }],
            resources: vec![DeploymentResource {
                resource_name: "order.json".to_string(),
                resource,
            }],
        }
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        assert_eq!(
            checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_versions_and_lookups() {
        let mut state = WorkflowState::new();
        let transformer = transformer();

        state.put_deployment(&deployment(10, 1, resource("a")), &transformer).unwrap();
        state.put_deployment(&deployment(20, 2, resource("b")), &transformer).unwrap();

        let latest = state.latest_version("order").unwrap();
        assert_eq!((latest.key, latest.version), (20, 2));
        assert_eq!(latest.workflow.message_start_events(), vec![("start", "b")]);

        let first = state.workflow_by_process_id_and_version("order", 1).unwrap();
        assert_eq!(first.key, 10);
        assert!(state.workflow_by_key(20).is_some());
        assert!(state.workflow_by_process_id_and_version("order", 3).is_none());
        assert!(state.latest_version("other").is_none());
    }

    #[test]
    fn test_known_keys_are_skipped() {
        let mut state = WorkflowState::new();
        let transformer = transformer();
        let record = deployment(10, 1, resource("a"));

        assert_eq!(state.put_deployment(&record, &transformer).unwrap(), 1);
        assert_eq!(state.put_deployment(&record, &transformer).unwrap(), 0);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_restore_rebuilds_executables() {
        let mut state = WorkflowState::new();
        let transformer = transformer();
        state.put_deployment(&deployment(10, 1, resource("a")), &transformer).unwrap();

        let restored = WorkflowState::restore(state.persisted(), &transformer).unwrap();

        assert_eq!(restored.persisted(), state.persisted());
        let workflow = restored.workflow_by_key(10).unwrap();
        assert!(workflow.workflow.has_message_start_event());
    }
}
