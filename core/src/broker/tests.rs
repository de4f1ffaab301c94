use super::*;
use crate::processing::test_helpers::{message_start_workflow, publish_message};
use crate::processing::{CommandRouter, SideEffectError};
use crate::state::keys::decode_partition_id;

use std::time::Duration;

use tokio_test::assert_ok;

// ============================================================================
// Helper Functions
// ============================================================================

fn resource(name: &str, resource: String) -> DeploymentResource {
    DeploymentResource {
        resource_name: name.to_string(),
        resource,
    }
}

fn start_broker(partitions: u32) -> Broker {
    Broker::builder()
        .partition_count(partitions)
        .start()
        .expect("broker starts")
}

/// Inspect a partition until it knows `count` workflows
async fn wait_for_workflows(
    broker: &Broker,
    partition_id: PartitionId,
    count: usize,
) -> PartitionView {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = broker.partition_view(partition_id).await.unwrap();
            if view.workflows.len() >= count {
                return view;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("partition received the deployment")
}

// ============================================================================
// Deployment
// ============================================================================

#[tokio::test]
async fn test_deployment_reaches_every_partition() {
    let broker = start_broker(3);

    let (_, deployment) = broker
        .deploy(vec![resource(
            "order.json",
            message_start_workflow("order", &[("start", "order-created")]),
        )])
        .await
        .unwrap();

    assert_eq!(deployment.workflows.len(), 1);
    let workflow = &deployment.workflows[0];
    assert_eq!(workflow.version, 1);
    assert_eq!(decode_partition_id(workflow.key), 1);

    for partition_id in broker.partition_ids() {
        let view = broker.partition_view(partition_id).await.unwrap();

        assert_eq!(view.workflows.len(), 1, "partition {}", partition_id);
        assert_eq!(view.workflows[0].key, workflow.key);
        assert_eq!(view.subscriptions.len(), 1, "partition {}", partition_id);
        assert_eq!(view.subscriptions[0].message_name, "order-created");
    }

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_deployment_is_an_error() {
    let broker = start_broker(2);

    let err = broker.deploy(Vec::new()).await.unwrap_err();

    let rejection = err.downcast_ref::<CommandRejected>().expect("a rejection");
    assert_eq!(rejection.rejection_type, RejectionType::InvalidArgument);
    assert!(broker.partition_view(2).await.unwrap().workflows.is_empty());

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_redeployment_moves_subscriptions() {
    let broker = start_broker(2);

    broker
        .deploy(vec![resource(
            "order.json",
            message_start_workflow("order", &[("start", "m1")]),
        )])
        .await
        .unwrap();
    let (_, second) = broker
        .deploy(vec![resource(
            "order.json",
            message_start_workflow("order", &[("start", "m2")]),
        )])
        .await
        .unwrap();
    assert_eq!(second.workflows[0].version, 2);

    for partition_id in broker.partition_ids() {
        let view = broker.partition_view(partition_id).await.unwrap();

        assert_eq!(view.workflows.len(), 2);
        assert_eq!(view.subscriptions.len(), 1);
        assert_eq!(view.subscriptions[0].workflow_key, second.workflows[0].key);
        assert_eq!(view.subscriptions[0].message_name, "m2");
    }

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deployment_reaches_busy_partition() {
    let config = BrokerConfig {
        partition_count: 2,
        channel_capacity: 1,
        ..BrokerConfig::default()
    };
    let broker = Broker::builder().config(config).start().unwrap();

    // fill partition 2's channel before its task ever runs
    let (respond_to, _view) = oneshot::channel();
    assert!(broker.partitions[&2]
        .try_send(PartitionCommand::Inspect(respond_to))
        .is_ok());

    broker
        .deploy(vec![resource(
            "order.json",
            message_start_workflow("order", &[("start", "order-created")]),
        )])
        .await
        .unwrap();

    let view = wait_for_workflows(&broker, 2, 1).await;
    assert_eq!(view.workflows.len(), 1);
    assert_eq!(view.subscriptions.len(), 1);

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_router_queues_commands_for_full_partition() {
    let (sender, mut receiver) = mpsc::channel(1);
    let mut router = PartitionRouter::new(HashMap::from([(2, sender)]));

    assert_ok!(router.send(2, publish_message("paid", "order-1")));
    assert_ok!(router.send(2, publish_message("paid", "order-2")));

    for expected in ["order-1", "order-2"] {
        match receiver.recv().await {
            Some(PartitionCommand::Forwarded(command)) => {
                let RecordValue::Message(message) = command.value else {
                    panic!("expected a message command");
                };
                assert_eq!(message.correlation_key, expected);
            }
            _ => panic!("expected a forwarded command"),
        }
    }
}

#[tokio::test]
async fn test_router_reports_stopped_partition() {
    let (sender, receiver) = mpsc::channel(1);
    let mut router = PartitionRouter::new(HashMap::from([(2, sender)]));
    drop(receiver);

    assert_eq!(
        router.send(2, publish_message("paid", "order-1")),
        Err(SideEffectError::PartitionUnreachable(2))
    );
    assert_eq!(
        router.send(3, publish_message("paid", "order-1")),
        Err(SideEffectError::PartitionUnreachable(3))
    );
}

// ============================================================================
// Messages
// ============================================================================

#[tokio::test]
async fn test_message_is_published_on_its_partition() {
    let broker = start_broker(3);

    let key = assert_ok!(broker.publish_message("paid", "order-1", b"{}".to_vec()).await);

    let partition_id = partition_for_correlation_key("order-1", 3);
    assert_eq!(decode_partition_id(key), partition_id);
    assert_eq!(broker.partition_view(partition_id).await.unwrap().messages, 1);

    let again = assert_ok!(broker.publish_message("paid", "order-1", b"{}".to_vec()).await);
    assert_ne!(again, key);
    assert_eq!(broker.partition_view(partition_id).await.unwrap().messages, 2);

    broker.shutdown().await.unwrap();
}

#[test]
fn test_correlation_key_partition_is_stable() {
    for count in 1..=5 {
        for key in ["order-1", "order-2", "", "ünïcode"] {
            let partition_id = partition_for_correlation_key(key, count);

            assert!((1..=count).contains(&partition_id));
            assert_eq!(partition_for_correlation_key(key, count), partition_id);
        }
    }
    assert_eq!(partition_for_correlation_key("anything", 1), 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_snapshot_reflects_processed_commands() {
    let broker = start_broker(1);
    broker
        .deploy(vec![resource(
            "order.json",
            message_start_workflow("order", &[("start", "order-created")]),
        )])
        .await
        .unwrap();

    let snapshot = broker.snapshot(1).await.unwrap();

    assert_eq!(snapshot.partition_id, 1);
    assert_eq!(snapshot.workflows.len(), 1);
    assert_eq!(snapshot.subscriptions.len(), 1);
    assert_eq!(snapshot.position, broker.partition_view(1).await.unwrap().position);

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_topology_is_refused() {
    let config = BrokerConfig {
        deployment_partition: 4,
        ..BrokerConfig::default()
    };

    assert!(Broker::builder().config(config).start().is_err());
    assert!(Broker::builder().partition_count(0).start().is_err());
}

#[tokio::test]
async fn test_unknown_partition() {
    let broker = start_broker(2);

    assert!(broker.partition_view(3).await.is_err());

    broker.shutdown().await.unwrap();
}
