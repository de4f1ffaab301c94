//! Message start event subscriptions are partition-local and always accepted

use tracing::debug;

use crate::processing::{ProcessingResult, RecordProcessor};
use crate::state::{KeyGenerator, PartitionState};
use crate::types::{Intent, MessageStartEventSubscriptionIntent, Record, RecordValue};

pub struct OpenSubscriptionProcessor;

impl RecordProcessor for OpenSubscriptionProcessor {
    fn process_record(
        &self,
        record: &Record,
        _state: &PartitionState,
        _keys: &mut KeyGenerator,
        result: &mut ProcessingResult,
    ) {
        if let Some(subscription) = record.subscription() {
            result.write_follow_up_event(
                record.key,
                Intent::MessageStartEventSubscription(MessageStartEventSubscriptionIntent::Opened),
                RecordValue::MessageStartEventSubscription(subscription.clone()),
            );
        }
    }

    fn update_state(
        &self,
        record: &Record,
        _result: &ProcessingResult,
        state: &mut PartitionState,
    ) {
        if let Some(subscription) = record.subscription() {
            debug!(
                workflow_key = subscription.workflow_key,
                message_name = %subscription.message_name,
                start_event_id = %subscription.start_event_id,
                "Opening message start event subscription"
            );
            state.subscriptions.put(subscription.clone());
        }
    }
}

pub struct CloseSubscriptionProcessor;

impl RecordProcessor for CloseSubscriptionProcessor {
    fn process_record(
        &self,
        record: &Record,
        _state: &PartitionState,
        _keys: &mut KeyGenerator,
        result: &mut ProcessingResult,
    ) {
        if let Some(subscription) = record.subscription() {
            result.write_follow_up_event(
                record.key,
                Intent::MessageStartEventSubscription(MessageStartEventSubscriptionIntent::Closed),
                RecordValue::MessageStartEventSubscription(subscription.clone()),
            );
        }
    }

    fn update_state(
        &self,
        record: &Record,
        _result: &ProcessingResult,
        state: &mut PartitionState,
    ) {
        if let Some(subscription) = record.subscription() {
            let closed = state.subscriptions.remove_for_workflow(subscription.workflow_key);
            debug!(
                workflow_key = subscription.workflow_key,
                closed,
                "Closing message start event subscriptions"
            );
        }
    }
}
