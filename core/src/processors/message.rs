use tracing::debug;

use crate::processing::{ProcessingResult, RecordProcessor};
use crate::state::{KeyGenerator, MessageEntry, PartitionState};
use crate::types::{Intent, MessageIntent, Record, RecordValue};

/// PUBLISH is always accepted and never deduplicated
pub struct PublishMessageProcessor;

impl RecordProcessor for PublishMessageProcessor {
    fn process_record(
        &self,
        record: &Record,
        _state: &PartitionState,
        keys: &mut KeyGenerator,
        result: &mut ProcessingResult,
    ) {
        let Some(message) = record.message() else {
            return;
        };

        let key = keys.next_key();
        let published = result
            .write_follow_up_event(
                key,
                Intent::Message(MessageIntent::Published),
                RecordValue::Message(message.clone()),
            )
            .clone();
        result.respond(record, published);
    }

    fn update_state(
        &self,
        _record: &Record,
        result: &ProcessingResult,
        state: &mut PartitionState,
    ) {
        for published in result.follow_ups() {
            if let RecordValue::Message(message) = &published.value {
                debug!(
                    key = published.key,
                    name = %message.name,
                    correlation_key = %message.correlation_key,
                    "Storing published message"
                );
                state.messages.put(MessageEntry::new(published.key, message));
            }
        }
    }
}
