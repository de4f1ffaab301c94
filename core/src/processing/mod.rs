//! Record processing contract
//!
//! Every record a partition reads goes through four phases, in order and on
//! the partition's single processing thread:
//!
//! 1. **process_record** - decide what happens; follow-ups, the client
//!    response and cross-partition sends are queued in a fresh
//!    [`ProcessingResult`]
//! 2. **write_record** - append the queued follow-ups to the log
//! 3. **execute_side_effects** - respond to the client and forward commands;
//!    best effort, never rolls anything back
//! 4. **update_state** - apply the durable outcome to the partition state
//!
//! Deciding and applying only depend on the record, the state and the key
//! generator, so replaying the log rebuilds identical state.

mod stream_processor;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{trace, warn};

use crate::log::{LogError, LogWriter};
use crate::model::TransformError;
use crate::state::{KeyGenerator, PartitionState};
use crate::types::{
    Intent, Key, LogEntry, PartitionId, Position, Record, RecordType, RecordValue, Rejection,
    RejectionType, RequestMetadata,
};

pub use stream_processor::StreamProcessor;

/* ===================== Errors ===================== */

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Log(#[from] LogError),

    #[error("replay of record {position} diverged from the log: {detail}")]
    NonDeterministicReplay { position: Position, detail: String },

    #[error("failed to encode snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("failed to restore workflows from snapshot: {0}")]
    Restore(#[from] TransformError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SideEffectError {
    #[error("no client waits for request {0}")]
    ResponseDropped(uuid::Uuid),

    #[error("partition {0} can't be reached")]
    PartitionUnreachable(PartitionId),
}

/* ===================== Processing Result ===================== */

/// Everything one record's processing decided; built fresh per record
#[derive(Debug, Default)]
pub struct ProcessingResult {
    follow_ups: Vec<LogEntry>,
    response: Option<(RequestMetadata, LogEntry)>,
    forwards: Vec<(PartitionId, LogEntry)>,
}

impl ProcessingResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_follow_up_event(
        &mut self,
        key: Key,
        intent: Intent,
        value: RecordValue,
    ) -> &LogEntry {
        self.push(LogEntry {
            key,
            source_position: None,
            record_type: RecordType::Event,
            intent,
            value,
            request: None,
            rejection: None,
        })
    }

    pub fn append_follow_up_command(
        &mut self,
        key: Key,
        intent: Intent,
        value: RecordValue,
    ) -> &LogEntry {
        self.push(LogEntry::command(intent, value).with_key(key))
    }

    /// Reject `command` and answer the client with the rejection
    pub fn write_rejection(
        &mut self,
        command: &Record,
        rejection_type: RejectionType,
        reason: impl Into<String>,
    ) {
        let rejection = LogEntry {
            key: command.key,
            source_position: None,
            record_type: RecordType::CommandRejection,
            intent: command.intent,
            value: command.value.clone(),
            request: command.request,
            rejection: Some(Rejection {
                rejection_type,
                reason: reason.into(),
            }),
        };
        self.respond(command, rejection.clone());
        self.push(rejection);
    }

    /// Queue the client response; a command without a request gets none
    pub fn respond(&mut self, command: &Record, response: LogEntry) {
        if let Some(request) = command.request {
            self.response = Some((request, response));
        }
    }

    pub fn forward(&mut self, partition_id: PartitionId, command: LogEntry) {
        self.forwards.push((partition_id, command));
    }

    pub fn follow_ups(&self) -> &[LogEntry] {
        &self.follow_ups
    }

    pub fn response(&self) -> Option<&(RequestMetadata, LogEntry)> {
        self.response.as_ref()
    }

    pub fn forwards(&self) -> &[(PartitionId, LogEntry)] {
        &self.forwards
    }

    fn push(&mut self, entry: LogEntry) -> &LogEntry {
        self.follow_ups.push(entry);
        &self.follow_ups[self.follow_ups.len() - 1]
    }
}

/* ===================== Side Effects ===================== */

/// Delivers responses to waiting clients
pub trait ResponseChannel: Send {
    fn respond(
        &mut self,
        request: RequestMetadata,
        response: &LogEntry,
    ) -> Result<(), SideEffectError>;
}

/// Sends commands to other partitions
pub trait CommandRouter: Send {
    fn send(&mut self, partition_id: PartitionId, command: LogEntry) -> Result<(), SideEffectError>;
}

/// Discards everything; for partitions nobody listens to
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl ResponseChannel for Discard {
    fn respond(
        &mut self,
        _request: RequestMetadata,
        _response: &LogEntry,
    ) -> Result<(), SideEffectError> {
        Ok(())
    }
}

impl CommandRouter for Discard {
    fn send(
        &mut self,
        _partition_id: PartitionId,
        _command: LogEntry,
    ) -> Result<(), SideEffectError> {
        Ok(())
    }
}

/// Response and forwarding channels of a partition
///
/// Effects are numbered in the order a processor issues them. Once one was
/// delivered for the current record, issuing it again on a retry is a no-op,
/// so a retry only repeats what failed.
pub struct SideEffects {
    responses: Box<dyn ResponseChannel>,
    router: Box<dyn CommandRouter>,
    delivered: HashSet<usize>,
    next_effect: usize,
}

impl SideEffects {
    pub fn new(responses: Box<dyn ResponseChannel>, router: Box<dyn CommandRouter>) -> Self {
        Self {
            responses,
            router,
            delivered: HashSet::new(),
            next_effect: 0,
        }
    }

    pub fn discard() -> Self {
        Self::new(Box::new(Discard), Box::new(Discard))
    }

    /// Forget what was delivered; called before the first attempt of a record
    pub(crate) fn begin_record(&mut self) {
        self.delivered.clear();
        self.next_effect = 0;
    }

    /// Start numbering effects again for a retry of the same record
    pub(crate) fn begin_attempt(&mut self) {
        self.next_effect = 0;
    }

    fn deliver(
        &mut self,
        effect: impl FnOnce(&mut Self) -> Result<(), SideEffectError>,
    ) -> Result<(), SideEffectError> {
        let index = self.next_effect;
        self.next_effect += 1;
        if self.delivered.contains(&index) {
            return Ok(());
        }

        effect(self)?;
        self.delivered.insert(index);
        Ok(())
    }

    pub fn respond(
        &mut self,
        request: RequestMetadata,
        response: &LogEntry,
    ) -> Result<(), SideEffectError> {
        self.deliver(|effects| effects.responses.respond(request, response))
    }

    pub fn send(
        &mut self,
        partition_id: PartitionId,
        command: LogEntry,
    ) -> Result<(), SideEffectError> {
        self.deliver(|effects| effects.router.send(partition_id, command))
    }
}

/* ===================== Processor Trait ===================== */

/// Strategy for one (record type, intent)
///
/// Only `process_record` is required. The defaults append every queued
/// follow-up, send the queued response and forwards, and leave state alone.
pub trait RecordProcessor: Send {
    fn process_record(
        &self,
        record: &Record,
        state: &PartitionState,
        keys: &mut KeyGenerator,
        result: &mut ProcessingResult,
    );

    /// Returns the position of the last appended follow-up, if any
    fn write_record(
        &self,
        record: &Record,
        result: &ProcessingResult,
        writer: &mut dyn LogWriter,
    ) -> Result<Option<Position>, LogError> {
        let mut last = None;
        for entry in result.follow_ups() {
            let mut entry = entry.clone();
            entry.source_position = Some(record.position);
            last = Some(writer.append(entry)?);
        }
        Ok(last)
    }

    /// Returns false if anything failed; the caller may retry, and effects
    /// already delivered for this record are skipped then
    fn execute_side_effects(
        &self,
        _record: &Record,
        result: &ProcessingResult,
        side_effects: &mut SideEffects,
    ) -> bool {
        let mut succeeded = true;

        if let Some((request, response)) = result.response() {
            if let Err(e) = side_effects.respond(*request, response) {
                warn!(error = %e, "Failed to send response");
                succeeded = false;
            }
        }

        for (partition_id, command) in result.forwards() {
            if let Err(e) = side_effects.send(*partition_id, command.clone()) {
                warn!(error = %e, "Failed to forward command");
                succeeded = false;
            }
        }

        succeeded
    }

    fn update_state(
        &self,
        _record: &Record,
        _result: &ProcessingResult,
        _state: &mut PartitionState,
    ) {
    }
}

/* ===================== Dispatch ===================== */

/// Processors by (record type, intent)
#[derive(Default)]
pub struct RecordProcessors {
    processors: HashMap<(RecordType, Intent), Box<dyn RecordProcessor>>,
}

impl RecordProcessors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        record_type: RecordType,
        intent: Intent,
        processor: impl RecordProcessor + 'static,
    ) -> &mut Self {
        self.processors.insert((record_type, intent), Box::new(processor));
        self
    }

    pub fn get(&self, record: &Record) -> Option<&dyn RecordProcessor> {
        let processor = self.processors.get(&(record.record_type, record.intent));
        if processor.is_none() {
            trace!(
                position = record.position,
                record_type = ?record.record_type,
                intent = %record.intent,
                "No processor registered, skipping record"
            );
        }
        processor.map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
