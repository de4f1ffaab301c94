//! Drives records of one partition log through their processors

use tracing::{debug, debug_span, error, info, warn};

use crate::log::{LogStream, LogWriter};
use crate::model::WorkflowTransformer;
use crate::state::{KeyGenerator, PartitionState, StateSnapshot};
use crate::types::{LogEntry, PartitionId, Position, Record};

use super::{ProcessingError, ProcessingResult, RecordProcessors, SideEffects};

const DEFAULT_SIDE_EFFECT_RETRIES: u32 = 3;

pub struct StreamProcessor {
    log: LogStream,
    state: PartitionState,
    keys: KeyGenerator,
    processors: RecordProcessors,
    side_effects: SideEffects,
    side_effect_retries: u32,
    last_processed: Position,
}

impl StreamProcessor {
    /// Processor for a log whose records haven't been processed yet
    pub fn new(log: LogStream, processors: RecordProcessors, side_effects: SideEffects) -> Self {
        let partition_id = log.partition_id();
        Self {
            log,
            state: PartitionState::new(partition_id),
            keys: KeyGenerator::new(partition_id),
            processors,
            side_effects,
            side_effect_retries: DEFAULT_SIDE_EFFECT_RETRIES,
            last_processed: 0,
        }
    }

    /// Processor that continues from `snapshot`; call [`recover`](Self::recover)
    /// before processing new records
    pub fn from_snapshot(
        log: LogStream,
        snapshot: StateSnapshot,
        transformer: &WorkflowTransformer,
        processors: RecordProcessors,
        side_effects: SideEffects,
    ) -> Result<Self, ProcessingError> {
        let (state, keys, position) = PartitionState::restore(snapshot, transformer)?;
        Ok(Self {
            log,
            state,
            keys,
            processors,
            side_effects,
            side_effect_retries: DEFAULT_SIDE_EFFECT_RETRIES,
            last_processed: position,
        })
    }

    pub fn with_side_effect_retries(mut self, retries: u32) -> Self {
        self.side_effect_retries = retries;
        self
    }

    pub fn partition_id(&self) -> PartitionId {
        self.log.partition_id()
    }

    pub fn state(&self) -> &PartitionState {
        &self.state
    }

    pub fn log(&self) -> &LogStream {
        &self.log
    }

    pub fn into_log(self) -> LogStream {
        self.log
    }

    pub fn last_processed_position(&self) -> Position {
        self.last_processed
    }

    /// Append a command from a client or another partition
    pub fn append_command(&mut self, command: LogEntry) -> Result<Position, ProcessingError> {
        Ok(self.log.append(command)?)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot(self.last_processed, &self.keys)
    }

    /// Rebuild state from records that were processed before a restart
    ///
    /// Records up to the last one that produced follow-ups are decided again
    /// and compared with what the log holds; their writes and side effects
    /// are not repeated. Returns the number of replayed records.
    pub fn recover(&mut self) -> Result<usize, ProcessingError> {
        let Some(replay_until) = self
            .log
            .records()
            .iter()
            .filter_map(|r| r.source_position)
            .max()
        else {
            return Ok(0);
        };

        let mut replayed = 0;
        while self.last_processed < replay_until {
            let Some(record) = self.log.get(self.last_processed + 1).cloned() else {
                break;
            };
            self.replay(&record)?;
            self.last_processed = record.position;
            replayed += 1;
        }

        info!(
            partition_id = self.partition_id(),
            replayed,
            position = self.last_processed,
            "Recovered partition state"
        );
        Ok(replayed)
    }

    fn replay(&mut self, record: &Record) -> Result<(), ProcessingError> {
        let Some(processor) = self.processors.get(record) else {
            return Ok(());
        };

        let mut result = ProcessingResult::new();
        processor.process_record(record, &self.state, &mut self.keys, &mut result);

        let written: Vec<&Record> = self.log.follow_ups_of(record.position).collect();
        if written.len() != result.follow_ups().len() {
            return Err(ProcessingError::NonDeterministicReplay {
                position: record.position,
                detail: format!(
                    "expected {} follow-up records, but decided {}",
                    written.len(),
                    result.follow_ups().len()
                ),
            });
        }
        for (entry, existing) in result.follow_ups().iter().zip(written) {
            if !entry.matches(existing) {
                return Err(ProcessingError::NonDeterministicReplay {
                    position: record.position,
                    detail: format!(
                        "expected {} {:?} with key {} at position {}, but decided {} {:?} with key {}",
                        existing.intent,
                        existing.record_type,
                        existing.key,
                        existing.position,
                        entry.intent,
                        entry.record_type,
                        entry.key
                    ),
                });
            }
        }

        processor.update_state(record, &result, &mut self.state);
        Ok(())
    }

    /// Process the next unprocessed record; false once the log is caught up
    pub fn process_next(&mut self) -> Result<bool, ProcessingError> {
        let Some(record) = self.log.get(self.last_processed + 1).cloned() else {
            return Ok(false);
        };

        let span = debug_span!(
            "process_record",
            partition_id = record.partition_id,
            position = record.position
        );
        let _entered = span.enter();

        if let Some(processor) = self.processors.get(&record) {
            debug!(
                record_type = ?record.record_type,
                intent = %record.intent,
                key = record.key,
                "Processing record"
            );

            let mut result = ProcessingResult::new();
            processor.process_record(&record, &self.state, &mut self.keys, &mut result);

            if let Err(e) = processor.write_record(&record, &result, &mut self.log) {
                error!(error = %e, "Failed to write follow-up records");
                return Err(e.into());
            }

            let mut attempt = 0;
            self.side_effects.begin_record();
            while !processor.execute_side_effects(&record, &result, &mut self.side_effects) {
                if attempt >= self.side_effect_retries {
                    warn!(attempts = attempt + 1, "Giving up on side effects");
                    break;
                }
                attempt += 1;
                self.side_effects.begin_attempt();
            }

            processor.update_state(&record, &result, &mut self.state);
        }

        self.last_processed = record.position;
        Ok(true)
    }

    /// Process until no unprocessed record is left; returns how many were read
    pub fn process_until_idle(&mut self) -> Result<usize, ProcessingError> {
        let mut processed = 0;
        while self.process_next()? {
            processed += 1;
        }
        Ok(processed)
    }
}
