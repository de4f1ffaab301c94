//! In-memory partition log
//!
//! Stands in for the replicated log: records are committed as soon as they
//! are appended and are read back in append order. Positions start at 1 and
//! increase by one per record.

use chrono::Utc;
use thiserror::Error;

use crate::types::{LogEntry, PartitionId, Position, Record};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("log of partition {0} is closed")]
    Closed(PartitionId),

    #[error("log of partition {partition_id} is full ({capacity} records)")]
    Full {
        partition_id: PartitionId,
        capacity: usize,
    },
}

/// Append side of a log, as seen by processors
pub trait LogWriter {
    /// Append one entry; returns the position it was written at
    fn append(&mut self, entry: LogEntry) -> Result<Position, LogError>;
}

#[derive(Debug)]
pub struct LogStream {
    partition_id: PartitionId,
    records: Vec<Record>,
    capacity: Option<usize>,
    closed: bool,
}

impl LogStream {
    pub fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            records: Vec::new(),
            capacity: None,
            closed: false,
        }
    }

    /// Reject appends once `capacity` records are stored
    pub fn with_capacity_limit(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    /// Stop accepting appends; reads keep working
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn get(&self, position: Position) -> Option<&Record> {
        let index = usize::try_from(position).ok()?.checked_sub(1)?;
        self.records.get(index)
    }

    /// Records after `position`, in order
    pub fn read_after(&self, position: Position) -> &[Record] {
        let start = usize::try_from(position)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[start..]
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records written while processing the command at `source_position`
    pub fn follow_ups_of(&self, source_position: Position) -> impl Iterator<Item = &Record> {
        self.read_after(source_position)
            .iter()
            .filter(move |r| r.source_position == Some(source_position))
    }

    /// Position of the last record, 0 for an empty log
    pub fn last_position(&self) -> Position {
        self.records.len() as Position
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LogWriter for LogStream {
    fn append(&mut self, entry: LogEntry) -> Result<Position, LogError> {
        if self.closed {
            return Err(LogError::Closed(self.partition_id));
        }
        if let Some(capacity) = self.capacity {
            if self.records.len() >= capacity {
                return Err(LogError::Full {
                    partition_id: self.partition_id,
                    capacity,
                });
            }
        }

        let position = self.last_position() + 1;
        self.records.push(Record {
            key: entry.key,
            position,
            source_position: entry.source_position,
            partition_id: self.partition_id,
            record_type: entry.record_type,
            intent: entry.intent,
            value: entry.value,
            request: entry.request,
            rejection: entry.rejection,
            timestamp: Utc::now(),
        });

        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Intent, MessageIntent, MessageRecord, RecordValue};

    fn publish(name: &str) -> LogEntry {
        LogEntry::command(
            Intent::Message(MessageIntent::Publish),
            RecordValue::Message(MessageRecord {
                name: name.to_string(),
                correlation_key: "ck".to_string(),
                payload: Vec::new(),
            }),
        )
    }

    #[test]
    fn test_positions_start_at_one() {
        let mut log = LogStream::new(2);

        assert_eq!(log.append(publish("a")).unwrap(), 1);
        assert_eq!(log.append(publish("b")).unwrap(), 2);

        assert_eq!(log.last_position(), 2);
        assert_eq!(log.get(1).unwrap().partition_id, 2);
        assert!(log.get(0).is_none());
        assert!(log.get(3).is_none());
    }

    #[test]
    fn test_read_after() {
        let mut log = LogStream::new(1);
        for name in ["a", "b", "c"] {
            log.append(publish(name)).unwrap();
        }

        let positions: Vec<_> = log.read_after(1).iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![2, 3]);
        assert!(log.read_after(3).is_empty());
        assert!(log.read_after(10).is_empty());
    }

    #[test]
    fn test_follow_ups_of() {
        let mut log = LogStream::new(1);
        log.append(publish("a")).unwrap();
        let mut follow_up = publish("a");
        follow_up.source_position = Some(1);
        log.append(follow_up).unwrap();
        log.append(publish("b")).unwrap();

        let follow_ups: Vec<_> = log.follow_ups_of(1).map(|r| r.position).collect();
        assert_eq!(follow_ups, vec![2]);
    }

    #[test]
    fn test_closed_and_full() {
        let mut log = LogStream::new(1).with_capacity_limit(1);
        log.append(publish("a")).unwrap();

        assert_eq!(
            log.append(publish("b")),
            Err(LogError::Full {
                partition_id: 1,
                capacity: 1
            })
        );

        log.close();
        assert_eq!(log.append(publish("c")), Err(LogError::Closed(1)));
    }
}
