//! Partition-scoped key generation
//!
//! Keys carry their partition in the upper bits so any key can be routed
//! back to the partition that created it.

use serde::{Deserialize, Serialize};

use crate::types::{Key, PartitionId};

const PARTITION_BITS_SHIFT: u32 = 51;
const COUNTER_MASK: i64 = (1 << PARTITION_BITS_SHIFT) - 1;

/// Compose a key from partition id and per-partition counter
pub fn encode_key(partition_id: PartitionId, counter: i64) -> Key {
    ((partition_id as i64) << PARTITION_BITS_SHIFT) | (counter & COUNTER_MASK)
}

pub fn decode_partition_id(key: Key) -> PartitionId {
    (key >> PARTITION_BITS_SHIFT) as PartitionId
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyGenerator {
    partition_id: PartitionId,
    next_counter: i64,
}

impl KeyGenerator {
    pub fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            next_counter: 1,
        }
    }

    pub fn next_key(&mut self) -> Key {
        let key = encode_key(self.partition_id, self.next_counter);
        self.next_counter += 1;
        key
    }

    /// The key `next_key` would return, without consuming it
    pub fn peek(&self) -> Key {
        encode_key(self.partition_id, self.next_counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_encode_partition() {
        let mut keys = KeyGenerator::new(3);

        let first = keys.next_key();
        let second = keys.next_key();

        assert_eq!(first, (3 << 51) + 1);
        assert_eq!(second, first + 1);
        assert_eq!(decode_partition_id(first), 3);
    }

    #[test]
    fn test_partitions_never_collide() {
        let mut one = KeyGenerator::new(1);
        let mut two = KeyGenerator::new(2);

        assert_ne!(one.next_key(), two.next_key());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut keys = KeyGenerator::new(1);

        let peeked = keys.peek();
        assert_eq!(keys.next_key(), peeked);
        assert_ne!(keys.peek(), peeked);
    }
}
