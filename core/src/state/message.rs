//! Published messages of one partition

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Key, MessageRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    pub key: Key,
    pub name: String,
    pub correlation_key: String,
    pub payload: Vec<u8>,
}

impl MessageEntry {
    pub fn new(key: Key, message: &MessageRecord) -> Self {
        Self {
            key,
            name: message.name.clone(),
            correlation_key: message.correlation_key.clone(),
            payload: message.payload.clone(),
        }
    }
}

/// Append-only store keyed by message key; re-applying a message replaces it
#[derive(Debug, Default)]
pub struct MessageState {
    messages: BTreeMap<Key, MessageEntry>,
}

impl MessageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, entry: MessageEntry) {
        self.messages.insert(entry.key, entry);
    }

    pub fn get(&self, key: Key) -> Option<&MessageEntry> {
        self.messages.get(&key)
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageEntry> {
        self.messages.values()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(super) fn from_entries(entries: Vec<MessageEntry>) -> Self {
        let mut state = Self::new();
        for entry in entries {
            state.put(entry);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(name: &str, correlation_key: &str) -> MessageRecord {
        MessageRecord {
            name: name.to_string(),
            correlation_key: correlation_key.to_string(),
            payload: b"{}".to_vec(),
        }
    }

    #[test]
    fn test_same_message_twice_is_stored_twice() {
        let mut state = MessageState::new();
        let record = message("paid", "order-1");

        state.put(MessageEntry::new(1, &record));
        state.put(MessageEntry::new(2, &record));

        assert_eq!(state.len(), 2);
        let keys: Vec<_> = state.messages().map(|m| m.key).collect();
        assert_eq!(keys, vec![1, 2]);
        assert_eq!(state.get(1).unwrap().payload, state.get(2).unwrap().payload);
    }

    #[test]
    fn test_reapplying_replaces() {
        let mut state = MessageState::new();
        state.put(MessageEntry::new(1, &message("paid", "order-1")));
        state.put(MessageEntry::new(1, &message("paid", "order-1")));

        assert_eq!(state.len(), 1);
        assert_eq!(state.get(1).unwrap().payload, b"{}".to_vec());
        assert!(state.get(2).is_none());
    }
}
