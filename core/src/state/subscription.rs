//! Open message start event subscriptions of one partition
//!
//! At most one subscription exists per (workflow key, message name).

use std::collections::BTreeMap;

use crate::types::{Key, MessageStartEventSubscriptionRecord};

#[derive(Debug, Default)]
pub struct SubscriptionState {
    subscriptions: BTreeMap<(Key, String), MessageStartEventSubscriptionRecord>,
}

impl SubscriptionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription, replacing one for the same workflow and message
    pub fn put(&mut self, subscription: MessageStartEventSubscriptionRecord) {
        self.subscriptions.insert(
            (subscription.workflow_key, subscription.message_name.clone()),
            subscription,
        );
    }

    /// Close every subscription of a workflow; returns how many were open
    pub fn remove_for_workflow(&mut self, workflow_key: Key) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|(key, _), _| *key != workflow_key);
        before - self.subscriptions.len()
    }

    pub fn exists(&self, workflow_key: Key, message_name: &str) -> bool {
        self.subscriptions
            .contains_key(&(workflow_key, message_name.to_string()))
    }

    pub fn by_message_name(&self, message_name: &str) -> Vec<&MessageStartEventSubscriptionRecord> {
        self.subscriptions
            .values()
            .filter(|s| s.message_name == message_name)
            .collect()
    }

    pub fn by_workflow_key(&self, workflow_key: Key) -> Vec<&MessageStartEventSubscriptionRecord> {
        self.subscriptions
            .range((workflow_key, String::new())..)
            .take_while(|((key, _), _)| *key == workflow_key)
            .map(|(_, s)| s)
            .collect()
    }

    /// All open subscriptions, ordered by workflow key then message name
    pub fn subscriptions(&self) -> impl Iterator<Item = &MessageStartEventSubscriptionRecord> {
        self.subscriptions.values()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub(super) fn from_subscriptions(
        subscriptions: Vec<MessageStartEventSubscriptionRecord>,
    ) -> Self {
        let mut state = Self::new();
        for subscription in subscriptions {
            state.put(subscription);
        }
        state
    }
}
