//! Local subscription registry.
//!
//! Entries are keyed by a monotonically increasing id, so iteration order is
//! registration order. Several local handlers may share one topic; the
//! connection task keeps exactly one broker subscription per distinct topic.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::message::BusMessage;

/// Handler invoked for each message on a topic.
pub type Handler = Arc<dyn Fn(&BusMessage) + Send + Sync>;

struct Entry {
    topic: String,
    handler: Handler,
}

#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
}

impl Registry {
    pub(crate) fn insert(&mut self, topic: &str, handler: Handler) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let _ = self.entries.insert(
            id,
            Entry {
                topic: topic.to_string(),
                handler,
            },
        );
        id
    }

    /// Remove an entry. Returns `true` when it was the topic's last handler.
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        !self.entries.values().any(|e| e.topic == entry.topic)
    }

    /// Distinct topics, ordered by their earliest live registration.
    pub(crate) fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for entry in self.entries.values() {
            if !topics.contains(&entry.topic) {
                topics.push(entry.topic.clone());
            }
        }
        topics
    }

    /// Handlers for `topic`, in registration order.
    pub(crate) fn handlers_for(&self, topic: &str) -> Vec<Handler> {
        self.entries
            .values()
            .filter(|e| e.topic == topic)
            .map(|e| Arc::clone(&e.handler))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
