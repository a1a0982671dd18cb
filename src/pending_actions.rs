use std::{collections::HashMap, sync::Mutex, time::Duration};

use chrono::{DateTime, Utc};
use serde_derive::{Serialize, Deserialize};
use uuid::Uuid;

use crate::events::MessageEvent;

/// What a confirm button refers to. Only the generated id leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingContent {
    Message {
        event: MessageEvent,
        username: Option<String>,
    },
    Snippet {
        file_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub team_id: String,
    pub channel_id: String,
    pub content: PendingContent,
}

pub type PendingActions = ExpiringMap<PendingAction>;

struct Entry<V> {
    value: V,
    sequence: u64,
    expires_at: DateTime<Utc>,
}

struct Entries<V> {
    items: HashMap<String, Entry<V>>,
    next_sequence: u64,
}

/// Bounded map from generated ids to values with a fixed time-to-live.
pub struct ExpiringMap<V> {
    ttl: chrono::Duration,
    capacity: usize,
    entries: Mutex<Entries<V>>,
}

impl<V> ExpiringMap<V> {
    pub fn new(ttl: Duration, capacity: usize) -> ExpiringMap<V> {
        ExpiringMap {
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
            capacity: capacity.max(1),
            entries: Mutex::new(Entries { items: HashMap::new(), next_sequence: 0 }),
        }
    }

    pub fn insert(&self, value: V) -> String {
        self.insert_at(value, Utc::now())
    }

    pub fn insert_at(&self, value: V, now: DateTime<Utc>) -> String {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        entries.items.retain(|_, entry| entry.expires_at > now);

        while entries.items.len() >= self.capacity {
            let oldest = entries.items
                .iter()
                .min_by_key(|(_, entry)| entry.sequence)
                .map(|(id, _)| id.clone());

            match oldest {
                Some(id) => { entries.items.remove(&id); },
                None => break,
            }
        }

        let id = Uuid::new_v4().simple().to_string();
        let sequence = entries.next_sequence;
        entries.next_sequence += 1;
        entries.items.insert(id.clone(), Entry { value, sequence, expires_at: now + self.ttl });

        id
    }

    /// Removes the entry, returning it only if it has not expired.
    pub fn take(&self, id: &str) -> Option<V> {
        self.take_at(id, Utc::now())
    }

    pub fn take_at(&self, id: &str, now: DateTime<Utc>) -> Option<V> {
        self.take_if_at(id, now, |_| true)
    }

    /// Like `take`, but an entry rejected by `accept` stays in the map.
    pub fn take_if(&self, id: &str, accept: impl FnOnce(&V) -> bool) -> Option<V> {
        self.take_if_at(id, Utc::now(), accept)
    }

    pub fn take_if_at(&self, id: &str, now: DateTime<Utc>, accept: impl FnOnce(&V) -> bool) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let live = entries.items.get(id).map(|entry| entry.expires_at > now)?;
        if !live {
            entries.items.remove(id);
            return None;
        }

        let accepted = entries.items.get(id).is_some_and(|entry| accept(&entry.value));
        if !accepted {
            return None;
        }

        entries.items.remove(id).map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
impl<V: Clone> ExpiringMap<V> {
    pub(crate) fn entries(&self) -> Vec<(String, V)> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.items.iter().map(|(id, entry)| (id.clone(), entry.value.clone())).collect()
    }
}
