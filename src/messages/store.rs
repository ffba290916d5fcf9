use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// A posted message and the times its background tasks ran.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Message {
    pub id: u64,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Words found by the indexing task.
    pub word_count: Option<usize>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub audited_at: Option<DateTime<Utc>>,
    pub notified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    messages: HashMap<u64, Message>,
}

#[derive(Debug, Default)]
pub struct MessageStore {
    state: Mutex<StoreState>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, author: &str, text: &str) -> Message {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.next_id += 1;
        let message = Message {
            id: state.next_id,
            author: author.to_owned(),
            text: text.to_owned(),
            created_at: Utc::now(),
            word_count: None,
            indexed_at: None,
            audited_at: None,
            notified_at: None,
        };
        state.messages.insert(message.id, message.clone());
        message
    }

    pub fn get(&self, id: u64) -> Option<Message> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `update` to message `id`. Returns `false` if there is no such message.
    fn update(&self, id: u64, update: impl FnOnce(&mut Message)) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.messages.get_mut(&id) {
            Some(message) => {
                update(message);
                true
            }
            None => false,
        }
    }

    pub fn mark_indexed(&self, id: u64, word_count: usize) -> bool {
        self.update(id, |m| {
            m.word_count = Some(word_count);
            m.indexed_at = Some(Utc::now());
        })
    }

    pub fn mark_audited(&self, id: u64) -> bool {
        self.update(id, |m| m.audited_at = Some(Utc::now()))
    }

    pub fn mark_notified(&self, id: u64) -> bool {
        self.update(id, |m| m.notified_at = Some(Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_assigns_increasing_ids() {
        let store = MessageStore::new();
        assert!(store.is_empty());

        let first = store.create("ann", "hello");
        let second = store.create("bob", "hi there");

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(2).unwrap().text, "hi there");
        assert!(store.get(3).is_none());
    }

    #[test]
    fn test_marks_record_task_progress() {
        let store = MessageStore::new();
        let message = store.create("ann", "one two three");

        assert!(store.mark_indexed(message.id, 3));
        assert!(store.mark_audited(message.id));
        assert!(store.mark_notified(message.id));
        assert!(!store.mark_audited(42));

        let stored = store.get(message.id).unwrap();
        assert_eq!(stored.word_count, Some(3));
        assert!(stored.indexed_at.is_some());
        assert!(stored.audited_at.is_some());
        assert!(stored.notified_at.is_some());
    }
}
