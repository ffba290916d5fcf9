//! In-memory message board used by the demo server.

mod store;

pub use store::{Message, MessageStore};

/// Number of whitespace separated words in `text`.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
