//! Ordered node key list of one capture session.

use crate::api::SequenceRecord;

/// A sequence of node keys in capture order.
///
/// Keys are never mutated after construction; the graph shares sequences
/// behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    key: String,
    keys: Vec<String>,
}

impl Sequence {
    pub fn new(record: SequenceRecord) -> Self {
        Self {
            key: record.key,
            keys: record.keys,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Position of a node key within the sequence.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Key following `key`, if any.
    pub fn find_next_key(&self, key: &str) -> Option<&str> {
        let index = self.index_of(key)?;
        self.keys.get(index + 1).map(String::as_str)
    }

    /// Key preceding `key`, if any.
    pub fn find_prev_key(&self, key: &str) -> Option<&str> {
        let index = self.index_of(key)?;
        index
            .checked_sub(1)
            .and_then(|i| self.keys.get(i))
            .map(String::as_str)
    }
}
