//! Recency Order Module
//!
//! Access order used to pick the eviction victim when the store is full.

use std::collections::VecDeque;

/// Keys ordered by last access. Front = most recent, back = least recent.
#[derive(Debug, Default)]
pub struct RecencyOrder {
    keys: VecDeque<String>,
}

impl RecencyOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `key` to the most-recent position, inserting it if absent.
    pub fn touch(&mut self, key: &str) {
        self.forget(key);
        self.keys.push_front(key.to_string());
    }

    pub fn forget(&mut self, key: &str) {
        self.keys.retain(|k| k != key);
    }

    /// Removes and returns the least recently used key.
    pub fn pop_oldest(&mut self) -> Option<String> {
        self.keys.pop_back()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_oldest_follows_insertion() {
        let mut order = RecencyOrder::new();
        order.touch("a");
        order.touch("b");
        order.touch("c");
        assert_eq!(order.pop_oldest().as_deref(), Some("a"));
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_touch_refreshes_position() {
        let mut order = RecencyOrder::new();
        order.touch("a");
        order.touch("b");
        order.touch("a");
        assert_eq!(order.len(), 2);
        assert_eq!(order.pop_oldest().as_deref(), Some("b"));
    }

    #[test]
    fn test_forget() {
        let mut order = RecencyOrder::new();
        order.touch("a");
        order.forget("a");
        order.forget("missing");
        assert_eq!(order.pop_oldest(), None);
    }
}
