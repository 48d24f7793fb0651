// Pawbird Engine — Processed Content Set
//
// Remembers ids of content already acted upon so each mention is handled at
// most once. Bounded: when full, the oldest id is evicted. The platform never
// returns arbitrarily old mentions, so a few hours of ids is enough.

use std::collections::{HashSet, VecDeque};

#[derive(Debug)]
pub struct ProcessedSet {
    capacity: usize,
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl ProcessedSet {
    pub fn new(capacity: usize) -> Self {
        ProcessedSet {
            capacity: capacity.max(1),
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Claim an id. Returns `false` if it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_claim_once() {
        let mut s = ProcessedSet::new(10);
        assert!(s.insert("1"));
        assert!(!s.insert("1"));
        assert!(s.contains("1"));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut s = ProcessedSet::new(3);
        for id in ["a", "b", "c", "d"] {
            assert!(s.insert(id));
        }
        assert_eq!(s.len(), 3);
        assert!(!s.contains("a"));
        assert!(s.contains("b") && s.contains("c") && s.contains("d"));
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut s = ProcessedSet::new(0);
        assert!(s.insert("x"));
        assert!(s.contains("x"));
        assert!(s.insert("y"));
        assert!(!s.contains("x"));
    }
}
