//! Bounded FIFO of recently emitted identifiers

use std::collections::{HashSet, VecDeque};

/// Remembers the last `capacity` identifiers, oldest evicted first.
#[derive(Debug, Clone)]
pub struct SeenHistory {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl SeenHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
        }
    }

    /// Record `name`. Returns `false` if it was already present.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.members.contains(name) {
            return false;
        }
        self.order.push_back(name.to_string());
        self.members.insert(name.to_string());

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
