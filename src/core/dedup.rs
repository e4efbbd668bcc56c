//! Per-session signature deduplication for the live watcher.

use std::collections::{HashSet, VecDeque};

pub trait SignatureDeduplicator: Send {
    fn seen(&self, signature: &str) -> bool;
    fn mark_seen(&mut self, signature: &str);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remembers every signature for the lifetime of the session.
#[derive(Debug, Default)]
pub struct InMemoryDeduplicator {
    seen: HashSet<String>,
}

impl InMemoryDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignatureDeduplicator for InMemoryDeduplicator {
    fn seen(&self, signature: &str) -> bool {
        self.seen.contains(signature)
    }

    fn mark_seen(&mut self, signature: &str) {
        self.seen.insert(signature.to_string());
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Keeps at most `capacity` signatures, evicting the oldest insertion first.
#[derive(Debug)]
pub struct BoundedDeduplicator {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl BoundedDeduplicator {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }
}

impl SignatureDeduplicator for BoundedDeduplicator {
    fn seen(&self, signature: &str) -> bool {
        self.seen.contains(signature)
    }

    fn mark_seen(&mut self, signature: &str) {
        if !self.seen.insert(signature.to_string()) {
            return;
        }
        self.order.push_back(signature.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Unbounded when `capacity` is `None`.
#[must_use]
pub fn deduplicator(capacity: Option<usize>) -> Box<dyn SignatureDeduplicator> {
    match capacity {
        Some(capacity) => Box::new(BoundedDeduplicator::new(capacity)),
        None => Box::new(InMemoryDeduplicator::new()),
    }
}
