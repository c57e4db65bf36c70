//! Bounded memory of completed commands.

use crate::CommandOutput;
use speakhub_core::IdempotencyKey;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct WindowEntry {
    output: CommandOutput,
    completed_at: Instant,
}

/// Completed results keyed by idempotency key, with TTL and size bounds.
///
/// Oldest entries are evicted first once `capacity` is reached.
#[derive(Debug)]
pub struct IdempotencyWindow {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<IdempotencyKey, WindowEntry>,
    order: VecDeque<IdempotencyKey>,
}

impl IdempotencyWindow {
    /// Create an empty window.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Stored result for a key, if still inside the window.
    pub fn get(&self, key: &IdempotencyKey) -> Option<CommandOutput> {
        self.entries
            .get(key)
            .filter(|entry| entry.completed_at.elapsed() < self.ttl)
            .map(|entry| entry.output)
    }

    /// Remember a completed result.
    pub fn insert(&mut self, key: IdempotencyKey, output: CommandOutput) {
        self.evict_expired();
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            WindowEntry {
                output,
                completed_at: Instant::now(),
            },
        );
    }

    /// Number of remembered results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self) {
        while let Some(front) = self.order.front() {
            let expired = self
                .entries
                .get(front)
                .is_none_or(|entry| entry.completed_at.elapsed() >= self.ttl);
            if !expired {
                break;
            }
            if let Some(key) = self.order.pop_front() {
                self.entries.remove(&key);
            }
        }
    }
}
