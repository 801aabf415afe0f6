//! Keyed, cancellable deadlines driven by the caller's clock
//!
//! Nothing here sleeps or spawns. The owner asks for the next deadline, waits
//! however it likes, then pops what is due. Tests advance time by passing a
//! larger `now`.

use crate::AreaId;
use std::collections::HashMap;

/// Deferred work the navigator knows how to run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKey {
    /// Advance from arrived-at-start to active guidance
    SettleDelay,
    /// Flush pending coverage promotions of an area
    CoverageFlush(AreaId),
}

/// A table of at most one deadline per key
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    deadlines: HashMap<TaskKey, i64>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` at `due_ms`, replacing any existing deadline for it
    pub fn schedule(&mut self, key: TaskKey, due_ms: i64) {
        if let Some(previous) = self.deadlines.insert(key.clone(), due_ms) {
            tracing::trace!(?key, previous, due_ms, "Rescheduled task");
        }
    }

    /// Cancel `key`, returning whether it was scheduled
    pub fn cancel(&mut self, key: &TaskKey) -> bool {
        self.deadlines.remove(key).is_some()
    }

    pub fn is_scheduled(&self, key: &TaskKey) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn deadline(&self, key: &TaskKey) -> Option<i64> {
        self.deadlines.get(key).copied()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<i64> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every task due at or before `now_ms`, earliest first
    ///
    /// Ties are broken by key so the order never depends on hashing.
    pub fn pop_due(&mut self, now_ms: i64) -> Vec<TaskKey> {
        let mut due: Vec<(i64, TaskKey)> = self
            .deadlines
            .iter()
            .filter(|&(_, &at)| at <= now_ms)
            .map(|(key, &at)| (at, key.clone()))
            .collect();
        due.sort();

        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
