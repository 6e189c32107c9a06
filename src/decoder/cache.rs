// src/decoder/cache.rs

use crate::common::types::MetricSnapshot;

/// Where the snapshot emitted for a cycle came from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Freshness {
    /// Computed this cycle; the cache now holds it.
    Fresh,
    /// Nothing this cycle; replaying the last good snapshot.
    Stale,
    /// Nothing this cycle and nothing cached yet.
    Empty,
}

/// Holds the last non-empty snapshot for replay on empty cycles.
#[derive(Debug, Clone, Default)]
pub struct StaleValueCache {
    last: MetricSnapshot,
}

impl StaleValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the fallback policy and returns the snapshot to emit.
    ///
    /// A non-empty `fresh` snapshot replaces the cache wholesale, so metrics
    /// missing from it are forgotten. An empty one leaves the cache untouched.
    /// Either way the returned snapshot is the cache's content.
    pub fn resolve(&mut self, fresh: MetricSnapshot) -> (Freshness, &MetricSnapshot) {
        let freshness = if !fresh.is_empty() {
            self.last = fresh;
            Freshness::Fresh
        } else if self.last.is_empty() {
            Freshness::Empty
        } else {
            Freshness::Stale
        };
        (freshness, &self.last)
    }

    pub fn last(&self) -> &MetricSnapshot {
        &self.last
    }
}
