// src/common/types.rs

use alloc::collections::btree_map::{self, BTreeMap};
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

// --- Field tables ---

/// Metric name to token position.
pub type FieldMap = BTreeMap<String, usize>;

/// How a configured position maps onto a frame's token list.
///
/// Devices disagree on whether positions count data tokens or whole-line
/// tokens, so the table says which one it means.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionOrigin {
    /// Position 1 is the first token after the header.
    AfterHeader,
    /// Position is the offset from token 0 (the marker, or the node id on a
    /// re-encoded line).
    FromMarker,
}

impl PositionOrigin {
    /// Token index for `position` in a frame with `header_len` header tokens.
    /// `None` for positions that cannot address a token (0 under `AfterHeader`).
    pub fn resolve(self, position: usize, header_len: usize) -> Option<usize> {
        match self {
            PositionOrigin::AfterHeader => position.checked_sub(1).map(|i| header_len + i),
            PositionOrigin::FromMarker => Some(position),
        }
    }
}

/// Declarative contract between wire positions and metric names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTable {
    /// One table for every frame (single node on the line).
    Flat(FieldMap),
    /// One table per node id; the node-id token selects it.
    NodeKeyed(BTreeMap<String, FieldMap>),
}

impl FieldTable {
    /// Builds a flat table from `(name, position)` pairs.
    pub fn flat<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, usize)>,
        K: Into<String>,
    {
        FieldTable::Flat(fields.into_iter().map(|(k, p)| (k.into(), p)).collect())
    }

    /// Builds a node-keyed table from `(node_id, fields)` pairs.
    pub fn node_keyed<I, N>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (N, FieldMap)>,
        N: Into<String>,
    {
        FieldTable::NodeKeyed(nodes.into_iter().map(|(n, m)| (n.into(), m)).collect())
    }

    /// Flat tables count data tokens; node-keyed tables count from token 0.
    pub fn default_origin(&self) -> PositionOrigin {
        match self {
            FieldTable::Flat(_) => PositionOrigin::AfterHeader,
            FieldTable::NodeKeyed(_) => PositionOrigin::FromMarker,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldTable::Flat(map) => map.is_empty(),
            FieldTable::NodeKeyed(nodes) => nodes.values().all(|m| m.is_empty()),
        }
    }
}

// --- Per-cycle values ---

/// Samples collected for each metric during one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricAccumulator {
    samples: BTreeMap<String, Vec<i64>>,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metric: &str, value: i64) {
        match self.samples.get_mut(metric) {
            Some(values) => values.push(value),
            None => {
                self.samples.insert(String::from(metric), alloc::vec![value]);
            }
        }
    }

    /// Moves every sample of `other` behind the ones already held.
    pub fn append(&mut self, other: MetricAccumulator) {
        for (metric, mut values) in other.samples {
            self.samples.entry(metric).or_default().append(&mut values);
        }
    }

    pub fn samples(&self, metric: &str) -> Option<&[i64]> {
        self.samples.get(metric).map(Vec::as_slice)
    }

    /// Total number of samples across all metrics.
    pub fn sample_count(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    pub(crate) fn into_inner(self) -> BTreeMap<String, Vec<i64>> {
        self.samples
    }
}

/// One aggregated value per metric, produced at the end of a cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSnapshot {
    values: BTreeMap<String, f64>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: impl Into<String>, value: f64) {
        self.values.insert(metric.into(), value);
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Metrics in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, f64> {
        self.values.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for MetricSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        MetricSnapshot {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MetricSnapshot {
    type Item = (&'a String, &'a f64);
    type IntoIter = btree_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
