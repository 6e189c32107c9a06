// src/decoder/aggregate.rs

use crate::common::types::{MetricAccumulator, MetricSnapshot};

/// Arithmetic mean of `samples`, or `None` when there are none.
///
/// The sum is exact (`i128`) so the result does not depend on sample order.
pub fn mean(samples: &[i64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum: i128 = samples.iter().map(|&v| i128::from(v)).sum();
    Some(sum as f64 / samples.len() as f64)
}

/// Reduces a cycle's samples to one mean per metric.
/// Metrics without samples do not appear in the snapshot.
pub fn aggregate(acc: MetricAccumulator) -> MetricSnapshot {
    acc.into_inner()
        .into_iter()
        .filter_map(|(metric, samples)| mean(&samples).map(|m| (metric, m)))
        .collect()
}
