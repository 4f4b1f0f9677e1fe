use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Request latency buckets, in seconds
pub const LATENCY_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Live histogram for one label set.
///
/// Each observation lands in the first bucket whose bound covers it;
/// [`HistogramCell::snapshot`] turns the hits into cumulative counts.
#[derive(Debug)]
pub(crate) struct HistogramCell {
    bounds: Arc<[f64]>,
    hits: Vec<AtomicU64>,
    sum_bits: AtomicU64,
    count: AtomicU64,
}

impl HistogramCell {
    /// `bounds` must be sorted ascending
    pub(crate) fn new(bounds: Arc<[f64]>) -> Self {
        let hits = bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            hits,
            sum_bits: AtomicU64::new(0f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    pub(crate) fn observe(&self, value: f64) {
        if let Some(slot) = self.bounds.iter().position(|bound| value <= *bound) {
            self.hits[slot].fetch_add(1, Ordering::Relaxed);
        }
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> HistogramSnapshot {
        let mut running = 0;
        let buckets = self
            .bounds
            .iter()
            .zip(&self.hits)
            .map(|(bound, hits)| {
                running += hits.load(Ordering::Relaxed);
                (*bound, running)
            })
            .collect();

        HistogramSnapshot {
            buckets,
            sum: f64::from_bits(self.sum_bits.load(Ordering::Relaxed)),
            count: self.count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of one histogram series
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// Cumulative `(upper bound, count)` pairs, bounds ascending
    pub buckets: Vec<(f64, u64)>,
    /// Sum of every observed value
    pub sum: f64,
    /// Number of observations, including those above the last bound
    pub count: u64,
}
