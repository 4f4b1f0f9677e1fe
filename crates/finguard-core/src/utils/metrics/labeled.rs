use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::histogram::{HistogramCell, HistogramSnapshot, LATENCY_BUCKETS};

/// Label pairs in the order the caller gave them
pub type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    labels
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// One cell per label set
#[derive(Debug)]
struct LabelMap<C> {
    cells: RwLock<HashMap<LabelKey, C>>,
}

impl<C> Default for LabelMap<C> {
    fn default() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
        }
    }
}

impl<C> LabelMap<C> {
    /// Apply `f` to the cell for `labels`, creating it on first use.
    /// The write lock is only taken on a miss.
    fn with_cell<R>(
        &self,
        labels: &[(&str, &str)],
        make: impl FnOnce() -> C,
        f: impl FnOnce(&C) -> R,
    ) -> R {
        let key = label_key(labels);
        {
            let cells = self.cells.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cell) = cells.get(&key) {
                return f(cell);
            }
        }

        let mut cells = self.cells.write().unwrap_or_else(|e| e.into_inner());
        f(cells.entry(key).or_insert_with(make))
    }

    fn read<R>(&self, labels: &[(&str, &str)], f: impl FnOnce(&C) -> R) -> Option<R> {
        let cells = self.cells.read().unwrap_or_else(|e| e.into_inner());
        cells.get(&label_key(labels)).map(f)
    }

    fn sorted<R>(&self, f: impl Fn(&C) -> R) -> Vec<(LabelKey, R)> {
        let cells = self.cells.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = cells.iter().map(|(k, c)| (k.clone(), f(c))).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// Monotonic counter family
#[derive(Debug, Default, Clone)]
pub struct LabeledCounter {
    cells: Arc<LabelMap<AtomicU64>>,
}

impl LabeledCounter {
    /// Create an empty family
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to the series for `labels`
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.cells.with_cell(labels, AtomicU64::default, |c| {
            c.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Current value, 0 for a series never incremented
    #[must_use]
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.cells
            .read(labels, |c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Every series, sorted by labels
    #[must_use]
    pub fn entries(&self) -> Vec<(LabelKey, u64)> {
        self.cells.sorted(|c| c.load(Ordering::Relaxed))
    }
}

/// Last-value gauge family
#[derive(Debug, Default, Clone)]
pub struct LabeledGauge {
    cells: Arc<LabelMap<AtomicI64>>,
}

impl LabeledGauge {
    /// Create an empty family
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value of the series for `labels`
    pub fn set(&self, labels: &[(&str, &str)], value: i64) {
        self.cells.with_cell(labels, AtomicI64::default, |g| {
            g.store(value, Ordering::Relaxed);
        });
    }

    /// Current value, if the series was ever set
    #[must_use]
    pub fn get(&self, labels: &[(&str, &str)]) -> Option<i64> {
        self.cells.read(labels, |g| g.load(Ordering::Relaxed))
    }

    /// Every series, sorted by labels
    #[must_use]
    pub fn entries(&self) -> Vec<(LabelKey, i64)> {
        self.cells.sorted(|g| g.load(Ordering::Relaxed))
    }
}

/// Histogram family sharing one set of bucket bounds
#[derive(Debug, Clone)]
pub struct LabeledHistogram {
    cells: Arc<LabelMap<HistogramCell>>,
    bounds: Arc<[f64]>,
}

impl Default for LabeledHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LabeledHistogram {
    /// Family with [`LATENCY_BUCKETS`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_buckets(LATENCY_BUCKETS.to_vec())
    }

    /// Family with custom bounds, in any order
    #[must_use]
    pub fn with_buckets(mut bounds: Vec<f64>) -> Self {
        bounds.sort_by(f64::total_cmp);
        bounds.dedup();
        Self {
            cells: Arc::default(),
            bounds: bounds.into(),
        }
    }

    /// Record `value` in the series for `labels`
    pub fn observe(&self, labels: &[(&str, &str)], value: f64) {
        self.cells.with_cell(
            labels,
            || HistogramCell::new(Arc::clone(&self.bounds)),
            |h| h.observe(value),
        );
    }

    /// Snapshot of one series, if anything was observed for it
    #[must_use]
    pub fn get(&self, labels: &[(&str, &str)]) -> Option<HistogramSnapshot> {
        self.cells.read(labels, HistogramCell::snapshot)
    }

    /// Snapshots of every series, sorted by labels
    #[must_use]
    pub fn entries(&self) -> Vec<(LabelKey, HistogramSnapshot)> {
        self.cells.sorted(HistogramCell::snapshot)
    }
}

/// Render label pairs as `{key1="val1",key2="val2"}`, or nothing when empty
pub(super) fn format_labels(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
