use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use super::histogram::HistogramSnapshot;
use super::labeled::{format_labels, LabeledCounter, LabeledGauge, LabeledHistogram};

type Families<M> = RwLock<BTreeMap<String, M>>;

fn family<M: Clone + Default>(families: &Families<M>, name: &str) -> M {
    if let Some(metric) = families
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(name)
    {
        return metric.clone();
    }

    let mut families = families.write().unwrap_or_else(|e| e.into_inner());
    families.entry(name.to_string()).or_default().clone()
}

/// Name-ordered copy, so export runs without holding the lock
fn snapshot<M: Clone>(families: &Families<M>) -> Vec<(String, M)> {
    let families = families.read().unwrap_or_else(|e| e.into_inner());
    families
        .iter()
        .map(|(name, metric)| (name.clone(), metric.clone()))
        .collect()
}

#[derive(Debug, Default)]
struct Inner {
    help: RwLock<HashMap<String, String>>,
    counters: Families<LabeledCounter>,
    gauges: Families<LabeledGauge>,
    histograms: Families<LabeledHistogram>,
}

/// Named metric families. Clones share the same families.
#[derive(Debug, Default, Clone)]
pub struct MetricsRegistry {
    inner: Arc<Inner>,
}

impl MetricsRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a `# HELP` line to a metric name
    pub fn describe(&self, name: &str, help: &str) {
        let mut map = self.inner.help.write().unwrap_or_else(|e| e.into_inner());
        map.insert(name.to_string(), help.to_string());
    }

    /// Get or create a counter family
    pub fn labeled_counter(&self, name: &str) -> LabeledCounter {
        family(&self.inner.counters, name)
    }

    /// Get or create a gauge family
    pub fn labeled_gauge(&self, name: &str) -> LabeledGauge {
        family(&self.inner.gauges, name)
    }

    /// Get or create a histogram family with the default latency buckets
    pub fn labeled_histogram(&self, name: &str) -> LabeledHistogram {
        family(&self.inner.histograms, name)
    }

    /// Render every family in the Prometheus text format, sorted by name
    /// within each metric type
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        for (name, counter) in snapshot(&self.inner.counters) {
            self.write_header(&mut output, &name, "counter");
            for (labels, value) in counter.entries() {
                let _ = writeln!(output, "{}{} {}", name, format_labels(&labels), value);
            }
        }

        for (name, gauge) in snapshot(&self.inner.gauges) {
            self.write_header(&mut output, &name, "gauge");
            for (labels, value) in gauge.entries() {
                let _ = writeln!(output, "{}{} {}", name, format_labels(&labels), value);
            }
        }

        for (name, histogram) in snapshot(&self.inner.histograms) {
            self.write_header(&mut output, &name, "histogram");
            for (labels, series) in histogram.entries() {
                write_histogram(&mut output, &name, &labels, &series);
            }
        }

        output
    }

    fn write_header(&self, output: &mut String, name: &str, kind: &str) {
        let help = self.inner.help.read().unwrap_or_else(|e| e.into_inner());
        if let Some(text) = help.get(name) {
            let _ = writeln!(output, "# HELP {} {}", name, text);
        }
        let _ = writeln!(output, "# TYPE {} {}", name, kind);
    }
}

fn write_histogram(
    output: &mut String,
    name: &str,
    labels: &[(String, String)],
    series: &HistogramSnapshot,
) {
    let with_le = |le: String| {
        let mut all = labels.to_vec();
        all.push(("le".to_string(), le));
        format_labels(&all)
    };

    for (bound, count) in &series.buckets {
        let _ = writeln!(output, "{}_bucket{} {}", name, with_le(bound.to_string()), count);
    }
    let _ = writeln!(
        output,
        "{}_bucket{} {}",
        name,
        with_le("+Inf".to_string()),
        series.count
    );

    let plain = format_labels(labels);
    let _ = writeln!(output, "{}_sum{} {}", name, plain, series.sum);
    let _ = writeln!(output, "{}_count{} {}", name, plain, series.count);
}
