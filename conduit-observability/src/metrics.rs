//! Metrics provider contract plus a noop and an in-memory implementation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

/// A label set attached to a metric observation. Backed by a `BTreeMap`
/// so the composite key used by [`InMemoryMetrics`] is deterministic
/// regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    /// An empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets `key` to `value`, returning the prior value if one was set.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Merges `self` with `overlay`, with `overlay` winning on key
    /// collisions: `self.merge(overlay)[k] == overlay[k]` if `k` is in
    /// `overlay`, else `self[k]`.
    #[must_use]
    pub fn merge(&self, overlay: &Labels) -> Labels {
        let mut merged = self.0.clone();
        merged.extend(overlay.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Labels(merged)
    }
}

impl std::ops::Deref for Labels {
    type Target = BTreeMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Builds a label set from `(&str, &str)` pairs.
#[must_use]
pub fn labels(pairs: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Labels {
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// A metrics sink. Implementations must be safe for concurrent use from
/// every handler running in a flow.
pub trait MetricsProvider: Send + Sync {
    /// Increase a counter by `value` (normally `1`).
    fn counter(&self, name: &str, value: f64, labels: &Labels);

    /// Adjust a gauge by `value`; positive increases, negative decreases.
    /// This is an `Add` gauge, not a `Set` gauge, which is what lets a
    /// single metric track in-flight counts from paired increment and
    /// decrement calls.
    fn gauge(&self, name: &str, value: f64, labels: &Labels);

    /// Record one observation into a histogram.
    fn histogram(&self, name: &str, value: f64, labels: &Labels);

    /// Record an elapsed duration, in seconds, into a histogram.
    fn record_duration(&self, name: &str, elapsed: Duration, labels: &Labels) {
        self.histogram(name, elapsed.as_secs_f64(), labels);
    }
}

/// Discards every observation. The default for runs that don't need
/// metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsProvider for NoopMetrics {
    fn counter(&self, _name: &str, _value: f64, _labels: &Labels) {}
    fn gauge(&self, _name: &str, _value: f64, _labels: &Labels) {}
    fn histogram(&self, _name: &str, _value: f64, _labels: &Labels) {}
}

fn composite_key(name: &str, labels: &Labels) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{name}|{}", pairs.join(","))
}

/// Records every observation in process memory, for tests and examples.
/// Counters and gauges are kept as running totals; histograms keep every
/// observation so percentiles can be computed after the fact.
#[derive(Default)]
pub struct InMemoryMetrics {
    counters: DashMap<String, AtomicI64Bits>,
    gauges: DashMap<String, AtomicI64Bits>,
    histograms: DashMap<String, std::sync::Mutex<Vec<f64>>>,
}

/// `f64` bit pattern stored in an `AtomicI64` so counters/gauges can be
/// updated without a lock; `fetch_add` would lose precision on a true
/// float accumulator under contention, so updates take a compare-and-swap
/// loop instead.
struct AtomicI64Bits(AtomicI64);

impl Default for AtomicI64Bits {
    fn default() -> Self {
        Self(AtomicI64::new(0f64.to_bits() as i64))
    }
}

impl AtomicI64Bits {
    fn add(&self, delta: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let current_value = f64::from_bits(current as u64);
            let next = (current_value + delta).to_bits() as i64;
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed) as u64)
    }
}

impl InMemoryMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn counter_value(&self, name: &str, labels: &Labels) -> f64 {
        self.counters.get(&composite_key(name, labels)).map(|v| v.get()).unwrap_or(0.0)
    }

    #[must_use]
    pub fn gauge_value(&self, name: &str, labels: &Labels) -> f64 {
        self.gauges.get(&composite_key(name, labels)).map(|v| v.get()).unwrap_or(0.0)
    }

    #[must_use]
    pub fn histogram_values(&self, name: &str, labels: &Labels) -> Vec<f64> {
        self.histograms
            .get(&composite_key(name, labels))
            .map(|v| v.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

impl MetricsProvider for InMemoryMetrics {
    fn counter(&self, name: &str, value: f64, labels: &Labels) {
        self.counters.entry(composite_key(name, labels)).or_default().add(value);
    }

    fn gauge(&self, name: &str, value: f64, labels: &Labels) {
        self.gauges.entry(composite_key(name, labels)).or_default().add(value);
    }

    fn histogram(&self, name: &str, value: f64, labels: &Labels) {
        self.histograms
            .entry(composite_key(name, labels))
            .or_insert_with(|| std::sync::Mutex::new(Vec::new()))
            .lock()
            .unwrap()
            .push(value);
    }
}

/// Compose a metric name from namespace/subsystem/name components,
/// skipping any that are empty, joined with `_`.
#[must_use]
pub fn compose_metric_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
