//! # gov-metrics: Governance Telemetry
//!
//! A [`MetricsCollector`] keyed by metric name plus label set. Counters
//! accumulate, gauges hold the last value, histograms keep every sample so
//! percentiles can be answered exactly by nearest rank.
//!
//! Components receive an `Arc<MetricsCollector>`; [`global`] provides the
//! process-wide instance for binaries that want one. Updates to different
//! series are independent, so each update takes one short lock and no
//! cross-metric atomicity is offered.
//!
//! ## Exposition
//!
//! [`MetricsCollector::render`] emits one line per label set:
//!
//! ```text
//! governance_runs_total{outcome="completed",tenant="acme"} 3
//! governance_run_duration_ms{quantile="0.95",tenant="acme"} 41
//! ```
//!
//! The fixed metrics in [`names::ALL`] come first in that order, then any
//! other series by name. Label keys are sorted and values escaped.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

/// Names of the metrics the engine records.
pub mod names {
    /// Counter; labels `tenant`, `outcome`.
    pub const RUNS_TOTAL: &str = "governance_runs_total";
    /// Counter; labels `tenant`, `triage`.
    pub const DECISIONS_TOTAL: &str = "governance_decisions_total";
    /// Counter; labels `tenant`, `action`.
    pub const ACTIONS_TOTAL: &str = "governance_actions_total";
    /// Counter; label `tenant`.
    pub const DUPLICATES_TOTAL: &str = "governance_duplicates_total";
    /// Counter; labels `tenant`, `type`.
    pub const INCIDENTS_TOTAL: &str = "governance_incidents_total";
    /// Gauge; label `tenant`.
    pub const CLOCK_DRIFT_MS: &str = "governance_clock_drift_ms";
    /// Gauge; label `tenant`.
    pub const LAST_RUN_RESOURCES: &str = "governance_last_run_resources";
    /// Histogram; label `tenant`.
    pub const RUN_DURATION_MS: &str = "governance_run_duration_ms";

    /// Every fixed metric, in exposition order.
    pub const ALL: [&str; 8] = [
        RUNS_TOTAL,
        DECISIONS_TOTAL,
        ACTIONS_TOTAL,
        DUPLICATES_TOTAL,
        INCIDENTS_TOTAL,
        CLOCK_DRIFT_MS,
        LAST_RUN_RESOURCES,
        RUN_DURATION_MS,
    ];
}

/// Quantiles rendered for each histogram series.
pub const EXPOSED_QUANTILES: [f64; 3] = [0.5, 0.95, 0.99];

/// Label set of a series, sorted by key.
pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SeriesKey {
    name: String,
    labels: Labels,
}

impl SeriesKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Thread-safe metric store.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: Mutex<BTreeMap<SeriesKey, f64>>,
    gauges: Mutex<BTreeMap<SeriesKey, f64>>,
    histograms: Mutex<BTreeMap<SeriesKey, Vec<f64>>>,
}

impl MetricsCollector {
    /// A fresh, empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to a counter.
    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.add_counter(name, labels, 1.0);
    }

    /// Add `delta` to a counter.
    pub fn add_counter(&self, name: &str, labels: &[(&str, &str)], delta: f64) {
        *self.counters.lock().entry(SeriesKey::new(name, labels)).or_insert(0.0) += delta;
    }

    /// Set a gauge.
    pub fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.gauges.lock().insert(SeriesKey::new(name, labels), value);
    }

    /// Record a histogram sample.
    pub fn record_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.histograms
            .lock()
            .entry(SeriesKey::new(name, labels))
            .or_default()
            .push(value);
    }

    /// Current counter value; zero if never incremented.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        self.counters
            .lock()
            .get(&SeriesKey::new(name, labels))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sum of a counter across every label set.
    pub fn counter_total(&self, name: &str) -> f64 {
        self.counters
            .lock()
            .iter()
            .filter(|(key, _)| key.name == name)
            .map(|(_, v)| v)
            .sum()
    }

    /// Current gauge value, if ever set.
    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.gauges.lock().get(&SeriesKey::new(name, labels)).copied()
    }

    /// Number of samples in a histogram series.
    pub fn histogram_count(&self, name: &str, labels: &[(&str, &str)]) -> usize {
        self.histograms
            .lock()
            .get(&SeriesKey::new(name, labels))
            .map_or(0, Vec::len)
    }

    /// Nearest-rank percentile `p` (0..=1) of a histogram series.
    pub fn percentile(&self, name: &str, labels: &[(&str, &str)], p: f64) -> Option<f64> {
        let samples = self
            .histograms
            .lock()
            .get(&SeriesKey::new(name, labels))
            .cloned()?;
        nearest_rank(samples, p)
    }

    /// Drop every series. For test isolation.
    pub fn reset(&self) {
        self.counters.lock().clear();
        self.gauges.lock().clear();
        self.histograms.lock().clear();
    }

    /// Render every series in text exposition format.
    pub fn render(&self) -> String {
        let mut lines: Vec<(SeriesKey, f64)> = Vec::new();
        lines.extend(self.counters.lock().iter().map(|(k, v)| (k.clone(), *v)));
        lines.extend(self.gauges.lock().iter().map(|(k, v)| (k.clone(), *v)));
        for (key, samples) in self.histograms.lock().iter() {
            for q in EXPOSED_QUANTILES {
                if let Some(value) = nearest_rank(samples.clone(), q) {
                    let mut labels = key.labels.clone();
                    labels.insert("quantile".to_string(), q.to_string());
                    lines.push((
                        SeriesKey {
                            name: key.name.clone(),
                            labels,
                        },
                        value,
                    ));
                }
            }
        }

        let rank = |name: &str| {
            names::ALL
                .iter()
                .position(|fixed| *fixed == name)
                .unwrap_or(names::ALL.len())
        };
        // Stable: within one metric, label sets keep map order and
        // quantiles keep ascending order.
        lines.sort_by(|(a, _), (b, _)| rank(&a.name).cmp(&rank(&b.name)).then_with(|| a.name.cmp(&b.name)));

        let mut out = String::new();
        for (key, value) in lines {
            let _ = writeln!(out, "{}{} {}", key.name, render_labels(&key.labels), value);
        }
        out
    }
}

fn nearest_rank(mut samples: Vec<f64>, p: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);
    let n = samples.len();
    let rank = (n as f64 * p).ceil() as i64 - 1;
    let index = rank.clamp(0, n as i64 - 1) as usize;
    Some(samples[index])
}

fn render_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let body: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label_value(v)))
        .collect();
    format!("{{{}}}", body.join(","))
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// The process-wide collector.
pub fn global() -> Arc<MetricsCollector> {
    static GLOBAL: OnceLock<Arc<MetricsCollector>> = OnceLock::new();
    GLOBAL.get_or_init(|| Arc::new(MetricsCollector::new())).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_keyed_by_label_set() {
        let m = MetricsCollector::new();
        m.increment_counter(names::RUNS_TOTAL, &[("tenant", "a"), ("outcome", "completed")]);
        m.increment_counter(names::RUNS_TOTAL, &[("outcome", "completed"), ("tenant", "a")]);
        m.increment_counter(names::RUNS_TOTAL, &[("tenant", "b"), ("outcome", "completed")]);
        assert_eq!(
            m.counter(names::RUNS_TOTAL, &[("tenant", "a"), ("outcome", "completed")]),
            2.0
        );
        assert_eq!(m.counter_total(names::RUNS_TOTAL), 3.0);
        assert_eq!(m.counter(names::RUNS_TOTAL, &[("tenant", "c")]), 0.0);
    }

    #[test]
    fn gauges_keep_last_value() {
        let m = MetricsCollector::new();
        m.set_gauge(names::CLOCK_DRIFT_MS, &[("tenant", "a")], 12.0);
        m.set_gauge(names::CLOCK_DRIFT_MS, &[("tenant", "a")], -3.0);
        assert_eq!(m.gauge(names::CLOCK_DRIFT_MS, &[("tenant", "a")]), Some(-3.0));
        assert_eq!(m.gauge(names::CLOCK_DRIFT_MS, &[("tenant", "b")]), None);
    }

    #[test]
    fn nearest_rank_percentiles() {
        let m = MetricsCollector::new();
        let labels = [("tenant", "a")];
        for v in [15.0, 20.0, 35.0, 40.0, 50.0] {
            m.record_histogram(names::RUN_DURATION_MS, &labels, v);
        }
        // n = 5: p30 -> ceil(1.5) - 1 = 1; p40 -> ceil(2.0) - 1 = 1; p100 -> 4.
        assert_eq!(m.percentile(names::RUN_DURATION_MS, &labels, 0.3), Some(20.0));
        assert_eq!(m.percentile(names::RUN_DURATION_MS, &labels, 0.4), Some(20.0));
        assert_eq!(m.percentile(names::RUN_DURATION_MS, &labels, 0.5), Some(35.0));
        assert_eq!(m.percentile(names::RUN_DURATION_MS, &labels, 1.0), Some(50.0));
        // Clamped at both ends.
        assert_eq!(m.percentile(names::RUN_DURATION_MS, &labels, 0.0), Some(15.0));
        assert_eq!(m.percentile(names::RUN_DURATION_MS, &labels, 7.0), Some(50.0));
        assert_eq!(m.percentile(names::RUN_DURATION_MS, &[("tenant", "x")], 0.5), None);
        assert_eq!(m.histogram_count(names::RUN_DURATION_MS, &labels), 5);
    }

    #[test]
    fn render_orders_fixed_metrics_and_escapes_values() {
        let m = MetricsCollector::new();
        m.record_histogram(names::RUN_DURATION_MS, &[("tenant", "a")], 10.0);
        m.set_gauge(names::LAST_RUN_RESOURCES, &[("tenant", "a")], 4.0);
        m.increment_counter("custom_total", &[]);
        m.increment_counter(names::INCIDENTS_TOTAL, &[("type", "poison_input"), ("tenant", "a")]);
        m.increment_counter(names::RUNS_TOTAL, &[("tenant", "we\"ird\\\n"), ("outcome", "completed")]);

        let rendered = m.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"governance_runs_total{outcome="completed",tenant="we\"ird\\\n"} 1"#,
                r#"governance_incidents_total{tenant="a",type="poison_input"} 1"#,
                r#"governance_last_run_resources{tenant="a"} 4"#,
                r#"governance_run_duration_ms{quantile="0.5",tenant="a"} 10"#,
                r#"governance_run_duration_ms{quantile="0.95",tenant="a"} 10"#,
                r#"governance_run_duration_ms{quantile="0.99",tenant="a"} 10"#,
                "custom_total 1",
            ]
        );
    }

    #[test]
    fn reset_clears_everything() {
        let m = MetricsCollector::new();
        m.increment_counter(names::DUPLICATES_TOTAL, &[("tenant", "a")]);
        m.record_histogram(names::RUN_DURATION_MS, &[("tenant", "a")], 1.0);
        m.reset();
        assert_eq!(m.render(), "");
    }

    #[test]
    fn global_is_shared() {
        let a = global();
        let b = global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let m = Arc::new(MetricsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        m.increment_counter(names::ACTIONS_TOTAL, &[("tenant", "a"), ("action", "tag")]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(
            m.counter(names::ACTIONS_TOTAL, &[("tenant", "a"), ("action", "tag")]),
            8000.0
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The nearest-rank percentile is always one of the samples and
            /// is monotone in `p`.
            #[test]
            fn percentile_is_a_sample_and_monotone(
                samples in prop::collection::vec(-1e6f64..1e6, 1..50),
                p in 0.0f64..=1.0,
                q in 0.0f64..=1.0,
            ) {
                let m = MetricsCollector::new();
                for s in &samples {
                    m.record_histogram("h", &[], *s);
                }
                let at_p = m.percentile("h", &[], p).unwrap();
                prop_assert!(samples.contains(&at_p));
                let (lo, hi) = if p <= q { (p, q) } else { (q, p) };
                prop_assert!(m.percentile("h", &[], lo).unwrap() <= m.percentile("h", &[], hi).unwrap());
            }
        }
    }
}
