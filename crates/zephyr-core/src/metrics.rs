//! Metrics sink: counters, gauges, histograms with labels.
//!
//! Invoked from every layer, owns nothing of its own beyond its
//! recorded numbers. Modeled the same way the step executor's
//! [`crate::logger::LoggerSink`] is — a small capability trait injected
//! by construction, never read off a global — so call sites don't care
//! whether they're talking to an in-memory sink (tests, CLI) or a real
//! exposition backend (the API's `/metrics` route).

use std::collections::HashMap;
use std::sync::Mutex;

pub type Labels<'a> = &'a [(&'a str, &'a str)];

pub trait MetricsSink: Send + Sync {
    fn incr_counter(&self, name: &str, labels: Labels<'_>);
    fn add_counter(&self, name: &str, value: u64, labels: Labels<'_>);
    fn set_gauge(&self, name: &str, value: f64, labels: Labels<'_>);
    fn observe_histogram(&self, name: &str, value: f64, labels: Labels<'_>);
}

fn key(name: &str, labels: Labels<'_>) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let mut pairs: Vec<_> = labels.to_vec();
    pairs.sort_unstable();
    let rendered = pairs
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}{{{rendered}}}")
}

#[derive(Debug, Default, Clone)]
struct HistogramState {
    count: u64,
    sum: f64,
}

/// In-process metrics sink backed by mutex-guarded maps. Good enough for
/// a single-node orchestrator with no distributed consensus to account
/// for; the API layer renders it as a small text exposition format on
/// `/metrics` rather than pulling in a full Prometheus client crate.
#[derive(Default)]
pub struct InMemoryMetricsSink {
    counters: Mutex<HashMap<String, u64>>,
    gauges: Mutex<HashMap<String, f64>>,
    histograms: Mutex<HashMap<String, HistogramState>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render all recorded series as a simple `name{labels} value` text
    /// exposition, one metric per line, sorted for deterministic output.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        let counters = self.counters.lock().unwrap();
        for (k, v) in counters.iter() {
            lines.push(format!("{k} {v}"));
        }
        drop(counters);

        let gauges = self.gauges.lock().unwrap();
        for (k, v) in gauges.iter() {
            lines.push(format!("{k} {v}"));
        }
        drop(gauges);

        let histograms = self.histograms.lock().unwrap();
        for (k, h) in histograms.iter() {
            lines.push(format!("{k}_count {}", h.count));
            lines.push(format!("{k}_sum {}", h.sum));
        }
        drop(histograms);

        lines.sort();
        lines.join("\n")
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn incr_counter(&self, name: &str, labels: Labels<'_>) {
        self.add_counter(name, 1, labels);
    }

    fn add_counter(&self, name: &str, value: u64, labels: Labels<'_>) {
        let mut counters = self.counters.lock().unwrap();
        *counters.entry(key(name, labels)).or_insert(0) += value;
    }

    fn set_gauge(&self, name: &str, value: f64, labels: Labels<'_>) {
        let mut gauges = self.gauges.lock().unwrap();
        gauges.insert(key(name, labels), value);
    }

    fn observe_histogram(&self, name: &str, value: f64, labels: Labels<'_>) {
        let mut histograms = self.histograms.lock().unwrap();
        let entry = histograms.entry(key(name, labels)).or_default();
        entry.count += 1;
        entry.sum += value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let sink = InMemoryMetricsSink::new();
        sink.incr_counter("jobs_total", &[("status", "success")]);
        sink.incr_counter("jobs_total", &[("status", "success")]);
        sink.incr_counter("jobs_total", &[("status", "failure")]);

        let rendered = sink.render();
        assert!(rendered.contains("jobs_total{status=\"success\"} 2"));
        assert!(rendered.contains("jobs_total{status=\"failure\"} 1"));
    }

    #[test]
    fn histogram_tracks_count_and_sum() {
        let sink = InMemoryMetricsSink::new();
        sink.observe_histogram("queue_wait_seconds", 1.5, &[]);
        sink.observe_histogram("queue_wait_seconds", 2.5, &[]);

        let rendered = sink.render();
        assert!(rendered.contains("queue_wait_seconds_count 2"));
        assert!(rendered.contains("queue_wait_seconds_sum 4"));
    }
}
