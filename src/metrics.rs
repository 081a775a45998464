//! Latency histograms for the request path and the model loader.
//! Each metric keeps a bounded window of recent samples in microseconds;
//! summaries report p50/p95/p99, mean and max over that window.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_WINDOW: usize = 1024;

/// Fresh id attached to each request's tracing span.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Measures one timing point. Records only on `finish`, so a span dropped
/// on an error path leaves the histogram untouched.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// Record the elapsed time and return it in microseconds.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Sliding window of the most recent samples.
struct Window {
    samples: VecDeque<f64>,
    limit: usize,
    total: u64,
}

impl Window {
    fn new(limit: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(limit),
            limit,
            total: 0,
        }
    }

    fn push(&mut self, value: f64) {
        if self.samples.len() == self.limit {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.total += 1;
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    fn summarize(&self) -> MetricSummary {
        let sorted = self.sorted();
        let mean = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };
        MetricSummary {
            p50_us: rank(&sorted, 50.0),
            p95_us: rank(&sorted, 95.0),
            p99_us: rank(&sorted, 99.0),
            mean_us: mean,
            max_us: sorted.last().copied().unwrap_or(0.0),
            count: sorted.len(),
            total: self.total,
        }
    }
}

/// Nearest-rank percentile over an ascending slice; 0 when empty.
fn rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

pub struct MetricsRegistry {
    windows: Mutex<HashMap<&'static str, Window>>,
    window: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Registry keeping `window` samples per metric.
    pub fn with_window(window: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window: window.max(1),
        }
    }

    /// Record a sample in microseconds.
    pub fn record(&self, name: &'static str, value_us: f64) {
        self.windows
            .lock()
            .entry(name)
            .or_insert_with(|| Window::new(self.window))
            .push(value_us);
        tracing::trace!(metric = name, value_us, "metric_recorded");
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Percentile (p in 0-100) in microseconds, or `None` with no samples.
    pub fn percentile(&self, name: &str, p: f64) -> Option<f64> {
        let windows = self.windows.lock();
        let window = windows.get(name).filter(|w| !w.samples.is_empty())?;
        Some(rank(&window.sorted(), p))
    }

    /// Samples currently in the window.
    pub fn count(&self, name: &str) -> usize {
        self.windows
            .lock()
            .get(name)
            .map_or(0, |w| w.samples.len())
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        self.windows
            .lock()
            .iter()
            .map(|(&name, window)| (name.to_string(), window.summarize()))
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub mean_us: f64,
    pub max_us: f64,
    /// Samples in the window.
    pub count: usize,
    /// Samples ever recorded.
    pub total: u64,
}

pub mod metric_names {
    /// Cache miss through pipeline completion.
    pub const TRANSLATE_TOTAL: &str = "t_translate_total";
    pub const CACHE_HIT: &str = "t_cache_hit";
    pub const MODEL_WAIT: &str = "t_model_wait";
    pub const PIPELINE: &str = "t_pipeline";
    pub const MODEL_LOAD: &str = "t_model_load";
    /// Async path: time spent waiting for a worker permit.
    pub const WORKER_QUEUE_WAIT: &str = "queue_wait_worker";
}
