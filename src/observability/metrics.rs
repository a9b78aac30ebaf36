//! Metrics registry and Prometheus exposition.
//!
//! # Responsibilities
//! - Own every named instrument (counter, gauge, histogram)
//! - Hand out per-series handles keyed by label values
//! - Render a point-in-time text snapshot for the `/metrics` scrape
//!
//! # Design Decisions
//! - One registry per process, passed by handle (no global recorder)
//! - Series are created lazily on first use and never removed
//! - Label values must come from bounded sets (method, code, route, operation)
//! - Misuse is reported as `MetricsError`, never as a panic

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};
use std::fmt;

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Errors raised by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("metric `{0}` is already registered")]
    DuplicateName(String),

    #[error("metric `{0}` is not registered")]
    UnknownMetric(String),

    #[error("metric `{name}` is a {actual}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: MetricKind,
        actual: MetricKind,
    },

    #[error("counter increment must be a non-negative finite number, got {0}")]
    InvalidIncrement(f64),

    #[error("invalid labels or descriptor: {0}")]
    Labels(#[from] prometheus::Error),

    #[error("exposition is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Kind of a registered instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        })
    }
}

/// Description of an instrument to register.
#[derive(Debug, Clone)]
pub struct InstrumentSpec {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
    /// Ascending bucket boundaries; only used by histograms.
    pub buckets: Vec<f64>,
}

impl InstrumentSpec {
    pub fn counter(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, MetricKind::Counter)
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, MetricKind::Gauge)
    }

    pub fn histogram(name: impl Into<String>, help: impl Into<String>, buckets: &[f64]) -> Self {
        let mut spec = Self::new(name, help, MetricKind::Histogram);
        spec.buckets = buckets.to_vec();
        spec
    }

    /// Set the ordered label names.
    pub fn labels(mut self, names: &[&str]) -> Self {
        self.label_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    fn new(name: impl Into<String>, help: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            label_names: Vec::new(),
            buckets: Vec::new(),
        }
    }
}

#[derive(Clone)]
enum Instrument {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
}

impl Instrument {
    fn build(spec: &InstrumentSpec) -> Result<Self, MetricsError> {
        let labels: Vec<&str> = spec.label_names.iter().map(String::as_str).collect();
        let instrument = match spec.kind {
            MetricKind::Counter => {
                Instrument::Counter(CounterVec::new(Opts::new(&spec.name, &spec.help), &labels)?)
            }
            MetricKind::Gauge => {
                Instrument::Gauge(GaugeVec::new(Opts::new(&spec.name, &spec.help), &labels)?)
            }
            MetricKind::Histogram => {
                let mut opts = HistogramOpts::new(&spec.name, &spec.help);
                if !spec.buckets.is_empty() {
                    opts = opts.buckets(spec.buckets.clone());
                }
                Instrument::Histogram(HistogramVec::new(opts, &labels)?)
            }
        };
        Ok(instrument)
    }

    fn kind(&self) -> MetricKind {
        match self {
            Instrument::Counter(_) => MetricKind::Counter,
            Instrument::Gauge(_) => MetricKind::Gauge,
            Instrument::Histogram(_) => MetricKind::Histogram,
        }
    }

    fn collector(&self) -> Box<dyn prometheus::core::Collector> {
        match self {
            Instrument::Counter(v) => Box::new(v.clone()),
            Instrument::Gauge(v) => Box::new(v.clone()),
            Instrument::Histogram(v) => Box::new(v.clone()),
        }
    }
}

/// Process-wide metrics registry.
pub struct MetricsRegistry {
    registry: Registry,
    instruments: DashMap<String, Instrument>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            instruments: DashMap::new(),
        }
    }

    /// Register an instrument under its name.
    pub fn register(&self, spec: InstrumentSpec) -> Result<(), MetricsError> {
        match self.instruments.entry(spec.name.clone()) {
            Entry::Occupied(_) => Err(MetricsError::DuplicateName(spec.name)),
            Entry::Vacant(slot) => {
                let instrument = Instrument::build(&spec)?;
                self.registry.register(instrument.collector())?;
                tracing::debug!(metric = %spec.name, kind = %spec.kind, "Metric registered");
                slot.insert(instrument);
                Ok(())
            }
        }
    }

    pub fn counter(&self, name: &str) -> Result<CounterFamily, MetricsError> {
        match self.lookup(name)? {
            Instrument::Counter(vec) => Ok(CounterFamily(vec)),
            other => Err(mismatch(name, MetricKind::Counter, other.kind())),
        }
    }

    pub fn gauge(&self, name: &str) -> Result<GaugeFamily, MetricsError> {
        match self.lookup(name)? {
            Instrument::Gauge(vec) => Ok(GaugeFamily(vec)),
            other => Err(mismatch(name, MetricKind::Gauge, other.kind())),
        }
    }

    pub fn histogram(&self, name: &str) -> Result<HistogramFamily, MetricsError> {
        match self.lookup(name)? {
            Instrument::Histogram(vec) => Ok(HistogramFamily(vec)),
            other => Err(mismatch(name, MetricKind::Histogram, other.kind())),
        }
    }

    /// Render every instrument in the Prometheus text format.
    ///
    /// Families come out sorted by name and series sorted by label values,
    /// so two renders with no observations in between are identical.
    pub fn render(&self) -> Result<String, MetricsError> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn lookup(&self, name: &str) -> Result<Instrument, MetricsError> {
        self.instruments
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn mismatch(name: &str, expected: MetricKind, actual: MetricKind) -> MetricsError {
    MetricsError::KindMismatch {
        name: name.to_string(),
        expected,
        actual,
    }
}

/// All series of one counter.
#[derive(Clone)]
pub struct CounterFamily(CounterVec);

impl CounterFamily {
    pub fn labels(&self, values: &[&str]) -> Result<CounterSeries, MetricsError> {
        Ok(CounterSeries(self.0.get_metric_with_label_values(values)?))
    }
}

/// A single counter series.
#[derive(Clone)]
pub struct CounterSeries(Counter);

impl CounterSeries {
    pub fn increment(&self) {
        self.0.inc();
    }

    pub fn increment_by(&self, amount: f64) -> Result<(), MetricsError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(MetricsError::InvalidIncrement(amount));
        }
        self.0.inc_by(amount);
        Ok(())
    }

    pub fn value(&self) -> f64 {
        self.0.get()
    }
}

/// All series of one gauge.
#[derive(Clone)]
pub struct GaugeFamily(GaugeVec);

impl GaugeFamily {
    pub fn labels(&self, values: &[&str]) -> Result<GaugeSeries, MetricsError> {
        Ok(GaugeSeries(self.0.get_metric_with_label_values(values)?))
    }
}

/// A single gauge series.
#[derive(Clone)]
pub struct GaugeSeries(Gauge);

impl GaugeSeries {
    pub fn set(&self, value: f64) {
        self.0.set(value);
    }

    pub fn inc(&self) {
        self.0.inc();
    }

    pub fn dec(&self) {
        self.0.dec();
    }

    pub fn value(&self) -> f64 {
        self.0.get()
    }
}

/// All series of one histogram.
#[derive(Clone)]
pub struct HistogramFamily(HistogramVec);

impl HistogramFamily {
    pub fn labels(&self, values: &[&str]) -> Result<HistogramSeries, MetricsError> {
        Ok(HistogramSeries(self.0.get_metric_with_label_values(values)?))
    }
}

/// A single histogram series.
#[derive(Clone)]
pub struct HistogramSeries(Histogram);

impl HistogramSeries {
    pub fn observe(&self, value: f64) {
        self.0.observe(value);
    }

    pub fn sample_count(&self) -> u64 {
        self.0.get_sample_count()
    }
}
