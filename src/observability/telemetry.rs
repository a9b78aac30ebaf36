//! Application instruments and the telemetry handle passed to handlers.
//!
//! # Metrics
//! - `http_request_duration_seconds` (histogram): method, route, code, status
//! - `http_requests_total` (counter): method, route, code, status
//! - `nodejs_memory_usage_bytes` (gauge): type
//! - `nodejs_cpu_usage_seconds_total` (counter): no labels
//! - `nodejs_active_connections` (gauge): no labels
//! - `mongodb_operations_total` (counter): operation, status

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::logging::{LogDefaults, Logger, Severity};
use crate::observability::metrics::{
    CounterFamily, CounterSeries, GaugeFamily, GaugeSeries, HistogramFamily, InstrumentSpec,
    MetricsError, MetricsRegistry,
};
use crate::observability::process::{MemorySample, ProcessSampler};

pub const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const MEMORY_USAGE: &str = "nodejs_memory_usage_bytes";
pub const CPU_USAGE: &str = "nodejs_cpu_usage_seconds_total";
pub const ACTIVE_CONNECTIONS: &str = "nodejs_active_connections";
pub const STORE_OPERATIONS: &str = "mongodb_operations_total";

/// Histogram buckets for request latency, in seconds.
pub const HTTP_DURATION_BUCKETS: [f64; 9] = [0.1, 0.3, 0.5, 0.7, 1.0, 3.0, 5.0, 7.0, 10.0];

/// Outcome of a request, derived from its status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub fn from_status(code: u16) -> Self {
        if code < 400 {
            Outcome::Success
        } else {
            Outcome::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

/// Lifecycle stage of a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Success,
    Error,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Success => "success",
            OperationStatus::Error => "error",
        }
    }
}

/// Label values shared by the request counter and the duration histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLabels {
    pub method: String,
    pub route: String,
    pub code: u16,
}

impl RequestLabels {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_status(self.code)
    }
}

/// Typed handles to the application's instruments.
#[derive(Clone)]
pub struct AppMetrics {
    request_duration: HistogramFamily,
    requests_total: CounterFamily,
    memory_usage: GaugeFamily,
    cpu_usage: CounterSeries,
    active_connections: GaugeSeries,
    store_operations: CounterFamily,
}

impl AppMetrics {
    /// Register every application instrument in `registry`.
    pub fn register(registry: &MetricsRegistry) -> Result<Self, MetricsError> {
        let request_labels = ["method", "route", "code", "status"];
        registry.register(
            InstrumentSpec::histogram(
                HTTP_REQUEST_DURATION,
                "Duration of HTTP requests in seconds",
                &HTTP_DURATION_BUCKETS,
            )
            .labels(&request_labels),
        )?;
        registry.register(
            InstrumentSpec::counter(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests")
                .labels(&request_labels),
        )?;
        registry.register(
            InstrumentSpec::gauge(MEMORY_USAGE, "Process memory usage in bytes").labels(&["type"]),
        )?;
        registry.register(InstrumentSpec::counter(
            CPU_USAGE,
            "Total user and system CPU time spent in seconds",
        ))?;
        registry.register(InstrumentSpec::gauge(
            ACTIVE_CONNECTIONS,
            "Number of requests currently being served",
        ))?;
        registry.register(
            InstrumentSpec::counter(STORE_OPERATIONS, "Total number of task store operations")
                .labels(&["operation", "status"]),
        )?;

        Ok(Self {
            request_duration: registry.histogram(HTTP_REQUEST_DURATION)?,
            requests_total: registry.counter(HTTP_REQUESTS_TOTAL)?,
            memory_usage: registry.gauge(MEMORY_USAGE)?,
            cpu_usage: registry.counter(CPU_USAGE)?.labels(&[])?,
            active_connections: registry.gauge(ACTIVE_CONNECTIONS)?.labels(&[])?,
            store_operations: registry.counter(STORE_OPERATIONS)?,
        })
    }

    /// One histogram observation and one counter increment, same labels.
    pub fn record_request(&self, labels: &RequestLabels, elapsed: Duration) -> Result<(), MetricsError> {
        let code = labels.code.to_string();
        let values = [
            labels.method.as_str(),
            labels.route.as_str(),
            code.as_str(),
            labels.outcome().as_str(),
        ];
        let histogram = self.request_duration.labels(&values)?;
        let counter = self.requests_total.labels(&values)?;
        histogram.observe(elapsed.as_secs_f64());
        counter.increment();
        Ok(())
    }

    pub fn record_memory(&self, sample: &MemorySample) -> Result<(), MetricsError> {
        for (kind, bytes) in sample.series() {
            self.memory_usage.labels(&[kind])?.set(bytes as f64);
        }
        Ok(())
    }

    pub fn add_cpu_seconds(&self, seconds: f64) -> Result<(), MetricsError> {
        self.cpu_usage.increment_by(seconds)
    }

    pub fn connection_opened(&self) {
        self.active_connections.inc();
    }

    pub fn connection_closed(&self) {
        self.active_connections.dec();
    }

    pub fn active_connections(&self) -> f64 {
        self.active_connections.value()
    }

    pub fn record_store_operation(
        &self,
        operation: &str,
        status: OperationStatus,
    ) -> Result<(), MetricsError> {
        self.store_operations
            .labels(&[operation, status.as_str()])?
            .increment();
        Ok(())
    }
}

/// Registry, typed instruments, logger and process sampler, built once per process.
#[derive(Clone)]
pub struct Telemetry {
    pub registry: Arc<MetricsRegistry>,
    pub metrics: AppMetrics,
    pub logger: Arc<Logger>,
    pub process: Arc<ProcessSampler>,
}

impl Telemetry {
    pub fn new(defaults: LogDefaults, level: Severity) -> Result<Self, MetricsError> {
        Self::with_logger(Logger::stdout(defaults, level))
    }

    pub fn with_sink(
        defaults: LogDefaults,
        level: Severity,
        sink: Box<dyn Write + Send>,
    ) -> Result<Self, MetricsError> {
        Self::with_logger(Logger::with_sink(defaults, level, sink))
    }

    fn with_logger(logger: Logger) -> Result<Self, MetricsError> {
        let registry = MetricsRegistry::new();
        let metrics = AppMetrics::register(&registry)?;
        Ok(Self {
            registry: Arc::new(registry),
            metrics,
            logger: Arc::new(logger),
            process: Arc::new(ProcessSampler::new()),
        })
    }
}
