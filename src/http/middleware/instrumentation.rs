//! Request instrumentation middleware.
//!
//! # Lifecycle
//! ```text
//! Start (request arrives):
//!     start instant + CPU snapshot
//!     → active connections +1
//!     → memory gauges refreshed
//!
//! Completion (response body finished, failed or dropped):
//!     → duration histogram + request counter (method, route, code, status)
//!     → CPU delta added to the process CPU counter
//!     → active connections -1
//!     → one INFO access record
//! ```
//!
//! # Design Decisions
//! - Per-request state lives in `RequestMeasurement`, never in shared state
//! - Completion runs from `Drop`, so it happens exactly once whatever the
//!   outcome (finished body, aborted connection, cancelled handler)
//! - Telemetry errors and panics are swallowed; the response is untouched

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body::{Body as HttpBody, Frame, SizeHint};
use serde::Serialize;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::observability::process::CpuUsage;
use crate::observability::{MetricsError, RequestLabels, Telemetry};

/// Header carrying the distributed trace context.
pub const TRACE_HEADER: &str = "x-cloud-trace-context";

/// Status recorded when the client goes away before a response exists.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Route label for a request path. The root path gets a readable name.
pub fn route_label(path: &str) -> &str {
    if path == "/" {
        "root"
    } else {
        path
    }
}

/// Wrap every request in a `RequestMeasurement`.
pub async fn instrument_requests(
    State(telemetry): State<Telemetry>,
    request: Request,
    next: Next,
) -> Response {
    let mut measurement = RequestMeasurement::begin(telemetry, &request);
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let response_size = content_length(&parts.headers)
        .or_else(|| HttpBody::size_hint(&body).exact())
        .unwrap_or(0);
    measurement.respond(parts.status, response_size);

    Response::from_parts(parts, Body::new(MeasuredBody::new(body, measurement)))
}

/// What the middleware knows about the request when it starts.
#[derive(Debug, Clone)]
struct RequestInfo {
    method: String,
    path: String,
    request_size: u64,
    user_agent: String,
    remote_ip: String,
    trace: String,
}

impl RequestInfo {
    fn from_request(request: &Request) -> Self {
        let headers = request.headers();
        Self {
            method: request.method().as_str().to_string(),
            path: request.uri().path().to_string(),
            request_size: content_length(headers).unwrap_or(0),
            user_agent: header_str(headers, header::USER_AGENT.as_str()),
            remote_ip: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
                .unwrap_or_default(),
            trace: header_str(headers, TRACE_HEADER),
        }
    }
}

/// State of one in-flight request, from arrival to completion.
///
/// Dropping the value completes the measurement.
pub struct RequestMeasurement {
    telemetry: Telemetry,
    started: Instant,
    cpu_start: CpuUsage,
    info: RequestInfo,
    response: Option<(StatusCode, u64)>,
}

impl RequestMeasurement {
    pub fn begin(telemetry: Telemetry, request: &Request) -> Self {
        let started = Instant::now();
        let snapshot = telemetry.process.snapshot();
        let cpu_start = snapshot.cpu;
        let info = RequestInfo::from_request(request);

        best_effort("start", || {
            telemetry.metrics.connection_opened();
            telemetry.metrics.record_memory(&snapshot.memory)
        });

        Self {
            telemetry,
            started,
            cpu_start,
            info,
            response: None,
        }
    }

    /// Record the final status and size once the handler has produced them.
    pub fn respond(&mut self, status: StatusCode, response_size: u64) {
        self.response = Some((status, response_size));
    }

    fn complete(&mut self) {
        let elapsed = self.started.elapsed();
        let (status, response_size) = self.response.unwrap_or((
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST),
            0,
        ));
        let labels = RequestLabels {
            method: self.info.method.clone(),
            route: route_label(&self.info.path).to_string(),
            code: status.as_u16(),
        };
        let metrics = &self.telemetry.metrics;

        best_effort("record", || metrics.record_request(&labels, elapsed));
        best_effort("cpu", || {
            let cpu_end = self.telemetry.process.snapshot().cpu;
            metrics.add_cpu_seconds(cpu_end.seconds_since(&self.cpu_start))
        });
        best_effort("finish", || {
            metrics.connection_closed();
            Ok(())
        });
        best_effort("log", || {
            self.write_access_record(status.as_u16(), response_size, elapsed);
            Ok(())
        });
    }

    fn write_access_record(&self, status: u16, response_size: u64, elapsed: Duration) {
        let logger = &self.telemetry.logger;
        let record = AccessRecord {
            http_request: HttpRequestLog {
                request_method: &self.info.method,
                request_url: &self.info.path,
                request_size: self.info.request_size,
                status,
                response_size,
                user_agent: &self.info.user_agent,
                remote_ip: &self.info.remote_ip,
                latency: format!("{}ms", elapsed.as_millis()),
            },
            metadata: RequestMetadata {
                service: &logger.defaults().service,
                trace: &self.info.trace,
            },
        };
        logger.info(&format!("{} {}", self.info.method, self.info.path), record);
    }
}

impl Drop for RequestMeasurement {
    fn drop(&mut self) {
        self.complete();
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessRecord<'a> {
    http_request: HttpRequestLog<'a>,
    metadata: RequestMetadata<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequestLog<'a> {
    request_method: &'a str,
    request_url: &'a str,
    request_size: u64,
    status: u16,
    response_size: u64,
    user_agent: &'a str,
    remote_ip: &'a str,
    latency: String,
}

#[derive(Serialize)]
struct RequestMetadata<'a> {
    service: &'a str,
    trace: &'a str,
}

/// Response body that completes its measurement at end of stream.
///
/// If the body is dropped early (client disconnect) the measurement is
/// completed by its own `Drop` instead.
pub struct MeasuredBody {
    inner: Body,
    measurement: Option<RequestMeasurement>,
}

impl MeasuredBody {
    pub fn new(inner: Body, measurement: RequestMeasurement) -> Self {
        Self {
            inner,
            measurement: Some(measurement),
        }
    }
}

impl HttpBody for MeasuredBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.measurement.take();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

fn best_effort<F>(stage: &'static str, f: F)
where
    F: FnOnce() -> Result<(), MetricsError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(stage, error = %e, "Dropped telemetry update"),
        Err(_) => tracing::debug!(stage, "Telemetry update panicked"),
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
