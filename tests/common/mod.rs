//! Shared helpers for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

use cloud_native_app::config::AppConfig;
use cloud_native_app::observability::{LogDefaults, MemorySink, Severity, Telemetry};
use cloud_native_app::store::{MemoryTaskStore, StoreError, Task, TaskStore};
use cloud_native_app::HttpServer;

/// An in-process app with a captured log stream.
pub struct TestApp {
    pub router: Router,
    pub telemetry: Telemetry,
    pub logs: MemorySink,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryTaskStore::new()))
    }

    pub fn with_store(store: Arc<dyn TaskStore>) -> Self {
        Self::with_config(AppConfig::default(), store)
    }

    pub fn with_config(config: AppConfig, store: Arc<dyn TaskStore>) -> Self {
        let logs = MemorySink::new();
        let telemetry = test_telemetry(&logs);
        let server = HttpServer::new(config, telemetry.clone(), store);
        Self {
            router: server.router(),
            telemetry,
            logs,
        }
    }

    /// Send a request and read the whole body, which completes the measurement.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        self.send(Request::get(path).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, path: &str, body: &str) -> (StatusCode, String) {
        let request = Request::post(path)
            .header("content-type", "application/json")
            .header("content-length", body.len())
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub fn render(&self) -> String {
        self.telemetry.registry.render().unwrap()
    }

    /// Current value of one series; label order does not matter.
    pub fn sample(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        sample(&self.render(), name, labels)
    }
}

pub fn test_telemetry(logs: &MemorySink) -> Telemetry {
    let defaults = LogDefaults {
        service: "cloud-native-app".into(),
        environment: "test".into(),
        version: "1.0.0".into(),
    };
    Telemetry::with_sink(defaults, Severity::Info, Box::new(logs.clone())).unwrap()
}

/// Read a series value out of rendered exposition text; missing series read as 0.
pub fn sample(exposition: &str, name: &str, labels: &[(&str, &str)]) -> f64 {
    let mut expected: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    expected.sort();

    series(exposition)
        .into_iter()
        .find(|s| s.name == name && s.labels == expected)
        .map(|s| s.value)
        .unwrap_or(0.0)
}

/// One parsed exposition line.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    /// Sorted by label name.
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

/// Parse every sample line; panics on malformed lines.
pub fn series(exposition: &str) -> Vec<Series> {
    exposition
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let (head, value) = line.rsplit_once(' ').expect("sample line has a value");
            let value: f64 = match value {
                "+Inf" => f64::INFINITY,
                v => v.parse().expect("numeric sample value"),
            };
            let (name, mut labels) = match head.split_once('{') {
                Some((name, rest)) => {
                    let body = rest.strip_suffix('}').expect("closing brace");
                    (name.to_string(), parse_labels(body))
                }
                None => (head.to_string(), Vec::new()),
            };
            labels.sort();
            Series { name, labels, value }
        })
        .collect()
}

fn parse_labels(body: &str) -> Vec<(String, String)> {
    let mut labels = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        let (key, after) = rest.split_once("=\"").expect("label key");
        let mut value = String::new();
        let mut chars = after.char_indices();
        let mut end = after.len();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                }
                '"' => {
                    end = i + 1;
                    break;
                }
                c => value.push(c),
            }
        }
        labels.push((key.to_string(), value));
        rest = after[end..].trim_start_matches(',');
    }
    labels
}

/// A store whose backend is always down.
pub struct FailingStore;

#[async_trait]
impl TaskStore for FailingStore {
    async fn find_all(&self) -> Result<Vec<Task>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn insert(&self, _document: serde_json::Value) -> Result<Task, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn close(&self) {}
}

/// A store whose reads crash the handler.
pub struct PanickingStore;

#[async_trait]
impl TaskStore for PanickingStore {
    async fn find_all(&self) -> Result<Vec<Task>, StoreError> {
        panic!("corrupted task index");
    }

    async fn insert(&self, _document: serde_json::Value) -> Result<Task, StoreError> {
        Err(StoreError::Unavailable("read-only".into()))
    }

    async fn close(&self) {}
}

/// A store whose reads take longer than any test timeout.
pub struct SlowStore(pub std::time::Duration);

#[async_trait]
impl TaskStore for SlowStore {
    async fn find_all(&self) -> Result<Vec<Task>, StoreError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }

    async fn insert(&self, _document: serde_json::Value) -> Result<Task, StoreError> {
        Err(StoreError::Unavailable("read-only".into()))
    }

    async fn close(&self) {}
}
