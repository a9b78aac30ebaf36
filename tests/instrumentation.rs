//! End-to-end checks of the request measurement pipeline, driven in-process.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use cloud_native_app::config::AppConfig;
use cloud_native_app::store::MemoryTaskStore;

mod common;

use common::{FailingStore, PanickingStore, SlowStore, TestApp};

const REQUESTS: &str = "http_requests_total";
const DURATION_COUNT: &str = "http_request_duration_seconds_count";
const ACTIVE: &str = "nodejs_active_connections";
const STORE_OPS: &str = "mongodb_operations_total";

fn request_labels<'a>(
    method: &'a str,
    route: &'a str,
    code: &'a str,
    status: &'a str,
) -> [(&'a str, &'a str); 4] {
    [("method", method), ("route", route), ("code", code), ("status", status)]
}

#[tokio::test]
async fn health_check_is_counted_as_success() {
    let app = TestApp::new();
    let labels = request_labels("GET", "/health", "200", "success");
    let before = app.sample(REQUESTS, &labels);

    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"UP"}"#);
    assert_eq!(app.sample(REQUESTS, &labels), before + 1.0);
}

#[tokio::test]
async fn counter_and_histogram_move_together() {
    let app = TestApp::new();
    app.get("/health").await;
    app.get("/health").await;
    app.get("/nowhere").await;

    let ok = request_labels("GET", "/health", "200", "success");
    assert_eq!(app.sample(REQUESTS, &ok), 2.0);
    assert_eq!(app.sample(DURATION_COUNT, &ok), 2.0);

    let missing = request_labels("GET", "/nowhere", "404", "error");
    assert_eq!(app.sample(REQUESTS, &missing), 1.0);
    assert_eq!(app.sample(DURATION_COUNT, &missing), 1.0);
}

#[tokio::test]
async fn root_path_uses_root_label() {
    let app = TestApp::new();
    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("cloud-native-app"));

    assert_eq!(
        app.sample(REQUESTS, &request_labels("GET", "root", "200", "success")),
        1.0
    );
    assert!(!app.render().contains(r#"route="/""#));
}

#[tokio::test]
async fn failed_insert_is_a_500_with_error_record() {
    let app = TestApp::new();

    let (status, body) = app
        .post_json("/api/tasks", r#"{"description":"no title here"}"#)
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Task validation failed"));
    assert_eq!(
        app.sample(STORE_OPS, &[("operation", "insert"), ("status", "error")]),
        1.0
    );
    assert_eq!(
        app.sample(REQUESTS, &request_labels("POST", "/api/tasks", "500", "error")),
        1.0
    );

    let records = app.logs.records();
    let error = records
        .iter()
        .find(|r| r["severity"] == "ERROR")
        .expect("error record");
    assert_eq!(error["message"], "Failed to create task");
    assert!(error["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Task validation failed"));
}

#[tokio::test]
async fn body_that_is_not_json_never_reaches_the_store() {
    let app = TestApp::new();
    let (status, _) = app.post_json("/api/tasks", "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.sample(STORE_OPS, &[("operation", "insert"), ("status", "pending")]),
        0.0
    );
    assert_eq!(
        app.sample(REQUESTS, &request_labels("POST", "/api/tasks", "400", "error")),
        1.0
    );
}

#[tokio::test]
async fn created_task_is_listed() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/api/tasks", r#"{"title":"ship it","completed":true}"#)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let created: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(created["title"], "ship it");

    let (status, body) = app.get("/api/tasks").await;
    assert_eq!(status, StatusCode::OK);
    let tasks: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], created["id"]);

    for (operation, status) in [("insert", "pending"), ("insert", "success"), ("find", "success")] {
        assert_eq!(
            app.sample(STORE_OPS, &[("operation", operation), ("status", status)]),
            1.0
        );
    }
}

#[tokio::test]
async fn store_outage_surfaces_as_500() {
    let app = TestApp::with_store(Arc::new(FailingStore));
    let (status, body) = app.get("/api/tasks").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("connection refused"));
    assert_eq!(
        app.sample(STORE_OPS, &[("operation", "find"), ("status", "error")]),
        1.0
    );
}

#[tokio::test]
async fn oversized_body_is_rejected_and_measured() {
    let mut config = AppConfig::default();
    config.server.max_body_bytes = 16;
    let app = TestApp::with_config(config, Arc::new(MemoryTaskStore::new()));

    let (status, _) = app
        .post_json("/api/tasks", r#"{"title":"far more than sixteen bytes"}"#)
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        app.sample(REQUESTS, &request_labels("POST", "/api/tasks", "413", "error")),
        1.0
    );
}

#[tokio::test]
async fn handler_panic_is_a_measured_500() {
    let app = TestApp::with_store(Arc::new(PanickingStore));

    let (status, body) = app.get("/api/tasks").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Internal server error"));
    assert_eq!(
        app.sample(REQUESTS, &request_labels("GET", "/api/tasks", "500", "error")),
        1.0
    );
    assert_eq!(
        app.sample(REQUESTS, &request_labels("GET", "/api/tasks", "499", "error")),
        0.0
    );
    assert_eq!(app.sample(ACTIVE, &[]), 0.0);

    let records = app.logs.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["httpRequest"]["status"], 500);
}

#[tokio::test]
async fn slow_handler_times_out_as_408() {
    let mut config = AppConfig::default();
    config.server.request_timeout_secs = 1;
    let app = TestApp::with_config(config, Arc::new(SlowStore(Duration::from_secs(10))));

    let (status, _) = app.get("/api/tasks").await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(
        app.sample(REQUESTS, &request_labels("GET", "/api/tasks", "408", "error")),
        1.0
    );
    assert_eq!(
        app.sample(DURATION_COUNT, &request_labels("GET", "/api/tasks", "408", "error")),
        1.0
    );
    assert_eq!(app.sample(ACTIVE, &[]), 0.0);
    assert_eq!(
        app.sample(STORE_OPS, &[("operation", "find"), ("status", "pending")]),
        1.0
    );
    assert_eq!(
        app.sample(STORE_OPS, &[("operation", "find"), ("status", "success")]),
        0.0
    );
}

#[tokio::test]
async fn active_connections_return_to_baseline() {
    let app = TestApp::new();
    let baseline = app.sample(ACTIVE, &[]);

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(app.sample(ACTIVE, &[]), baseline + 1.0);

    // Headers were produced but the body was never read: the client went away.
    drop(response);
    assert_eq!(app.sample(ACTIVE, &[]), baseline);
    assert_eq!(
        app.sample(REQUESTS, &request_labels("GET", "/health", "200", "success")),
        1.0
    );

    app.get("/api/tasks").await;
    app.get("/missing").await;
    assert_eq!(app.sample(ACTIVE, &[]), baseline);
}

#[tokio::test]
async fn memory_and_cpu_series_are_exposed() {
    let app = TestApp::new();
    app.get("/health").await;

    let text = app.render();
    for kind in ["rss", "heapTotal", "heapUsed", "external"] {
        assert!(
            text.contains(&format!(r#"nodejs_memory_usage_bytes{{type="{kind}"}}"#)),
            "missing memory series {kind}"
        );
    }
    assert!(app.sample("nodejs_cpu_usage_seconds_total", &[]) >= 0.0);
    assert!(text.contains("nodejs_cpu_usage_seconds_total "));
}

#[tokio::test]
async fn render_is_idempotent() {
    let app = TestApp::new();
    app.get("/health").await;
    app.post_json("/api/tasks", r#"{"title":"a"}"#).await;

    assert_eq!(app.render(), app.render());
}

#[tokio::test]
async fn metrics_endpoint_serves_exposition() {
    let app = TestApp::new();
    app.get("/health").await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("# TYPE http_request_duration_seconds histogram"));
    assert!(text.contains(r#"le="0.1""#));
    assert!(text.contains(r#"le="10""#));
}

#[tokio::test]
async fn every_request_writes_one_access_record() {
    let app = TestApp::new();
    let request = Request::get("/health")
        .header("user-agent", "kube-probe/1.29")
        .header("x-cloud-trace-context", "105445aa7843bc8bf206b12000100000/1;o=1")
        .body(Body::empty())
        .unwrap();
    app.send(request).await;
    app.get("/nowhere").await;

    let records = app.logs.records();
    assert_eq!(records.len(), 2);

    let health = &records[0];
    assert_eq!(health["severity"], "INFO");
    assert_eq!(health["message"], "GET /health");
    assert_eq!(health["httpRequest"]["status"], 200);
    assert_eq!(health["httpRequest"]["requestSize"], 0);
    assert!(health["httpRequest"]["responseSize"].as_u64().is_some());
    assert!(health["httpRequest"]["latency"].as_str().unwrap().ends_with("ms"));
    assert_eq!(health["httpRequest"]["userAgent"], "kube-probe/1.29");
    assert_eq!(
        health["metadata"]["trace"],
        "105445aa7843bc8bf206b12000100000/1;o=1"
    );
    assert_eq!(health["metadata"]["service"], "cloud-native-app");

    let missing = &records[1];
    assert_eq!(missing["message"], "GET /nowhere");
    assert_eq!(missing["httpRequest"]["status"], 404);
    assert_eq!(missing["metadata"]["trace"], "");
}

#[tokio::test]
async fn concurrent_scrapes_see_complete_label_sets() {
    let app = Arc::new(TestApp::new());
    let mut handles = Vec::new();

    for i in 0..32 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                let path = if i % 4 == 0 { "/health" } else { "/nowhere" };
                app.get(path).await;
                None
            } else {
                let (status, body) = app.get("/metrics").await;
                assert_eq!(status, StatusCode::OK);
                Some(body)
            }
        }));
    }

    for handle in handles {
        if let Some(body) = handle.await.unwrap() {
            for series in common::series(&body) {
                if series.name == REQUESTS {
                    let names: Vec<_> = series.labels.iter().map(|(k, _)| k.as_str()).collect();
                    assert_eq!(names, ["code", "method", "route", "status"]);
                }
            }
        }
    }

    assert_eq!(app.sample(ACTIVE, &[]), 0.0);
}
