//! Route handlers.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::error::{ApiError, ErrorBody};
use crate::http::server::AppState;
use crate::observability::metrics::CONTENT_TYPE;
use crate::store::{StoreError, Task};

#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub environment: String,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    let defaults = state.telemetry.logger.defaults();
    Json(ServiceInfo {
        service: defaults.service.clone(),
        version: defaults.version.clone(),
        environment: defaults.environment.clone(),
    })
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "UP" })
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.telemetry.registry.render() {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    state
        .store
        .find_all()
        .await
        .map(Json)
        .map_err(|e| store_failure(&state, "Failed to fetch tasks", "find", e))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(document): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state
        .store
        .insert(document)
        .await
        .map_err(|e| store_failure(&state, "Failed to create task", "insert", e))?;
    state.telemetry.logger.info(
        "Task created",
        serde_json::json!({ "taskId": task.id, "operation": "insert" }),
    );
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn not_found(uri: Uri) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("no route for {}", uri.path()),
        }),
    )
}

fn store_failure(state: &AppState, message: &str, operation: &str, err: StoreError) -> ApiError {
    state
        .telemetry
        .logger
        .error(message, &err, serde_json::json!({ "operation": operation }));
    ApiError::from(&err)
}
