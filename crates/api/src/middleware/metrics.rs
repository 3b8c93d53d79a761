//! Prometheus metrics.
//!
//! HTTP traffic is recorded by [`metrics_middleware`]; handlers add business
//! counters for visit transitions and credential checks.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use crate::app::AppState;
use crate::error::ApiError;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Records `http_requests_total{method,path,status}` and
/// `http_request_duration_seconds{method,path}`.
///
/// The path label is the matched route template, so ids never become labels.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().as_str().to_owned();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(req).await;

    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Counts a committed visit-request transition (`approve`, `deny`, ...).
pub fn record_transition(transition: &'static str) {
    counter!("visit_transitions_total", "transition" => transition).increment(1);
}

/// Counts a gate credential check by outcome.
pub fn record_verification<T>(result: &Result<T, ApiError>) {
    let outcome = match result {
        Ok(_) => "valid",
        Err(ApiError::NotFound(_)) => "unknown",
        Err(ApiError::CredentialNotApproved) => "not_approved",
        Err(ApiError::CredentialExpired) => "expired",
        Err(_) => "error",
    };
    counter!("credential_verifications_total", "outcome" => outcome).increment(1);
}

/// `GET /metrics`: Prometheus text format, refreshing pool gauges first.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(handle) = PROMETHEUS_HANDLE.get() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized").into_response();
    };
    if let Some(pool) = &state.pool {
        persistence::metrics::record_pool_metrics(pool);
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

/// Installs the global Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<(), BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0])?
        .install_recorder()?;
    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus recorder already initialized");
    }
    Ok(())
}
