//! HTTP API for resource resolution, health checks and Prometheus metrics

use admission_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{AdmissionMetrics, StructuredLogger},
    recommendation::{PodResources, Provider, DEFAULT_NAMESPACE},
    AnnotationOverrides, ContainerToAnnotationsMap, VerticalPodAutoscaler,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use k8s_openapi::api::core::v1::Pod;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: AdmissionMetrics,
    pub logger: StructuredLogger,
    pub provider: Arc<dyn Provider>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: AdmissionMetrics,
        logger: StructuredLogger,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            logger,
            provider,
        }
    }
}

/// Pod and VPA pair submitted for resolution
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub pod: Option<Pod>,
    #[serde(default)]
    pub vpa: Option<VerticalPodAutoscaler>,
}

/// Returned with 422; the caller must not patch the pod
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub annotations: ContainerToAnnotationsMap,
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Resolve the requests and limits to inject into a pod.
///
/// 204 when the pod or VPA is missing, so there is nothing to apply.
async fn resolve_resources(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResolveRequest>,
) -> Response {
    let started = Instant::now();
    let pod_name = request
        .pod
        .as_ref()
        .and_then(|pod| pod.metadata.name.clone())
        .unwrap_or_default();
    let namespace = request
        .pod
        .as_ref()
        .and_then(|pod| pod.metadata.namespace.clone())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    let result = state
        .provider
        .get_containers_resources_for_pod(request.pod.as_ref(), request.vpa.as_ref());
    state
        .metrics
        .observe_resolution_latency(started.elapsed().as_secs_f64());

    match result {
        Ok(Some(resources)) => {
            record_success(&state, &request, &resources, &pod_name, &namespace);
            (StatusCode::OK, Json(resources)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            state.metrics.inc_resolution_errors(e.kind());
            state
                .logger
                .log_resolution_failure(&pod_name, &namespace, e.kind(), &e.to_string());
            let body = ErrorResponse {
                error: e.to_string(),
                annotations: e.annotations().cloned().unwrap_or_default(),
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
        }
    }
}

fn record_success(
    state: &AppState,
    request: &ResolveRequest,
    resources: &PodResources,
    pod_name: &str,
    namespace: &str,
) {
    state.metrics.inc_pods_resolved();
    state.metrics.add_limits_capped(resources.limit_notes);

    let empty = BTreeMap::new();
    let annotations = request
        .vpa
        .as_ref()
        .and_then(|vpa| vpa.annotations())
        .unwrap_or(&empty);
    if AnnotationOverrides::resolve(annotations).should_amend() {
        state.metrics.inc_overrides_applied();
    }

    state.logger.log_resolution(
        pod_name,
        namespace,
        resources.containers.len(),
        &resources.annotations,
    );
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/resources", post(resolve_resources))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
