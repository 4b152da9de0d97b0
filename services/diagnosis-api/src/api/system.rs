//! System/health API handlers.
//!
//! # Purpose and responsibility
//! Provides the service descriptor at `/`, process liveness at `/health`, and
//! the JSON fallback for unknown routes.
//!
//! # Key invariants and assumptions
//! - Health checks are read-only; the storage probe is a single `count`.
//! - `/health` answers 503 whenever storage is unreachable.
use crate::api::error::{ApiError, api_route_not_found};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use chrono::Utc;
use diagnosis_common::{HealthResponse, HealthServices};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceDescriptor {
    pub success: bool,
    pub message: String,
    pub version: String,
    pub documentation: String,
    pub health: String,
    pub endpoints: BTreeMap<String, String>,
}

#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses(
        (status = 200, description = "Service descriptor and endpoint list", body = ServiceDescriptor)
    )
)]
/// Describe the service and list its endpoints.
pub(crate) async fn root(State(state): State<AppState>) -> Json<ServiceDescriptor> {
    let endpoints = [
        ("GET /api/diagnoses/:clientId", "Get latest diagnosis for client"),
        ("POST /api/diagnoses/:clientId", "Create or update diagnosis"),
        ("PUT /api/diagnoses/:id", "Update diagnosis by ID"),
        ("GET /api/diagnoses/:clientId/history", "Get diagnosis history"),
        ("GET /api/diagnoses/by-id/:id", "Get diagnosis by ID"),
        ("GET /api/diagnoses/health", "Diagnosis service health"),
    ]
    .into_iter()
    .map(|(route, description)| (route.to_string(), description.to_string()))
    .collect();
    Json(ServiceDescriptor {
        success: true,
        message: "Welcome to the Diagnostic Support API".to_string(),
        version: state.version.clone(),
        documentation: "/api-docs".to_string(),
        health: "/health".to_string(),
        endpoints,
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Process and storage healthy", body = HealthResponse),
        (status = 503, description = "Storage unreachable", body = HealthResponse)
    )
)]
/// Report process liveness plus storage reachability.
///
/// # Errors
/// - Answers 503 (with the same body shape) if the storage probe fails.
pub(crate) async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_healthy = match state.store.count().await {
        Ok(total) => {
            metrics::gauge!("diagnosis_records_total").set(total as f64);
            true
        }
        Err(err) => {
            tracing::warn!(error = ?err, "storage health probe failed");
            false
        }
    };
    let status = if database_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        success: database_healthy,
        message: if database_healthy {
            "Diagnostic Support API is running".to_string()
        } else {
            "Service unhealthy".to_string()
        },
        timestamp: Utc::now(),
        environment: state.environment.clone(),
        version: state.version.clone(),
        services: HealthServices {
            api: "healthy".to_string(),
            database: if database_healthy {
                "healthy".to_string()
            } else {
                "unhealthy".to_string()
            },
        },
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };
    (status, Json(body))
}

/// JSON 404 for any unmatched route.
pub(crate) async fn route_not_found(method: Method, uri: Uri) -> ApiError {
    api_route_not_found(method.as_str(), uri.path())
}
