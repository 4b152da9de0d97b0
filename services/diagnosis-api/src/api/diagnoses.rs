//! Diagnosis API handlers.
//!
//! # Purpose and responsibility
//! Orchestrates the store calls behind `/api/diagnoses` and shapes the JSON
//! envelopes. All input checks happen in the extractors, so handlers only see
//! well-formed identifiers and validated payloads.
//!
//! # Key invariants and assumptions
//! - POST never adds a second record for a client; it overwrites the latest.
//! - History pages are clamped: `page >= 1`, `1 <= limit <= 50`.
use crate::api::error::{ApiError, api_from_store, api_internal};
use crate::api::extract::{ClientIdPath, DiagnosisIdPath, HistoryParams, ValidatedJson};
use crate::app::AppState;
use crate::store::UpsertOutcome;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use diagnosis_common::validation::HistoryQuery;
use diagnosis_common::{
    CreateDiagnosisRequest, DiagnosisListResponse, DiagnosisResponse, ErrorResponse,
    ServiceHealthResponse, UpdateDiagnosisRequest,
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;

const HEALTH_PROBE_ID: &str = "test-id-that-should-not-exist";
const SERVICE_NAME: &str = "diagnosis-api";

/// Resolve optional `page`/`limit` into clamped values.
pub fn clamp_page(query: HistoryQuery) -> (u32, u32) {
    let page = query.page.unwrap_or(DEFAULT_PAGE).clamp(1, i64::from(u32::MAX));
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    (page as u32, limit as u32)
}

#[utoipa::path(
    get,
    path = "/api/diagnoses/{clientId}",
    tag = "diagnoses",
    params(("clientId" = String, Path, description = "Client UUID")),
    responses(
        (status = 200, description = "Latest diagnosis for the client", body = DiagnosisResponse),
        (status = 400, description = "Invalid client ID", body = ErrorResponse),
        (status = 404, description = "No diagnosis for the client", body = ErrorResponse)
    )
)]
pub(crate) async fn get_latest(
    State(state): State<AppState>,
    ClientIdPath(client_id): ClientIdPath,
) -> Result<Json<DiagnosisResponse>, ApiError> {
    let diagnosis = state
        .store
        .find_latest_by_client(&client_id)
        .await
        .map_err(|err| {
            api_from_store(
                err,
                "No diagnosis found for this client",
                "find latest diagnosis",
            )
        })?;
    Ok(Json(DiagnosisResponse::ok(
        diagnosis,
        "Diagnosis retrieved successfully",
    )))
}

#[utoipa::path(
    post,
    path = "/api/diagnoses/{clientId}",
    tag = "diagnoses",
    params(("clientId" = String, Path, description = "Client UUID")),
    request_body = CreateDiagnosisRequest,
    responses(
        (status = 201, description = "First diagnosis created", body = DiagnosisResponse),
        (status = 200, description = "Latest diagnosis overwritten", body = DiagnosisResponse),
        (status = 400, description = "Validation error", body = ErrorResponse)
    )
)]
pub(crate) async fn upsert_by_client(
    State(state): State<AppState>,
    ClientIdPath(client_id): ClientIdPath,
    ValidatedJson(request): ValidatedJson<CreateDiagnosisRequest>,
) -> Result<(StatusCode, Json<DiagnosisResponse>), ApiError> {
    let (diagnosis, outcome) = state
        .store
        .upsert_latest_for_client(&client_id, request)
        .await
        .map_err(|err| api_internal("create or update diagnosis", &err))?;
    let (status, message) = match outcome {
        UpsertOutcome::Created => (StatusCode::CREATED, "Diagnosis created successfully"),
        UpsertOutcome::Updated => (StatusCode::OK, "Diagnosis updated successfully"),
    };
    tracing::info!(
        client_id = %client_id,
        diagnosis_id = %diagnosis.id,
        created = outcome == UpsertOutcome::Created,
        "diagnosis saved"
    );
    Ok((status, Json(DiagnosisResponse::ok(diagnosis, message))))
}

#[utoipa::path(
    put,
    path = "/api/diagnoses/{id}",
    tag = "diagnoses",
    params(("id" = String, Path, description = "Diagnosis id")),
    request_body = UpdateDiagnosisRequest,
    responses(
        (status = 200, description = "Diagnosis updated", body = DiagnosisResponse),
        (status = 400, description = "Validation error or empty update", body = ErrorResponse),
        (status = 404, description = "Diagnosis not found", body = ErrorResponse)
    )
)]
pub(crate) async fn update_by_id(
    State(state): State<AppState>,
    DiagnosisIdPath(id): DiagnosisIdPath,
    ValidatedJson(patch): ValidatedJson<UpdateDiagnosisRequest>,
) -> Result<Json<DiagnosisResponse>, ApiError> {
    let diagnosis = state
        .store
        .update(&id, patch)
        .await
        .map_err(|err| api_from_store(err, "Diagnosis not found", "update diagnosis"))?;
    Ok(Json(DiagnosisResponse::ok(
        diagnosis,
        "Diagnosis updated successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/api/diagnoses/by-id/{id}",
    tag = "diagnoses",
    params(("id" = String, Path, description = "Diagnosis id")),
    responses(
        (status = 200, description = "Diagnosis", body = DiagnosisResponse),
        (status = 400, description = "Invalid diagnosis ID", body = ErrorResponse),
        (status = 404, description = "Diagnosis not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_by_id(
    State(state): State<AppState>,
    DiagnosisIdPath(id): DiagnosisIdPath,
) -> Result<Json<DiagnosisResponse>, ApiError> {
    let diagnosis = state
        .store
        .find_by_id(&id)
        .await
        .map_err(|err| api_from_store(err, "Diagnosis not found", "find diagnosis"))?;
    Ok(Json(DiagnosisResponse::ok(
        diagnosis,
        "Diagnosis retrieved successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/api/diagnoses/{clientId}/history",
    tag = "diagnoses",
    params(
        ("clientId" = String, Path, description = "Client UUID"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Page size, default 10, max 50")
    ),
    responses(
        (status = 200, description = "History page, newest first", body = DiagnosisListResponse),
        (status = 400, description = "Validation error", body = ErrorResponse)
    )
)]
pub(crate) async fn list_history(
    State(state): State<AppState>,
    ClientIdPath(client_id): ClientIdPath,
    HistoryParams(query): HistoryParams,
) -> Result<Json<DiagnosisListResponse>, ApiError> {
    let (page, limit) = clamp_page(query);
    let skip = u64::from(page - 1) * u64::from(limit);
    let items = state
        .store
        .list_by_client(&client_id, skip, u64::from(limit))
        .await
        .map_err(|err| api_internal("list diagnosis history", &err))?;
    Ok(Json(DiagnosisListResponse::page(
        items,
        page,
        limit,
        "Diagnosis history retrieved successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/api/diagnoses/health",
    tag = "diagnoses",
    responses(
        (status = 200, description = "Diagnosis service healthy", body = ServiceHealthResponse),
        (status = 500, description = "Storage unavailable", body = ServiceHealthResponse)
    )
)]
pub(crate) async fn service_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<ServiceHealthResponse>) {
    match state.store.exists(HEALTH_PROBE_ID).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ServiceHealthResponse {
                success: true,
                message: "Diagnosis service is healthy".to_string(),
                timestamp: Utc::now(),
                service: SERVICE_NAME.to_string(),
                database: "connected".to_string(),
                error: None,
            }),
        ),
        Err(err) => {
            tracing::error!(error = ?err, "diagnosis service health probe failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ServiceHealthResponse {
                    success: false,
                    message: "Diagnosis service is unhealthy".to_string(),
                    timestamp: Utc::now(),
                    service: SERVICE_NAME.to_string(),
                    database: "disconnected".to_string(),
                    error: Some("Service health check failed".to_string()),
                }),
            )
        }
    }
}
