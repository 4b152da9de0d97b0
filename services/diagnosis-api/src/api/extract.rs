//! Validating extractors.
//!
//! Each extractor rejects with a 400 validation envelope before the handler
//! runs. Path extractors run before the body extractor because axum resolves
//! `FromRequestParts` arguments first.
use crate::api::error::{ApiError, api_validation_error};
use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Json, Path, Query, Request};
use axum::http::request::Parts;
use diagnosis_common::validation::{HistoryQuery, validate_client_id, validate_diagnosis_id};
use diagnosis_common::{BodySchema, ClientId, DiagnosisId, FieldError};
use serde_json::Value;
use std::collections::HashMap;

async fn single_segment<S: Send + Sync>(
    parts: &mut Parts,
    state: &S,
    field: &str,
) -> Result<String, ApiError> {
    Path::<String>::from_request_parts(parts, state)
        .await
        .map(|Path(raw)| raw)
        .map_err(|rejection| {
            api_validation_error(vec![FieldError::new(field, rejection.body_text())])
        })
}

/// The `clientId` path segment, parsed as a hyphenated UUID.
pub struct ClientIdPath(pub ClientId);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = single_segment(parts, state, "clientId").await?;
        validate_client_id(&raw)
            .map(ClientIdPath)
            .map_err(|err| api_validation_error(vec![err]))
    }
}

/// The diagnosis `id` path segment, checked against the CUID shape.
pub struct DiagnosisIdPath(pub DiagnosisId);

#[async_trait]
impl<S> FromRequestParts<S> for DiagnosisIdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = single_segment(parts, state, "id").await?;
        validate_diagnosis_id(&raw)
            .map(DiagnosisIdPath)
            .map_err(|err| api_validation_error(vec![err]))
    }
}

/// History `page`/`limit` query values, unclamped.
pub struct HistoryParams(pub HistoryQuery);

#[async_trait]
impl<S> FromRequestParts<S> for HistoryParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                api_validation_error(vec![FieldError::new("query", rejection.body_text())])
            })?;
        HistoryQuery::parse(&params)
            .map(HistoryParams)
            .map_err(api_validation_error)
    }
}

/// A JSON body sanitized, shape-checked, and validated against `T`.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: BodySchema + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| {
                api_validation_error(vec![FieldError::new("body", rejection.body_text())])
            })?;
        T::parse_body(raw)
            .map(ValidatedJson)
            .map_err(api_validation_error)
    }
}
