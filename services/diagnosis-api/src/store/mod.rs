//! Diagnosis persistence.
//!
//! # Purpose
//! [`DiagnosisStore`] is the only data-access seam of the service. Handlers
//! hold it as `Arc<dyn DiagnosisStore + Send + Sync>` and never touch a
//! backend directly.
use async_trait::async_trait;
use diagnosis_common::{
    ClientId, CreateDiagnosisRequest, Diagnosis, DiagnosisId, UpdateDiagnosisRequest,
};
use thiserror::Error;

pub mod memory;
pub mod postgres;
pub mod seed;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("no fields to update")]
    EmptyPatch,
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which branch an upsert took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[async_trait]
pub trait DiagnosisStore: Send + Sync {
    /// Newest record for the client by `predicted_date`.
    async fn find_latest_by_client(&self, client_id: &ClientId) -> StoreResult<Diagnosis>;
    async fn find_by_id(&self, id: &DiagnosisId) -> StoreResult<Diagnosis>;
    async fn create(
        &self,
        client_id: &ClientId,
        request: CreateDiagnosisRequest,
    ) -> StoreResult<Diagnosis>;
    /// Apply the present fields of `patch`. Empty patches fail before lookup.
    async fn update(&self, id: &DiagnosisId, patch: UpdateDiagnosisRequest)
    -> StoreResult<Diagnosis>;
    /// Create the client's first record, or overwrite its latest one, atomically.
    async fn upsert_latest_for_client(
        &self,
        client_id: &ClientId,
        request: CreateDiagnosisRequest,
    ) -> StoreResult<(Diagnosis, UpsertOutcome)>;
    async fn list_by_client(
        &self,
        client_id: &ClientId,
        skip: u64,
        take: u64,
    ) -> StoreResult<Vec<Diagnosis>>;
    async fn exists(&self, id: &str) -> StoreResult<bool>;
    async fn delete(&self, id: &DiagnosisId) -> StoreResult<bool>;
    async fn count(&self) -> StoreResult<u64>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}

pub(crate) fn record_change(op: &'static str, total: Option<u64>) {
    metrics::counter!("diagnosis_changes_total", "op" => op).increment(1);
    if let Some(total) = total {
        metrics::gauge!("diagnosis_records_total").set(total as f64);
    }
}
