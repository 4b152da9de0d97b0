//! In-memory implementation of the diagnosis store.
//!
//! # Purpose
//! Backs local development and tests with no external dependencies. State is
//! a `HashMap` behind one `tokio::sync::RwLock`.
//!
//! # Durability and consistency
//! - **Not durable**: all records are lost on restart.
//! - Reads share the lock; every mutation holds the write lock for its whole
//!   read-modify-write, which is what makes `upsert_latest_for_client` atomic.
//!
//! # Ordering
//! Each record carries an insertion sequence so that records created within
//! the same millisecond still order newest-first.
use super::{DiagnosisStore, StoreError, StoreResult, UpsertOutcome, record_change};
use async_trait::async_trait;
use chrono::Utc;
use diagnosis_common::{
    ClientId, CreateDiagnosisRequest, Diagnosis, DiagnosisId, UpdateDiagnosisRequest,
};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    diagnosis: Diagnosis,
}

#[derive(Debug, Default)]
struct State {
    next_seq: u64,
    records: HashMap<DiagnosisId, Entry>,
}

impl State {
    fn insert(&mut self, diagnosis: Diagnosis) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records
            .insert(diagnosis.id.clone(), Entry { seq, diagnosis });
    }

    /// Records for `client_id`, newest first.
    fn client_entries(&self, client_id: &ClientId) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self
            .records
            .values()
            .filter(|entry| entry.diagnosis.client_id == *client_id)
            .collect();
        entries.sort_by_key(|entry| Reverse((entry.diagnosis.predicted_date, entry.seq)));
        entries
    }

    fn latest_id(&self, client_id: &ClientId) -> Option<DiagnosisId> {
        self.client_entries(client_id)
            .first()
            .map(|entry| entry.diagnosis.id.clone())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiagnosisStore for InMemoryStore {
    async fn find_latest_by_client(&self, client_id: &ClientId) -> StoreResult<Diagnosis> {
        let state = self.state.read().await;
        state
            .client_entries(client_id)
            .first()
            .map(|entry| entry.diagnosis.clone())
            .ok_or_else(|| StoreError::NotFound("diagnosis".into()))
    }

    async fn find_by_id(&self, id: &DiagnosisId) -> StoreResult<Diagnosis> {
        let state = self.state.read().await;
        state
            .records
            .get(id)
            .map(|entry| entry.diagnosis.clone())
            .ok_or_else(|| StoreError::NotFound("diagnosis".into()))
    }

    async fn create(
        &self,
        client_id: &ClientId,
        request: CreateDiagnosisRequest,
    ) -> StoreResult<Diagnosis> {
        let diagnosis = Diagnosis::new(*client_id, request, Utc::now());
        let mut state = self.state.write().await;
        state.insert(diagnosis.clone());
        record_change("created", Some(state.records.len() as u64));
        Ok(diagnosis)
    }

    async fn update(
        &self,
        id: &DiagnosisId,
        patch: UpdateDiagnosisRequest,
    ) -> StoreResult<Diagnosis> {
        if patch.is_empty() {
            return Err(StoreError::EmptyPatch);
        }
        let mut state = self.state.write().await;
        let entry = state
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound("diagnosis".into()))?;
        entry.diagnosis.apply_update(&patch, Utc::now());
        let updated = entry.diagnosis.clone();
        record_change("updated", None);
        Ok(updated)
    }

    async fn upsert_latest_for_client(
        &self,
        client_id: &ClientId,
        request: CreateDiagnosisRequest,
    ) -> StoreResult<(Diagnosis, UpsertOutcome)> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        match state.latest_id(client_id) {
            Some(id) => {
                let entry = state
                    .records
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::NotFound("diagnosis".into()))?;
                entry
                    .diagnosis
                    .apply_update(&UpdateDiagnosisRequest::from(request), now);
                let updated = entry.diagnosis.clone();
                record_change("updated", None);
                Ok((updated, UpsertOutcome::Updated))
            }
            None => {
                let diagnosis = Diagnosis::new(*client_id, request, now);
                state.insert(diagnosis.clone());
                record_change("created", Some(state.records.len() as u64));
                Ok((diagnosis, UpsertOutcome::Created))
            }
        }
    }

    async fn list_by_client(
        &self,
        client_id: &ClientId,
        skip: u64,
        take: u64,
    ) -> StoreResult<Vec<Diagnosis>> {
        let state = self.state.read().await;
        Ok(state
            .client_entries(client_id)
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(take).unwrap_or(usize::MAX))
            .map(|entry| entry.diagnosis.clone())
            .collect())
    }

    async fn exists(&self, id: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.records.keys().any(|key| key.as_str() == id))
    }

    async fn delete(&self, id: &DiagnosisId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let removed = state.records.remove(id).is_some();
        if removed {
            record_change("deleted", Some(state.records.len() as u64));
        }
        Ok(removed)
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.state.read().await.records.len() as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
