//! Read-through cache for diagnosis lookups.
//!
//! # Purpose
//! Keeps recent reads in a bounded `moka` cache so repeated lookups skip the
//! network. Each key kind has its own freshness window; stale entries are
//! dropped and refetched on the next read.
//!
//! # Notes
//! Writes invalidate by client: the matching keys are collected from a scan
//! and removed before the write returns, so a later insert is never caught by
//! an earlier invalidation.
use crate::config::{CACHE_IDLE, HISTORY_TTL, RECORD_TTL};
use diagnosis_common::{ClientId, Diagnosis, DiagnosisId, DiagnosisListResponse};
use moka::Expiry;
use moka::future::Cache;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Latest(ClientId),
    History {
        client_id: ClientId,
        page: u32,
        limit: u32,
    },
    ById(DiagnosisId),
}

impl CacheKey {
    fn client_id(&self) -> Option<ClientId> {
        match self {
            Self::Latest(client_id) | Self::History { client_id, .. } => Some(*client_id),
            Self::ById(_) => None,
        }
    }

    fn ttl(&self) -> Duration {
        match self {
            Self::Latest(_) | Self::ById(_) => RECORD_TTL,
            Self::History { .. } => HISTORY_TTL,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Record(Diagnosis),
    History(DiagnosisListResponse),
}

impl CachedValue {
    fn belongs_to(&self, client_id: &ClientId) -> bool {
        match self {
            Self::Record(record) => record.client_id == *client_id,
            Self::History(page) => page.data.iter().any(|record| record.client_id == *client_id),
        }
    }
}

struct Freshness;

impl Expiry<CacheKey, CachedValue> for Freshness {
    fn expire_after_create(
        &self,
        key: &CacheKey,
        _value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(key.ttl())
    }

    fn expire_after_update(
        &self,
        key: &CacheKey,
        _value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(key.ttl())
    }
}

#[derive(Clone)]
pub struct DiagnosisCache {
    inner: Cache<CacheKey, CachedValue>,
}

impl DiagnosisCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_idle(CACHE_IDLE)
                .expire_after(Freshness)
                .build(),
        }
    }

    pub async fn record(&self, key: &CacheKey) -> Option<Diagnosis> {
        match self.inner.get(key).await {
            Some(CachedValue::Record(record)) => Some(record),
            _ => None,
        }
    }

    pub async fn history(&self, key: &CacheKey) -> Option<DiagnosisListResponse> {
        match self.inner.get(key).await {
            Some(CachedValue::History(page)) => Some(page),
            _ => None,
        }
    }

    pub async fn insert_record(&self, key: CacheKey, record: Diagnosis) {
        self.inner.insert(key, CachedValue::Record(record)).await;
    }

    pub async fn insert_history(&self, key: CacheKey, page: DiagnosisListResponse) {
        self.inner.insert(key, CachedValue::History(page)).await;
    }

    /// Drop every entry keyed by `client_id` or holding one of its records.
    pub async fn invalidate_client(&self, client_id: ClientId) {
        let stale: Vec<CacheKey> = self
            .inner
            .iter()
            .filter(|(key, value)| {
                key.client_id() == Some(client_id) || value.belongs_to(&client_id)
            })
            .map(|(key, _)| CacheKey::clone(&key))
            .collect();
        tracing::debug!(%client_id, entries = stale.len(), "invalidating cached diagnoses");
        for key in stale {
            self.inner.invalidate(&key).await;
        }
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.inner.get(key).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record(client: &str) -> Diagnosis {
        serde_json::from_value(serde_json::json!({
            "id": DiagnosisId::generate().to_string(),
            "clientId": client,
            "diagnosisName": "Generalized Anxiety Disorder",
            "predictedDate": "2024-01-15T10:30:00Z",
            "justification": "Excessive worry",
            "challengedDiagnosis": null,
            "challengedJustification": null,
            "createdAt": "2024-01-15T10:30:00Z",
            "updatedAt": "2024-01-15T10:30:00Z"
        }))
        .expect("record")
    }

    const CLIENT_A: &str = "550e8400-e29b-41d4-a716-446655440001";
    const CLIENT_B: &str = "550e8400-e29b-41d4-a716-446655440002";

    #[test]
    fn freshness_depends_on_key_kind() {
        let client = ClientId::from_str(CLIENT_A).expect("client");
        assert_eq!(CacheKey::Latest(client).ttl(), Duration::from_secs(300));
        assert_eq!(
            CacheKey::ById(DiagnosisId::generate()).ttl(),
            Duration::from_secs(300)
        );
        let history = CacheKey::History {
            client_id: client,
            page: 1,
            limit: 10,
        };
        assert_eq!(history.ttl(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn invalidate_client_drops_keys_and_owned_records() {
        let cache = DiagnosisCache::new(64);
        let a = record(CLIENT_A);
        let b = record(CLIENT_B);
        let a_latest = CacheKey::Latest(a.client_id);
        let a_history = CacheKey::History {
            client_id: a.client_id,
            page: 1,
            limit: 10,
        };
        let a_by_id = CacheKey::ById(a.id.clone());
        let b_by_id = CacheKey::ById(b.id.clone());

        cache.insert_record(a_latest.clone(), a.clone()).await;
        cache
            .insert_history(
                a_history.clone(),
                DiagnosisListResponse::page(vec![a.clone()], 1, 10, "ok"),
            )
            .await;
        cache.insert_record(a_by_id.clone(), a.clone()).await;
        cache.insert_record(b_by_id.clone(), b.clone()).await;

        cache.invalidate_client(a.client_id).await;

        assert!(!cache.contains(&a_latest).await);
        assert!(!cache.contains(&a_history).await);
        assert!(!cache.contains(&a_by_id).await);
        assert_eq!(cache.record(&b_by_id).await, Some(b));
    }

    #[tokio::test]
    async fn entries_inserted_after_invalidation_survive() {
        let cache = DiagnosisCache::new(64);
        let a = record(CLIENT_A);
        let key = CacheKey::ById(a.id.clone());
        cache.insert_record(key.clone(), a.clone()).await;
        cache.invalidate_client(a.client_id).await;
        cache.insert_record(key.clone(), a.clone()).await;
        assert_eq!(cache.record(&key).await, Some(a));
    }

    #[tokio::test]
    async fn lookups_respect_value_kind() {
        let cache = DiagnosisCache::new(64);
        let a = record(CLIENT_A);
        let key = CacheKey::Latest(a.client_id);
        cache.insert_record(key.clone(), a).await;
        assert!(cache.history(&key).await.is_none());
        assert!(cache.record(&key).await.is_some());
    }
}
