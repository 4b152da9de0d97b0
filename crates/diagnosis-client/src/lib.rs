// Typed HTTP client for the diagnosis API.
//
// Reads go through a bounded in-memory cache (see `cache`). Writes run the
// same sanitize-then-validate pass the service applies, send the sanitized
// body, then drop every cached entry that belongs to the affected client.
// There are no retries: a failed request surfaces as a `ClientError` on the
// first attempt.
use diagnosis_common::{
    BodySchema, ClientId, CreateDiagnosisRequest, Diagnosis, DiagnosisId, DiagnosisListResponse,
    DiagnosisResponse, HealthResponse, UpdateDiagnosisRequest,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheKey, DiagnosisCache};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};

const DIAGNOSES_PATH: &str = "/api/diagnoses";

#[derive(Clone)]
pub struct DiagnosisClient {
    http: reqwest::Client,
    base_url: String,
    cache: DiagnosisCache,
}

impl DiagnosisClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if config.no_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: DiagnosisCache::new(config.cache_capacity),
        })
    }

    /// Latest diagnosis for `client_id`, or `None` when the client has none.
    pub async fn latest_diagnosis(&self, client_id: &ClientId) -> ClientResult<Option<Diagnosis>> {
        let key = CacheKey::Latest(*client_id);
        if let Some(record) = self.cache.record(&key).await {
            return Ok(Some(record));
        }
        let request = self.http.get(self.diagnoses_url(&client_id.to_string()));
        let response = match self.send::<DiagnosisResponse>(request).await {
            Ok(response) => response,
            Err(ClientError::Api { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let record = into_record(response)?;
        self.cache.insert_record(key, record.clone()).await;
        Ok(Some(record))
    }

    pub async fn diagnosis_history(
        &self,
        client_id: &ClientId,
        page: u32,
        limit: u32,
    ) -> ClientResult<DiagnosisListResponse> {
        let key = CacheKey::History {
            client_id: *client_id,
            page,
            limit,
        };
        if let Some(cached) = self.cache.history(&key).await {
            return Ok(cached);
        }
        let request = self
            .http
            .get(self.diagnoses_url(&format!("{client_id}/history")))
            .query(&[("page", page), ("limit", limit)]);
        let history: DiagnosisListResponse = self.send(request).await?;
        self.cache.insert_history(key, history.clone()).await;
        Ok(history)
    }

    pub async fn diagnosis_by_id(&self, id: &DiagnosisId) -> ClientResult<Diagnosis> {
        let key = CacheKey::ById(id.clone());
        if let Some(record) = self.cache.record(&key).await {
            return Ok(record);
        }
        let request = self.http.get(self.diagnoses_url(&format!("by-id/{id}")));
        let record = into_record(self.send(request).await?)?;
        self.cache.insert_record(key, record.clone()).await;
        Ok(record)
    }

    /// Create the client's first diagnosis, or overwrite its latest one.
    pub async fn create_or_update_diagnosis(
        &self,
        client_id: &ClientId,
        payload: &CreateDiagnosisRequest,
    ) -> ClientResult<Diagnosis> {
        let body = prepare_body(payload)?;
        let request = self
            .http
            .post(self.diagnoses_url(&client_id.to_string()))
            .json(&body);
        let record = into_record(self.send(request).await?)?;
        self.cache.invalidate_client(*client_id).await;
        tracing::debug!(%client_id, id = %record.id, "diagnosis written");
        Ok(record)
    }

    pub async fn update_diagnosis(
        &self,
        id: &DiagnosisId,
        payload: &UpdateDiagnosisRequest,
    ) -> ClientResult<Diagnosis> {
        let body = prepare_body(payload)?;
        let request = self.http.put(self.diagnoses_url(id.as_str())).json(&body);
        let record = into_record(self.send(request).await?)?;
        self.cache.invalidate_client(record.client_id).await;
        self.cache
            .insert_record(CacheKey::ById(id.clone()), record.clone())
            .await;
        Ok(record)
    }

    /// Service health. An unhealthy service answers 503 with the same body,
    /// which is returned as-is with `success == false`.
    pub async fn health(&self) -> ClientResult<HealthResponse> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        match serde_json::from_slice::<HealthResponse>(&body) {
            Ok(health) if status.is_success() || status == StatusCode::SERVICE_UNAVAILABLE => {
                Ok(health)
            }
            Err(err) if status.is_success() => Err(ClientError::Decode(err.to_string())),
            _ => Err(ClientError::from_response(status, &body)),
        }
    }

    pub fn cache(&self) -> &DiagnosisCache {
        &self.cache
    }

    fn diagnoses_url(&self, suffix: &str) -> String {
        format!("{}{DIAGNOSES_PATH}/{suffix}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "diagnosis api request failed");
            return Err(ClientError::from_response(status, &body));
        }
        serde_json::from_slice(&body).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

/// Round-trip `payload` through the service's body parser so local checks
/// see exactly what the server will.
fn prepare_body<T: BodySchema + Serialize>(payload: &T) -> ClientResult<T> {
    let raw = serde_json::to_value(payload).map_err(|err| ClientError::Decode(err.to_string()))?;
    T::parse_body(raw).map_err(ClientError::Validation)
}

fn into_record(response: DiagnosisResponse) -> ClientResult<Diagnosis> {
    response
        .data
        .ok_or_else(|| ClientError::Decode("response carried no diagnosis".to_string()))
}
