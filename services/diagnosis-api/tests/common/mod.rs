#![allow(dead_code)]

use axum::body::Body;
use diagnosis_api::app::{AppState, build_router};
use diagnosis_api::store::DiagnosisStore;
use diagnosis_api::store::memory::InMemoryStore;
use std::sync::Arc;

pub type TestApp = axum::routing::RouterIntoService<Body, ()>;

pub const CLIENT_ONE: &str = "550e8400-e29b-41d4-a716-446655440001";
pub const CLIENT_TWO: &str = "550e8400-e29b-41d4-a716-446655440002";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn app_with_store(store: Arc<dyn DiagnosisStore + Send + Sync>) -> TestApp {
    build_router(AppState::new(store, "test")).into_service()
}

pub fn memory_app() -> (TestApp, InMemoryStore) {
    let store = InMemoryStore::new();
    (app_with_store(Arc::new(store.clone())), store)
}
