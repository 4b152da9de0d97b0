//! Diagnosis HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Route composition lives here so `main` stays small and tests can drive the
//! router in-process.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::observability;
use crate::store::DiagnosisStore;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

pub const SERVICE_VERSION: &str = "1.0.0";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DiagnosisStore + Send + Sync>,
    pub environment: String,
    pub version: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn DiagnosisStore + Send + Sync>, environment: impl Into<String>) -> Self {
        Self {
            store,
            environment: environment.into(),
            version: SERVICE_VERSION.to_string(),
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    // `:id` names the first segment for every method; each handler's extractor
    // decides whether it is a client UUID or a diagnosis id. Unrouted methods
    // on a known path share the JSON not-found answer instead of a bare 405.
    let not_found = api::system::route_not_found;
    Router::new()
        .route("/", get(api::system::root).fallback(not_found))
        .route("/health", get(api::system::health).fallback(not_found))
        .route(
            "/api/diagnoses/health",
            get(api::diagnoses::service_health).fallback(not_found),
        )
        .route(
            "/api/diagnoses/by-id/:id",
            get(api::diagnoses::get_by_id).fallback(not_found),
        )
        .route(
            "/api/diagnoses/:id",
            get(api::diagnoses::get_latest)
                .post(api::diagnoses::upsert_by_client)
                .put(api::diagnoses::update_by_id)
                .fallback(not_found),
        )
        .route(
            "/api/diagnoses/:id/history",
            get(api::diagnoses::list_history).fallback(not_found),
        )
        .merge(utoipa_swagger_ui::SwaggerUi::new("/api-docs").url("/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(trace_layer)
        .with_state(state)
}
