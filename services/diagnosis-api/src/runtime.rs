//! Service startup and shutdown.
//!
//! # Purpose
//! Wires configuration, storage, seeding, and the HTTP routers, then serves the
//! API and metrics listeners until the shutdown future resolves.
//!
//! # Notes
//! `build_state` is separate from `run_with_shutdown` so wiring stays testable
//! without binding sockets.
use crate::app::{AppState, build_router};
use crate::config::{DiagnosisApiConfig, StorageBackend};
use crate::observability;
use crate::store::memory::InMemoryStore;
use crate::store::postgres::PostgresStore;
use crate::store::seed::seed_demo_data;
use crate::store::DiagnosisStore;
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;

pub const SERVICE_NAME: &str = "diagnosis-api";

pub async fn run_with_shutdown<F>(config: DiagnosisApiConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability(SERVICE_NAME, config.log_json)?;
    let state = build_state(config.clone()).await?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!(
        %addr,
        backend = state.store.backend_name(),
        durable = state.store.is_durable(),
        environment = %state.environment,
        "diagnosis api listening"
    );

    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {
            tracing::info!("shutdown requested");
        }
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

pub async fn build_state(config: DiagnosisApiConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn DiagnosisStore + Send + Sync> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(PostgresStore::connect(pg).await?)
        }
    };

    if config.seed_demo_data {
        seed_demo_data(store.as_ref()).await?;
    }
    let total = store.count().await?;
    metrics::gauge!("diagnosis_records_total").set(total as f64);

    Ok(AppState::new(store, config.environment))
}
