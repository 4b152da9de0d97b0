//! Logging, trace propagation, and the Prometheus endpoint.
//!
//! # Purpose
//! `init_observability` installs the process-wide subscriber and metrics
//! recorder once and hands back the recorder's handle on every call.
//! Request spans pick up their parent from W3C `traceparent` headers.
//!
//! # Notes
//! Spans are exported over OTLP only when an exporter can be built from the
//! standard `OTEL_EXPORTER_OTLP_*` environment.
use anyhow::Context;
use axum::Router;
use axum::http::HeaderMap;
use axum::routing::get;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Mutex, Once};
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static TELEMETRY: Mutex<Option<PrometheusHandle>> = Mutex::new(None);
static PROPAGATOR: Once = Once::new();

/// Install logging, tracing, and the metrics recorder for the process.
///
/// Later calls return the first call's handle and leave the installed
/// subscriber alone, whatever `log_json` they pass.
pub fn init_observability(service_name: &str, log_json: bool) -> anyhow::Result<PrometheusHandle> {
    let mut installed = TELEMETRY
        .lock()
        .map_err(|_| anyhow::anyhow!("telemetry lock poisoned"))?;
    if let Some(handle) = installed.as_ref() {
        return Ok(handle.clone());
    }

    install_propagator();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let export = otlp_tracer(service_name)
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));
    // A subscriber installed elsewhere (a test harness) wins.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(log_layer(log_json))
        .with(export)
        .try_init();

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("install metrics recorder")?;
    *installed = Some(handle.clone());
    Ok(handle)
}

fn log_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let layer = tracing_subscriber::fmt::layer().with_target(true);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

fn otlp_tracer(service_name: &str) -> Option<SdkTracer> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .ok()?;
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder_empty()
                .with_attributes(service_resource(service_name))
                .build(),
        )
        .build();
    let tracer = provider.tracer(service_name.to_string());
    global::set_tracer_provider(provider);
    Some(tracer)
}

/// Resource attributes identifying this process in exported spans.
fn service_resource(service_name: &str) -> Vec<KeyValue> {
    let instance = std::env::var("DIAGNOSIS_API_INSTANCE_ID")
        .or_else(|_| std::env::var("HOSTNAME"))
        .ok();
    let environment = std::env::var("DEPLOYMENT_ENVIRONMENT").ok();
    [
        Some(("service.name", service_name.to_string())),
        Some(("service.version", crate::app::SERVICE_VERSION.to_string())),
        instance.map(|value| ("service.instance.id", value)),
        environment.map(|value| ("deployment.environment", value)),
    ]
    .into_iter()
    .flatten()
    .map(|(key, value)| KeyValue::new(key, value))
    .collect()
}

fn install_propagator() {
    PROPAGATOR.call_once(|| global::set_text_map_propagator(TraceContextPropagator::new()));
}

/// Remote parent context carried by the request headers, if any.
pub fn trace_context_from_headers(headers: &HeaderMap) -> opentelemetry::Context {
    install_propagator();
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderCarrier(headers)))
}

struct HeaderCarrier<'a>(&'a HeaderMap);

impl Extractor for HeaderCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.to_str().ok()
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// `GET /metrics` rendering the recorder's current snapshot.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || std::future::ready(handle.render())))
}

pub async fn serve_metrics(handle: PrometheusHandle, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "metrics listening");
    serve_metrics_on(listener, handle, std::future::pending()).await
}

pub async fn serve_metrics_on<F>(
    listener: tokio::net::TcpListener,
    handle: PrometheusHandle,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, metrics_router(handle).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}
