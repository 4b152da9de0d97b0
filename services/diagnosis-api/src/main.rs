//! Diagnosis HTTP service entry point.
//!
//! # Purpose
//! Loads configuration and runs the service until Ctrl-C.
use diagnosis_api::config::DiagnosisApiConfig;
use diagnosis_api::runtime::run_with_shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DiagnosisApiConfig::from_env_or_yaml()?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
