use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "0.0.0.0:3001";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9091";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PG_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PG_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

// Diagnosis API configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct DiagnosisApiConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub environment: String,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub seed_demo_data: bool,
    pub log_json: bool,
}

#[derive(Debug, Default, Deserialize)]
struct DiagnosisApiConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    environment: Option<String>,
    storage_backend: Option<String>,
    postgres: Option<PostgresConfigOverride>,
    seed_demo_data: Option<bool>,
    log_json: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct PostgresConfigOverride {
    url: Option<String>,
    max_connections: Option<u32>,
    connect_timeout_ms: Option<u64>,
    acquire_timeout_ms: Option<u64>,
}

impl DiagnosisApiConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("DIAGNOSIS_API_BIND", DEFAULT_BIND)
            .parse()
            .with_context(|| "parse DIAGNOSIS_API_BIND")?;
        let metrics_bind = env_or("DIAGNOSIS_API_METRICS_BIND", DEFAULT_METRICS_BIND)
            .parse()
            .with_context(|| "parse DIAGNOSIS_API_METRICS_BIND")?;
        let environment = env_or("DIAGNOSIS_API_ENVIRONMENT", DEFAULT_ENVIRONMENT);
        let storage = StorageBackend::parse(&env_or("DIAGNOSIS_API_STORAGE_BACKEND", "memory"))?;

        let postgres = match std::env::var("DIAGNOSIS_API_POSTGRES_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
        {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_parse(
                    "DIAGNOSIS_API_POSTGRES_MAX_CONNECTIONS",
                    DEFAULT_PG_MAX_CONNECTIONS,
                )?,
                connect_timeout_ms: env_parse(
                    "DIAGNOSIS_API_POSTGRES_CONNECT_TIMEOUT_MS",
                    DEFAULT_PG_CONNECT_TIMEOUT_MS,
                )?,
                acquire_timeout_ms: env_parse(
                    "DIAGNOSIS_API_POSTGRES_ACQUIRE_TIMEOUT_MS",
                    DEFAULT_PG_ACQUIRE_TIMEOUT_MS,
                )?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            bind_addr,
            metrics_bind,
            environment,
            storage,
            postgres,
            seed_demo_data: env_parse("DIAGNOSIS_API_SEED_DEMO_DATA", false)?,
            log_json: env_parse("DIAGNOSIS_API_LOG_JSON", false)?,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("DIAGNOSIS_API_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read DIAGNOSIS_API_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: DiagnosisApiConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse diagnosis api config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.environment {
            self.environment = value;
        }
        if let Some(value) = override_cfg.storage_backend {
            self.storage = StorageBackend::parse(&value)?;
        }
        if let Some(value) = override_cfg.seed_demo_data {
            self.seed_demo_data = value;
        }
        if let Some(value) = override_cfg.log_json {
            self.log_json = value;
        }
        if let Some(pg) = override_cfg.postgres {
            let base = self.postgres.take();
            let url = match pg.url.or_else(|| base.as_ref().map(|cfg| cfg.url.clone())) {
                Some(url) => url,
                None => bail!("postgres override requires a url"),
            };
            self.postgres = Some(PostgresConfig {
                url,
                max_connections: pg
                    .max_connections
                    .or(base.as_ref().map(|cfg| cfg.max_connections))
                    .unwrap_or(DEFAULT_PG_MAX_CONNECTIONS),
                connect_timeout_ms: pg
                    .connect_timeout_ms
                    .or(base.as_ref().map(|cfg| cfg.connect_timeout_ms))
                    .unwrap_or(DEFAULT_PG_CONNECT_TIMEOUT_MS),
                acquire_timeout_ms: pg
                    .acquire_timeout_ms
                    .or(base.as_ref().map(|cfg| cfg.acquire_timeout_ms))
                    .unwrap_or(DEFAULT_PG_ACQUIRE_TIMEOUT_MS),
            });
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}
