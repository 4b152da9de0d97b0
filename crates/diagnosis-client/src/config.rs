// Client defaults plus environment and YAML overrides.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CACHE_CAPACITY: u64 = 1024;

/// Freshness window for single-record reads (latest and by-id).
pub const RECORD_TTL: Duration = Duration::from_secs(5 * 60);
/// Freshness window for history pages.
pub const HISTORY_TTL: Duration = Duration::from_secs(2 * 60);
/// Entries untouched for this long are evicted regardless of freshness.
pub const CACHE_IDLE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub cache_capacity: u64,
    /// Bypass system proxy settings.
    pub no_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            no_proxy: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
struct ClientConfigOverride {
    base_url: Option<String>,
    timeout_ms: Option<u64>,
    cache_capacity: Option<u64>,
    no_proxy: Option<bool>,
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("DIAGNOSIS_CLIENT_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_ms = env_parse("DIAGNOSIS_CLIENT_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let cache_capacity = env_parse("DIAGNOSIS_CLIENT_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
            cache_capacity,
            no_proxy: env_parse("DIAGNOSIS_CLIENT_NO_PROXY", false)?,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("DIAGNOSIS_CLIENT_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read DIAGNOSIS_CLIENT_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: ClientConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse diagnosis client config yaml")?;
        if let Some(value) = override_cfg.base_url {
            self.base_url = value;
        }
        if let Some(value) = override_cfg.timeout_ms {
            self.timeout = Duration::from_millis(value);
        }
        if let Some(value) = override_cfg.cache_capacity {
            self.cache_capacity = value;
        }
        if let Some(value) = override_cfg.no_proxy {
            self.no_proxy = value;
        }
        Ok(())
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "DIAGNOSIS_CLIENT_BASE_URL",
        "DIAGNOSIS_CLIENT_TIMEOUT_MS",
        "DIAGNOSIS_CLIENT_CACHE_CAPACITY",
        "DIAGNOSIS_CLIENT_NO_PROXY",
        "DIAGNOSIS_CLIENT_CONFIG",
    ];

    struct EnvSnapshot(Vec<(&'static str, Option<String>)>);

    impl EnvSnapshot {
        fn clear() -> Self {
            let saved = KEYS
                .iter()
                .map(|key| (*key, std::env::var(key).ok()))
                .collect();
            for key in KEYS {
                unsafe {
                    std::env::remove_var(key);
                }
            }
            Self(saved)
        }
    }

    impl Drop for EnvSnapshot {
        fn drop(&mut self) {
            for (key, value) in &self.0 {
                match value {
                    Some(value) => unsafe { std::env::set_var(key, value) },
                    None => unsafe { std::env::remove_var(key) },
                }
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        let _env = EnvSnapshot::clear();
        let config = ClientConfig::from_env().expect("config");
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        let _env = EnvSnapshot::clear();
        unsafe {
            std::env::set_var("DIAGNOSIS_CLIENT_BASE_URL", "http://diagnosis:8080");
            std::env::set_var("DIAGNOSIS_CLIENT_TIMEOUT_MS", "2500");
            std::env::set_var("DIAGNOSIS_CLIENT_CACHE_CAPACITY", "64");
        }
        let config = ClientConfig::from_env().expect("config");
        assert_eq!(config.base_url, "http://diagnosis:8080");
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.cache_capacity, 64);
    }

    #[test]
    #[serial]
    fn invalid_timeout_is_an_error() {
        let _env = EnvSnapshot::clear();
        unsafe {
            std::env::set_var("DIAGNOSIS_CLIENT_TIMEOUT_MS", "soon");
        }
        let err = ClientConfig::from_env().expect_err("invalid");
        assert!(err.to_string().contains("DIAGNOSIS_CLIENT_TIMEOUT_MS"));
    }

    #[test]
    #[serial]
    fn yaml_file_overrides_env() {
        let _env = EnvSnapshot::clear();
        let path = std::env::temp_dir().join(format!(
            "diagnosis-client-config-{}.yaml",
            std::process::id()
        ));
        fs::write(&path, "base_url: http://yaml:3001\ntimeout_ms: 750\nno_proxy: true\n").expect("write yaml");
        unsafe {
            std::env::set_var("DIAGNOSIS_CLIENT_CONFIG", &path);
        }
        let config = ClientConfig::from_env_or_yaml().expect("config");
        let _ = fs::remove_file(&path);
        assert_eq!(config.base_url, "http://yaml:3001");
        assert_eq!(config.timeout, Duration::from_millis(750));
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert!(config.no_proxy);
    }
}
