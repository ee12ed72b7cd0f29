//! Benchmark configuration management.
//!
//! This module handles loading the run configuration: connection settings
//! for the catalog, the dataset shape, the workload mix and the token
//! refresh cadence.
//!
//! Configuration is read from a JSON file (by default
//! `~/.config/catalog-bench/config.json`); every field has a default, and the
//! connection secrets can be supplied through the environment instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::dataset::TreeShape;
use crate::workload::InjectionProfile;

/// Application name used for config directory paths
const APP_NAME: &str = "catalog-bench";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "CATALOG_BENCH_";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub dataset: TreeShape,
    pub workload: WorkloadConfig,
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// OAuth scope requested with the client-credentials grant
    pub scope: String,
    /// Realm sent in the `Polaris-Realm` header when set
    pub realm: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8181".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: "PRINCIPAL_ROLE:ALL".to_string(),
            realm: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Relative weight of the read branch
    pub read_ratio: u32,
    /// Relative weight of the write branch
    pub write_ratio: u32,
    /// New iterations started per second
    pub throughput: f64,
    pub duration_secs: u64,
    /// Seed for operation selection; random when absent
    pub seed: Option<u64>,
    /// Exponentially distributed arrivals instead of a fixed spacing
    pub randomized: bool,
    /// Cap on concurrently running iterations
    pub max_in_flight: Option<usize>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            read_ratio: 80,
            write_ratio: 20,
            throughput: 100.0,
            duration_secs: 300,
            seed: None,
            randomized: true,
            max_in_flight: None,
        }
    }
}

impl WorkloadConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub gate_poll_millis: u64,
    /// Give up waiting for the first token after this many seconds
    pub gate_timeout_secs: Option<u64>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            gate_poll_millis: 1_000,
            gate_timeout_secs: None,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn gate_poll_interval(&self) -> Duration {
        Duration::from_millis(self.gate_poll_millis)
    }

    pub fn gate_timeout(&self) -> Option<Duration> {
        self.gate_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load from `path`, or from the default location when no path is given.
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::NotFound(path).into());
            }
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `CATALOG_BENCH_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.is_empty());

        if let Some(v) = var("BASE_URL") {
            self.connection.base_url = v;
        }
        if let Some(v) = var("CLIENT_ID") {
            self.connection.client_id = v;
        }
        if let Some(v) = var("CLIENT_SECRET") {
            self.connection.client_secret = v;
        }
        if let Some(v) = var("REALM") {
            self.connection.realm = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("connection.base_url must not be empty".into()));
        }
        if self.connection.client_id.is_empty() || self.connection.client_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "connection.client_id and connection.client_secret are required".into(),
            ));
        }
        let w = &self.workload;
        if u64::from(w.read_ratio) + u64::from(w.write_ratio) == 0 {
            return Err(ConfigError::Invalid(
                "workload.read_ratio + workload.write_ratio must be positive".into(),
            ));
        }
        InjectionProfile::from_config(w)?;
        if w.max_in_flight == Some(0) {
            return Err(ConfigError::Invalid("workload.max_in_flight must be at least 1".into()));
        }
        if self.refresh.interval_secs == 0 || self.refresh.gate_poll_millis == 0 {
            return Err(ConfigError::Invalid(
                "refresh.interval_secs and refresh.gate_poll_millis must be positive".into(),
            ));
        }
        self.dataset.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn valid() -> Config {
        let mut config = Config::default();
        config.connection.client_id = "root".into();
        config.connection.client_secret = "s3cr3t".into();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workload.read_ratio, 80);
        assert_eq!(config.workload.write_ratio, 20);
        assert_eq!(config.refresh.interval(), Duration::from_secs(60));
        assert_eq!(config.refresh.gate_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.refresh.gate_timeout(), None);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "workload": {"read_ratio": 70, "write_ratio": 30},
            "dataset": {"namespace_width": 3}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.workload.read_ratio, 70);
        assert_eq!(config.workload.throughput, 100.0);
        assert_eq!(config.dataset.namespace_width, 3);
        assert_eq!(config.dataset.namespace_depth, 4);
        assert_eq!(config.connection.scope, "PRINCIPAL_ROLE:ALL");
    }

    #[test]
    fn test_load_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = valid();
        config.workload.seed = Some(42);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(dir.path().join("absent.json").as_path())).unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CATALOG_BENCH_BASE_URL", "https://catalog.example.com"),
            ("CATALOG_BENCH_CLIENT_ID", "bench"),
            ("CATALOG_BENCH_CLIENT_SECRET", ""),
            ("CATALOG_BENCH_REALM", "POLARIS"),
        ]
        .into_iter()
        .collect();

        let mut config = valid();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.connection.base_url, "https://catalog.example.com");
        assert_eq!(config.connection.client_id, "bench");
        // Empty values are ignored
        assert_eq!(config.connection.client_secret, "s3cr3t");
        assert_eq!(config.connection.realm.as_deref(), Some("POLARIS"));
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());
        assert!(Config::default().validate().is_err());

        let mut zero_mix = valid();
        zero_mix.workload.read_ratio = 0;
        zero_mix.workload.write_ratio = 0;
        assert!(zero_mix.validate().is_err());

        let mut read_only = valid();
        read_only.workload.write_ratio = 0;
        assert!(read_only.validate().is_ok());

        let mut no_rate = valid();
        no_rate.workload.throughput = 0.0;
        assert!(no_rate.validate().is_err());

        let mut vanishing_rate = valid();
        vanishing_rate.workload.throughput = 1e-20;
        assert!(vanishing_rate.validate().is_err());

        let mut huge_tree = valid();
        huge_tree.dataset.namespace_width = 1000;
        assert!(huge_tree.validate().is_err());

        let mut bad_tree = valid();
        bad_tree.dataset.namespace_depth = 0;
        assert!(bad_tree.validate().is_err());
    }
}
