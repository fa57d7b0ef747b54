//! Configuration loading for the explorer.
//!
//! The cluster section is required. Cache, refresh and render tuning fall
//! back to the documented defaults when omitted.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "SFX_EXPLORER_CONFIG";

pub const DEFAULT_CACHE_TTL_MS: u64 = 15_000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_AUTO_REFRESH_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_API_VERSION: &str = "6.0";
pub const DEFAULT_RENDER_DEPTH: usize = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplorerConfig {
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Cluster identity; second segment of every cache key.
    pub name: String,
    pub endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub request_timeout_ms: u64,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderSettings {
    #[serde(default = "default_render_depth")]
    pub max_depth: usize,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_interval_ms() -> u64 {
    DEFAULT_AUTO_REFRESH_INTERVAL_MS
}

fn default_render_depth() -> usize {
    DEFAULT_RENDER_DEPTH
}

fn default_true() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_CACHE_TTL_MS,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            auto_refresh: true,
            interval_ms: DEFAULT_AUTO_REFRESH_INTERVAL_MS,
        }
    }
}

impl RefreshSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_RENDER_DEPTH,
        }
    }
}

impl ClusterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ExplorerConfig {
    /// Load from `--config <path>` or `SFX_EXPLORER_CONFIG`, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ExplorerConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cluster.name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cluster.name.contains(':') {
            return Err(ConfigError::InvalidValue {
                field: "cluster.name",
                reason: "must not contain ':' (reserved as cache key separator)".to_string(),
            });
        }
        let endpoint = self.cluster.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cluster.endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "cluster.endpoint",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.cluster.api_version.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cluster.api_version",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cluster.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cluster.request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.refresh.debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh.debounce_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.refresh.interval_ms <= self.refresh.debounce_ms {
            return Err(ConfigError::InvalidValue {
                field: "refresh.interval_ms",
                reason: "must be greater than refresh.debounce_ms".to_string(),
            });
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[cluster]
name = "cluster1"
endpoint = "http://localhost:19080"
request_timeout_ms = 10000
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ExplorerConfig::from_toml(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.cluster.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.cache.ttl(), Duration::from_secs(15));
        assert_eq!(config.refresh.debounce(), Duration::from_millis(100));
        assert_eq!(config.refresh.interval(), Duration::from_secs(30));
        assert!(config.refresh.auto_refresh);
        assert_eq!(config.render.max_depth, DEFAULT_RENDER_DEPTH);
        assert!(config.cluster.bearer_token.is_none());
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let contents = format!("{MINIMAL}\n[extra]\nvalue = 1\n");
        assert!(matches!(
            ExplorerConfig::from_toml(&contents),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_colon_in_cluster_name() {
        let mut config = ExplorerConfig::from_toml(MINIMAL).unwrap();
        config.cluster.name = "prod:west".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "cluster.name",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let mut config = ExplorerConfig::from_toml(MINIMAL).unwrap();
        config.cluster.endpoint = "localhost:19080".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_interval_not_above_debounce() {
        let mut config = ExplorerConfig::from_toml(MINIMAL).unwrap();
        config.refresh.interval_ms = config.refresh.debounce_ms;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "refresh.interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{MINIMAL}\n[cache]\nttl_ms = 5000\n\n[refresh]\nauto_refresh = false\n"
        )
        .unwrap();
        let config = ExplorerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.cache.ttl(), Duration::from_secs(5));
        assert!(!config.refresh.auto_refresh);
        assert_eq!(config.refresh.interval_ms, DEFAULT_AUTO_REFRESH_INTERVAL_MS);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ExplorerConfig::from_path(Path::new("/nonexistent/sfx.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
