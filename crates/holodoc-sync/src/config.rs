//! Server connection configuration.
//!
//! Configuration can be loaded from:
//! - a TOML file (default: `~/.config/holodoc/server.toml`, `[server]` table)
//! - environment variables (`HOLODOC_*` prefixed)
//!
//! Environment variables override values read from the file.
//!
//! ```rust,no_run
//! use holodoc_sync::config::ServerConfig;
//!
//! let config = ServerConfig::load().expect("Failed to load config");
//! println!("{}", config.base_url());
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use holodoc_core::defaults;
use holodoc_core::{Endpoint, SuccessPolicy};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to write TOML: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for holodoc_core::Error {
    fn from(err: ConfigError) -> Self {
        holodoc_core::Error::Config(err.to_string())
    }
}

/// Where and how to reach the document-matching server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Content type sent on every request.
    pub content_type: String,
    pub timeout_secs: u64,
    pub success_policy: SuccessPolicy,
    /// JPEG quality for uploaded frames (1-100).
    pub jpeg_quality: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            content_type: defaults::CONTENT_TYPE.to_string(),
            timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            success_policy: SuccessPolicy::default(),
            jpeg_quality: defaults::JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TomlRoot {
    #[serde(default)]
    server: ServerConfig,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// `http://host:port`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Full URL of an endpoint.
    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url(), endpoint.path())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server host cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::Validation(
                "server port cannot be 0".to_string(),
            ));
        }

        if self.content_type.trim().is_empty() {
            return Err(ConfigError::Validation(
                "content_type cannot be empty".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Validation(format!(
                "jpeg_quality must be between 1 and 100, got: {}",
                self.jpeg_quality
            )));
        }

        Ok(())
    }

    /// Default config file location.
    pub fn default_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        path.push("holodoc");
        path.push("server.toml");
        path
    }

    /// Load from the default path, or from the environment if no file exists.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::default_config_path();

        if path.exists() {
            info!("Loading server config from: {}", path.display());
            let config = Self::from_file(&path)?.with_env_overrides();
            config.validate()?;
            Ok(config)
        } else {
            debug!(
                "Config file not found at {}, using environment variables",
                path.display()
            );
            let config = Self::from_env();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let root: TomlRoot = toml::from_str(&content)?;
        root.server.validate()?;
        Ok(root.server)
    }

    /// Write the configuration as a `[server]` table, creating parent dirs.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let root = TomlRoot {
            server: self.clone(),
        };
        std::fs::write(path, toml::to_string_pretty(&root)?)?;
        info!("Saved server config to: {}", path.display());
        Ok(())
    }

    /// Defaults overridden by `HOLODOC_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup(defaults::ENV_SERVER_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(defaults::ENV_SERVER_PORT) {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid {}", defaults::ENV_SERVER_PORT),
            }
        }
        if let Some(content_type) = lookup(defaults::ENV_CONTENT_TYPE) {
            self.content_type = content_type;
        }
        if let Some(timeout) = lookup(defaults::ENV_TIMEOUT_SECS) {
            match timeout.parse() {
                Ok(timeout) => self.timeout_secs = timeout,
                Err(_) => {
                    warn!(value = %timeout, "Ignoring invalid {}", defaults::ENV_TIMEOUT_SECS)
                }
            }
        }
        if let Some(policy) = lookup(defaults::ENV_SUCCESS_POLICY) {
            match policy.parse() {
                Ok(policy) => self.success_policy = policy,
                Err(e) => warn!(error = %e, "Ignoring invalid {}", defaults::ENV_SUCCESS_POLICY),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.content_type, "custom/content-type");
        assert_eq!(config.success_policy, SuccessPolicy::Strict);
        assert_eq!(config.jpeg_quality, 75);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_urls() {
        let config = ServerConfig::new("10.0.0.5", 9000);
        assert_eq!(config.base_url(), "http://10.0.0.5:9000");
        assert_eq!(
            config.url(Endpoint::MatchOrCreate),
            "http://10.0.0.5:9000/document/matchorcreate"
        );
        assert_eq!(config.url(Endpoint::Ping), "http://10.0.0.5:9000/utils/ping");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            ServerConfig {
                host: " ".to_string(),
                ..ServerConfig::default()
            },
            ServerConfig {
                port: 0,
                ..ServerConfig::default()
            },
            ServerConfig {
                timeout_secs: 0,
                ..ServerConfig::default()
            },
            ServerConfig {
                jpeg_quality: 0,
                ..ServerConfig::default()
            },
            ServerConfig {
                jpeg_quality: 101,
                ..ServerConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::default().with_overrides(lookup(&[
            ("HOLODOC_SERVER_HOST", "192.168.1.20"),
            ("HOLODOC_SERVER_PORT", "5000"),
            ("HOLODOC_SUCCESS_POLICY", "body-present"),
        ]));
        assert_eq!(config.host, "192.168.1.20");
        assert_eq!(config.port, 5000);
        assert_eq!(config.success_policy, SuccessPolicy::BodyPresent);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let config = ServerConfig::default().with_overrides(lookup(&[
            ("HOLODOC_SERVER_PORT", "not-a-port"),
            ("HOLODOC_TIMEOUT_SECS", "-3"),
            ("HOLODOC_SUCCESS_POLICY", "optimistic"),
        ]));
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("server.toml");
        let config = ServerConfig {
            success_policy: SuccessPolicy::BodyPresent,
            ..ServerConfig::new("doc-server.local", 8443)
        };

        config.save(&path).unwrap();
        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[server]"));
        assert!(content.contains("success_policy = \"body-present\""));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "[server]\nhost = \"10.1.1.1\"\n").unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.host, "10.1.1.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.content_type, "custom/content-type");
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "[server]\nport = \"eighty\"\n").unwrap();
        assert!(matches!(
            ServerConfig::from_file(&path),
            Err(ConfigError::TomlParse(_))
        ));

        std::fs::write(&path, "[server]\nport = 0\n").unwrap();
        assert!(matches!(
            ServerConfig::from_file(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = ServerConfig::from_file(Path::new("/nonexistent/holodoc/server.toml"));
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }

    #[test]
    fn test_default_path() {
        let path = ServerConfig::default_config_path();
        assert!(path.ends_with("holodoc/server.toml"));
    }
}
