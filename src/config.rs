use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::error::{ClientError, Result};

/// Configuration for the video Q&A session client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend service settings
    pub backend: BackendConfig,

    /// Video ingest dialog settings
    pub ingest: IngestConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the question-answering service
    pub base_url: String,

    /// Per-request timeout in seconds (None = wait indefinitely)
    pub request_timeout_seconds: Option<u64>,

    /// TCP connect timeout in seconds
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Delay between a successful ingest and the dialog closing itself
    pub auto_dismiss_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = ["vidqa.toml", "config/vidqa.toml"];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::load_from(path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific TOML file, then apply env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config: Config = toml::from_str(&config_str)
            .map_err(|e| ClientError::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(base_url) = std::env::var("VIDQA_BACKEND_URL") {
            self.backend.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("VIDQA_REQUEST_TIMEOUT") {
            match timeout.parse() {
                Ok(seconds) => self.backend.request_timeout_seconds = Some(seconds),
                Err(_) => tracing::warn!("Ignoring VIDQA_REQUEST_TIMEOUT={}", timeout),
            }
        }

        if let Ok(log_level) = std::env::var("VIDQA_LOG_LEVEL") {
            self.logging.log_level = log_level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        std::fs::write(path, config_str)
            .map_err(|e| ClientError::Config(format!("cannot write {}: {}", path.display(), e)))?;
        tracing::info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.backend.base_url).map_err(|e| {
            ClientError::Config(format!("invalid backend url {}: {}", self.backend.base_url, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "backend url must be http or https, got {}",
                url.scheme()
            )));
        }

        if self.backend.request_timeout_seconds == Some(0) {
            return Err(ClientError::Config(
                "request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.ingest.auto_dismiss_ms == 0 {
            return Err(ClientError::Config(
                "auto_dismiss_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Video Q&A Client Configuration:\n\
            - Backend: {}\n\
            - Request Timeout: {}\n\
            - Ingest Auto-dismiss: {}ms\n\
            - Log Level: {}",
            self.backend.base_url,
            self.backend
                .request_timeout_seconds
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "none".to_string()),
            self.ingest.auto_dismiss_ms,
            self.logging.log_level
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            ingest: IngestConfig { auto_dismiss_ms: 2000 },
            logging: LoggingConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_seconds: None,
            connect_timeout_seconds: 10,
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend.base_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.config.backend.request_timeout_seconds = Some(seconds);
        self
    }

    pub fn with_auto_dismiss_ms(mut self, ms: u64) -> Self {
        self.config.ingest.auto_dismiss_ms = ms;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.log_level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
