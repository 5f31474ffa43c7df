//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming an optional TOML config file
pub const CONFIG_ENV: &str = "SIMPLERIAK_CONFIG";

/// Prefix for environment overrides (`SIMPLERIAK_HOST`, `SIMPLERIAK_PORT`, ...)
pub const ENV_PREFIX: &str = "SIMPLERIAK";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8098;
pub const DEFAULT_BINARY_PORT: u16 = 8087;

/// Construction-time client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host; falls back to the loopback address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Server port; falls back to the backend's standard port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Default bucket used when an operation names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Wire protocol
    #[serde(default)]
    pub backend: BackendKind,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            bucket: None,
            backend: BackendKind::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Http,
    Binary,
}

impl BackendKind {
    pub fn default_port(&self) -> u16 {
        match self {
            BackendKind::Http => DEFAULT_HTTP_PORT,
            BackendKind::Binary => DEFAULT_BINARY_PORT,
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(BackendKind::Http),
            "binary" | "pbc" => Ok(BackendKind::Binary),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown backend: {}",
                other
            ))),
        }
    }
}

impl ClientConfig {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Effective host
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Effective port
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.backend.default_port())
    }

    /// Load from the file named by `SIMPLERIAK_CONFIG` (if set), then
    /// overlay `SIMPLERIAK_*` environment variables.
    pub fn load() -> crate::Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        let config: ClientConfig = settings.try_deserialize()?;
        tracing::debug!(host = config.host(), port = config.port(), backend = ?config.backend, "loaded config");
        Ok(config)
    }

    /// Load a single TOML file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
