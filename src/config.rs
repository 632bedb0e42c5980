//! Service configuration
//!
//! Loaded from an optional TOML file, then overridden by `TICKSTATS_*`
//! environment variables. Every field has a default, so an empty file is a
//! valid configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, StatsError};
use crate::registry::DEFAULT_MAX_SYMBOLS;
use crate::validate::{Limits, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_SYMBOL_LEN};
use crate::window::DEFAULT_BUFFER_CAPACITY;
use crate::StatsEngineBuilder;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum in-flight requests
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of tracked symbols
    #[serde(default = "default_max_symbols")]
    pub max_symbols: usize,
    /// Samples retained per symbol
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Maximum samples per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Maximum symbol length, in characters
    #[serde(default = "default_max_symbol_len")]
    pub max_symbol_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_requests: default_max_concurrent_requests(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_symbols: default_max_symbols(),
            buffer_capacity: default_buffer_capacity(),
            max_batch_size: default_max_batch_size(),
            max_symbol_len: default_max_symbol_len(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}
fn default_port() -> u16 {
    8000
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_concurrent_requests() -> usize {
    1000
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}
fn default_max_symbols() -> usize {
    DEFAULT_MAX_SYMBOLS
}
fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}
fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}
fn default_max_symbol_len() -> usize {
    DEFAULT_MAX_SYMBOL_LEN
}

impl Config {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Apply `TICKSTATS_*` environment overrides
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TICKSTATS_HOST") {
            self.server.host = parse_var("TICKSTATS_HOST", &host)?;
        }
        if let Some(port) = lookup("TICKSTATS_PORT") {
            self.server.port = parse_var("TICKSTATS_PORT", &port)?;
        }
        if let Some(max) = lookup("TICKSTATS_MAX_SYMBOLS") {
            self.engine.max_symbols = parse_var("TICKSTATS_MAX_SYMBOLS", &max)?;
        }
        if let Some(cap) = lookup("TICKSTATS_BUFFER_CAPACITY") {
            self.engine.buffer_capacity = parse_var("TICKSTATS_BUFFER_CAPACITY", &cap)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.max_symbols == 0 {
            return Err(StatsError::Configuration(
                "engine.max_symbols must be greater than 0".to_string(),
            ));
        }
        if engine.buffer_capacity == 0 {
            return Err(StatsError::Configuration(
                "engine.buffer_capacity must be greater than 0".to_string(),
            ));
        }
        if engine.max_batch_size == 0 {
            return Err(StatsError::Configuration(
                "engine.max_batch_size must be greater than 0".to_string(),
            ));
        }
        if engine.max_symbol_len == 0 {
            return Err(StatsError::Configuration(
                "engine.max_symbol_len must be greater than 0".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(StatsError::Configuration(
                "server.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.server.max_concurrent_requests == 0 {
            return Err(StatsError::Configuration(
                "server.max_concurrent_requests must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Request limits for the validation layer
    pub fn limits(&self) -> Limits {
        Limits {
            max_symbol_len: self.engine.max_symbol_len,
            max_batch_size: self.engine.max_batch_size,
        }
    }

    /// Engine builder carrying these settings
    pub fn engine_builder(&self) -> StatsEngineBuilder {
        StatsEngineBuilder::new()
            .max_symbols(self.engine.max_symbols)
            .buffer_capacity(self.engine.buffer_capacity)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| StatsError::Configuration(format!("{} has invalid value {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.engine.max_symbols, 10);
        assert_eq!(config.engine.buffer_capacity, 100_000_000);
        assert_eq!(config.engine.max_batch_size, 10_000);
        assert_eq!(config.engine.max_symbol_len, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
[server]
port = 9100

[engine]
buffer_capacity = 5000
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.engine.buffer_capacity, 5000);
        assert_eq!(config.engine.max_symbols, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_toml_str("[engine]\nmax_symbols = 0\n").unwrap_err();
        assert!(matches!(err, StatsError::Configuration(_)));

        let err = Config::from_toml_str("[server]\nport = \"http\"\n").unwrap_err();
        assert!(matches!(err, StatsError::TomlParse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nhost = \"127.0.0.1\"\nport = 8123").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8123".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/tickstats.toml").unwrap_err();
        assert!(matches!(err, StatsError::Io(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TICKSTATS_PORT", "9001"),
            ("TICKSTATS_MAX_SYMBOLS", "3"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9001);
        assert_eq!(config.engine.max_symbols, 3);
        assert_eq!(config.engine_builder().max_symbols, 3);
    }

    #[test]
    fn test_bad_override() {
        let err = Config::default()
            .apply_overrides(|name| (name == "TICKSTATS_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("TICKSTATS_PORT"));
    }
}
