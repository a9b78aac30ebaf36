//! Configuration schema definitions.
//!
//! Every section has defaults so an empty file (or no file) is a valid
//! configuration.

use serde::{Deserialize, Serialize};

use crate::observability::LogDefaults;

/// Service name stamped on every log record. Not configurable.
pub const SERVICE_NAME: &str = "cloud-native-app";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener and request limits.
    pub server: ServerConfig,

    /// Structured logging settings.
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Total time allowed per request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level (debug, info, warn, error).
    pub level: String,

    /// Deployment environment name.
    pub environment: String,

    /// Application version reported in every record.
    pub version: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            environment: "development".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn defaults(&self) -> LogDefaults {
        LogDefaults {
            service: SERVICE_NAME.to_string(),
            environment: self.environment.clone(),
            version: self.version.clone(),
        }
    }
}
