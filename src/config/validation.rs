//! Configuration validation.
//!
//! Serde handles syntax; this pass checks values. All problems are
//! reported together rather than stopping at the first.

use std::net::SocketAddr;

use crate::config::schema::AppConfig;
use crate::observability::Severity;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("server.request_timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("server.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("logging.level `{0}` is not one of debug, info, warn, error")]
    LogLevel(String),

    #[error("logging.{0} must not be empty")]
    Empty(&'static str),
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.server.bind_address.clone()));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.logging.level.parse::<Severity>().is_err() {
        errors.push(ValidationError::LogLevel(config.logging.level.clone()));
    }
    if config.logging.environment.trim().is_empty() {
        errors.push(ValidationError::Empty("environment"));
    }
    if config.logging.version.trim().is_empty() {
        errors.push(ValidationError::Empty("version"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
