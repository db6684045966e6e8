//! Configuration management for the VUI client.
//!
//! Supports loading configuration from:
//! - TOML files (`config/default.toml`, `config/{env}.toml`)
//! - Environment variables (`VUI__` prefixed, `__` separated)
//!
//! User preferences (locale, auto-listen, voice parameters) can be written
//! back with [`Settings::save`].

pub mod settings;

pub use settings::{
    load_settings, ConnectionConfig, ObservabilityConfig, Settings, VoiceSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Failed to persist configuration: {0}")]
    Persist(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
