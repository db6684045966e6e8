//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use vui_core::{locale, VoiceConfig};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Connection parameters
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Voice preferences
    #[serde(default)]
    pub voice: VoiceSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Service endpoint (host:port)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Conversation locale (short tag, e.g. `en` or `de`)
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_endpoint() -> String {
    "127.0.0.1:9075".to_string()
}
fn default_locale() -> String {
    "en".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            locale: default_locale(),
        }
    }
}

/// Voice preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Restart listening automatically after each display
    #[serde(default = "default_true")]
    pub auto_listen: bool,

    /// Synthesis volume (0.0 ..= 1.0)
    #[serde(default = "default_unit")]
    pub volume: f32,

    /// Synthesis pitch (0.0 ..= 2.0)
    #[serde(default = "default_unit")]
    pub pitch: f32,

    /// Synthesis rate (0.0 ..= 10.0)
    #[serde(default = "default_unit")]
    pub rate: f32,

    /// Selected voice URI per locale
    #[serde(default)]
    pub voices: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}
fn default_unit() -> f32 {
    1.0
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            auto_listen: true,
            volume: default_unit(),
            pitch: default_unit(),
            rate: default_unit(),
            voices: HashMap::new(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_connection()?;
        self.validate_voice()?;
        Ok(())
    }

    fn validate_connection(&self) -> Result<(), ConfigError> {
        if !self.connection.endpoint.contains(':') {
            return Err(ConfigError::InvalidValue {
                field: "connection.endpoint".to_string(),
                message: format!(
                    "Expected host:port, got '{}'",
                    self.connection.endpoint
                ),
            });
        }

        if locale::validate(&self.connection.locale).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "connection.locale".to_string(),
                message: format!(
                    "Expected a tag like 'en' or 'en-GB', got '{}'",
                    self.connection.locale
                ),
            });
        }

        Ok(())
    }

    fn validate_voice(&self) -> Result<(), ConfigError> {
        let voice = &self.voice;

        if !(0.0..=1.0).contains(&voice.volume) {
            return Err(ConfigError::InvalidValue {
                field: "voice.volume".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", voice.volume),
            });
        }

        if !(0.0..=2.0).contains(&voice.pitch) {
            return Err(ConfigError::InvalidValue {
                field: "voice.pitch".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", voice.pitch),
            });
        }

        if !(0.0..=10.0).contains(&voice.rate) {
            return Err(ConfigError::InvalidValue {
                field: "voice.rate".to_string(),
                message: format!("Must be between 0.0 and 10.0, got {}", voice.rate),
            });
        }

        for tag in voice.voices.keys() {
            if locale::validate(tag).is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "voice.voices".to_string(),
                    message: format!("Invalid locale key '{}'", tag),
                });
            }
        }

        Ok(())
    }

    /// Assemble the synthesis configuration for the active locale.
    pub fn voice_config(&self) -> VoiceConfig {
        let short = &self.connection.locale;
        VoiceConfig {
            language: locale::speech_tag(short).to_string(),
            voice_uri: self.voice.voices.get(short).cloned(),
            volume: self.voice.volume,
            pitch: self.voice.pitch,
            rate: self.voice.rate,
        }
    }

    /// Persist the settings as TOML (user preferences survive restarts).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let rendered =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Persist(e.to_string()))?;
        std::fs::write(path.as_ref(), rendered)
            .map_err(|e| ConfigError::Persist(e.to_string()))?;
        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (VUI prefix, `__` separator)
/// 2. config/{env}.toml (if env specified)
/// 3. config/default.toml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VUI")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.connection.endpoint, "127.0.0.1:9075");
        assert_eq!(settings.connection.locale, "en");
        assert!(settings.voice.auto_listen);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_endpoint_validation() {
        let mut settings = Settings::default();
        settings.connection.endpoint = "nocolon".to_string();
        assert!(settings.validate().is_err());

        settings.connection.endpoint = "analytics.example.org:9075".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_locale_validation() {
        let mut settings = Settings::default();
        settings.connection.locale = "english".to_string();
        assert!(settings.validate().is_err());

        settings.connection.locale = "de".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_voice_range_validation() {
        let mut settings = Settings::default();

        settings.voice.volume = 1.5;
        assert!(settings.validate_voice().is_err());
        settings.voice.volume = 1.0;

        settings.voice.pitch = 2.5;
        assert!(settings.validate_voice().is_err());
        settings.voice.pitch = 2.0;

        settings.voice.rate = -1.0;
        assert!(settings.validate_voice().is_err());
        settings.voice.rate = 10.0;

        assert!(settings.validate_voice().is_ok());
    }

    #[test]
    fn test_voice_config_uses_speech_tag_and_selected_voice() {
        let mut settings = Settings::default();
        settings.connection.locale = "de".to_string();
        settings
            .voice
            .voices
            .insert("de".to_string(), "urn:voice:anna".to_string());

        let voice = settings.voice_config();
        assert_eq!(voice.language, "de-DE");
        assert_eq!(voice.voice_uri.as_deref(), Some("urn:voice:anna"));
        assert!(voice.validate().is_ok());
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");

        let mut settings = Settings::default();
        settings.voice.auto_listen = false;
        settings.voice.rate = 2.0;
        settings.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let reloaded: Settings = toml::from_str(&raw).unwrap();
        assert!(!reloaded.voice.auto_listen);
        assert_eq!(reloaded.voice.rate, 2.0);
    }
}
