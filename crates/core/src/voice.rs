//! Voice subsystem trait seams.
//!
//! Platform speech engines live behind these traits; the controller only
//! ever talks to trait objects. Adapters report what actually happened
//! through events, so listening/speaking state reflects the engine rather
//! than what was requested.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

/// Events emitted by a speech recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The engine started capturing audio.
    Started,
    /// The engine stopped capturing audio.
    Ended,
    /// A transcript update. Interim transcripts may be revised; a final
    /// transcript closes the utterance.
    Transcript { text: String, is_final: bool },
}

/// Speech input adapter.
///
/// `start` on an already-listening engine restarts it; `stop` on an idle
/// engine is a no-op. State changes arrive on the event stream.
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self) -> Result<()>;
    fn stop(&self);
    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent>;

    /// Whether the platform provides speech recognition at all.
    fn is_supported(&self) -> bool {
        true
    }
}

/// Speech output adapter.
///
/// `speak` cancels any in-flight utterance before starting the new one;
/// there is never more than one utterance active.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str, voice: &VoiceConfig) -> Result<()>;
    fn cancel(&self);
}

/// Synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// BCP-47 tag of the synthesis voice.
    pub language: String,
    /// Platform voice identifier, when the user picked a specific voice.
    pub voice_uri: Option<String>,
    /// 0.0 ..= 1.0
    pub volume: f32,
    /// 0.0 ..= 2.0
    pub pitch: f32,
    /// 0.0 ..= 10.0
    pub rate: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: "en-GB".to_string(),
            voice_uri: None,
            volume: 1.0,
            pitch: 1.0,
            rate: 1.0,
        }
    }
}

impl VoiceConfig {
    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        use crate::error::Error;
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(Error::Voice(format!(
                "volume must be within 0.0..=1.0, got {}",
                self.volume
            )));
        }
        if !(0.0..=2.0).contains(&self.pitch) {
            return Err(Error::Voice(format!(
                "pitch must be within 0.0..=2.0, got {}",
                self.pitch
            )));
        }
        if !(0.0..=10.0).contains(&self.rate) {
            return Err(Error::Voice(format!(
                "rate must be within 0.0..=10.0, got {}",
                self.rate
            )));
        }
        Ok(())
    }
}

/// Observable state of the voice subsystem.
///
/// `listening` and `speaking` are reflections of adapter events. They are
/// never both driven to `true` by the controller; starting one side
/// cancels the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceState {
    pub listening: bool,
    pub speaking: bool,
    pub auto_listen: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_config_default_is_valid() {
        assert!(VoiceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_voice_config_range_checks() {
        let mut config = VoiceConfig::default();

        config.volume = 1.5;
        assert!(config.validate().is_err());
        config.volume = 1.0;

        config.pitch = -0.1;
        assert!(config.validate().is_err());
        config.pitch = 2.0;

        config.rate = 10.5;
        assert!(config.validate().is_err());
        config.rate = 10.0;

        assert!(config.validate().is_ok());
    }
}
