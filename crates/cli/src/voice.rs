//! Terminal stand-ins for the platform voice adapters.
//!
//! The terminal has no speech engine: recognition reports itself as
//! unsupported and synthesis prints the utterance instead of speaking it.

use tokio::sync::broadcast;

use vui_core::{
    Error, RecognitionEvent, Result, SpeechRecognizer, SpeechSynthesizer, VoiceConfig,
};

pub struct NullRecognizer {
    events: broadcast::Sender<RecognitionEvent>,
}

impl NullRecognizer {
    pub fn new() -> Self {
        Self {
            events: broadcast::channel(16).0,
        }
    }
}

impl Default for NullRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechRecognizer for NullRecognizer {
    fn start(&self) -> Result<()> {
        Err(Error::Voice(
            "speech recognition is not available in the terminal client".to_string(),
        ))
    }

    fn stop(&self) {}

    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.events.subscribe()
    }

    fn is_supported(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct ConsoleSynthesizer;

impl ConsoleSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn speak(&self, text: &str, voice: &VoiceConfig) -> Result<()> {
        voice.validate()?;
        println!("(voice {}) {}", voice.language, text);
        Ok(())
    }

    fn cancel(&self) {}
}
