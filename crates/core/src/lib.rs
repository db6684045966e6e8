//! Core types for the VUI analytical dialogue client.
//!
//! This crate carries everything the workspace shares: the wire protocol
//! model (envelopes, inbound frames, the display union, analysis-situation
//! snapshots), the error taxonomy, locale helpers, and the trait seams for
//! the platform voice subsystem.

pub mod analysis;
pub mod display;
pub mod error;
pub mod locale;
pub mod protocol;
pub mod voice;

pub use analysis::AnalysisSituation;
pub use display::{DisplayEvent, DisplayItem};
pub use error::{Error, Result};
pub use protocol::{Category, Envelope, InboundFrame, Phase};
pub use voice::{
    RecognitionEvent, SpeechRecognizer, SpeechSynthesizer, VoiceConfig, VoiceState,
};
