//! Controller reconciliation loop and user-facing commands.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use vui_core::{
    DisplayEvent, Error, RecognitionEvent, Result, SpeechRecognizer, SpeechSynthesizer,
    VoiceConfig, VoiceState,
};
use vui_session::TransportSession;

const EVENT_CAPACITY: usize = 100;

/// Short grace period between a display arriving and the input surface
/// being refocused (and listening restarted).
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Events for presentation surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The input surface should take focus.
    FocusInput,
    /// The user tried to submit blank input while connected.
    InputRejected,
    ListeningChanged(bool),
    SpeakingChanged(bool),
    /// Whether a revise-query action is currently offered.
    ReviseAvailable(bool),
}

/// Handle to the conversation controller. Cheap to clone.
#[derive(Clone)]
pub struct ConversationController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    session: TransportSession,
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice_config: VoiceConfig,
    settle: Duration,
    state: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

struct ControllerState {
    voice: VoiceState,
    pending_input: Option<String>,
    awaiting_revise: bool,
    input_error: bool,
}

impl ConversationController {
    pub fn new(
        session: TransportSession,
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voice_config: VoiceConfig,
        auto_listen: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                session,
                recognizer,
                synthesizer,
                voice_config,
                settle: SETTLE_DELAY,
                state: Mutex::new(ControllerState {
                    voice: VoiceState {
                        auto_listen,
                        ..Default::default()
                    },
                    pending_input: None,
                    awaiting_revise: false,
                    input_error: false,
                }),
                events: broadcast::channel(EVENT_CAPACITY).0,
            }),
        }
    }

    /// Override the settle delay. Only effective before the handle is
    /// cloned; tests use a short delay.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.settle = settle;
        }
        self
    }

    pub fn session(&self) -> &TransportSession {
        &self.inner.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events.subscribe()
    }

    pub fn voice_state(&self) -> VoiceState {
        self.inner.state.lock().voice
    }

    pub fn awaiting_revise(&self) -> bool {
        self.inner.state.lock().awaiting_revise
    }

    pub fn input_error(&self) -> bool {
        self.inner.state.lock().input_error
    }

    pub fn pending_input(&self) -> Option<String> {
        self.inner.state.lock().pending_input.clone()
    }

    pub fn set_auto_listen(&self, enabled: bool) {
        self.inner.state.lock().voice.auto_listen = enabled;
    }

    /// Submit one conversation turn on the user's behalf.
    ///
    /// Blank input is rejected; while connected it additionally raises the
    /// input-error flag so the surface can mark the field.
    pub async fn submit(&self, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            if self.inner.session.is_connected() {
                self.inner.state.lock().input_error = true;
                self.publish(ControllerEvent::InputRejected);
            }
            return Err(Error::EmptyInput);
        }

        {
            let mut state = self.inner.state.lock();
            state.input_error = false;
            state.pending_input = None;
        }
        self.stop_speaking();
        self.inner.recognizer.stop();
        self.inner.session.send_message(trimmed).await
    }

    /// Ask the service to revise the current query.
    pub fn revise_query(&self) -> Result<()> {
        self.stop_speaking();
        self.inner.session.send_revise_query()?;
        self.inner.state.lock().awaiting_revise = false;
        self.publish(ControllerEvent::ReviseAvailable(false));
        Ok(())
    }

    /// Speak a text with the configured voice. Stops listening first;
    /// listening and speaking are never started together.
    pub fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        self.inner.recognizer.stop();
        self.inner.synthesizer.speak(text, &self.inner.voice_config)?;
        self.inner.state.lock().voice.speaking = true;
        self.publish(ControllerEvent::SpeakingChanged(true));
        Ok(())
    }

    pub fn stop_speaking(&self) {
        self.inner.synthesizer.cancel();
        let was_speaking = {
            let mut state = self.inner.state.lock();
            std::mem::replace(&mut state.voice.speaking, false)
        };
        if was_speaking {
            self.publish(ControllerEvent::SpeakingChanged(false));
        }
    }

    /// Start voice input, cancelling any speech first.
    pub fn start_listening(&self) -> Result<()> {
        self.stop_speaking();
        self.inner.recognizer.start()
    }

    pub fn stop_listening(&self) {
        self.inner.recognizer.stop();
    }

    /// Drive the reconciliation loop until every event source closes.
    pub async fn run(&self) {
        let mut initialized = self.inner.session.subscribe_initialized();
        let mut displays = self.inner.session.subscribe_display();
        let mut results = self.inner.session.subscribe_result();
        let mut recognition = self.inner.recognizer.subscribe();

        loop {
            tokio::select! {
                event = initialized.recv() => match event {
                    Ok(value) => self.on_initialized(value),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "initialized stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = displays.recv() => match event {
                    Ok(value) => self.on_display(value),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "display stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = results.recv() => match event {
                    Ok(value) => self.on_result(value),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "result stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = recognition.recv() => match event {
                    Ok(value) => self.on_recognition(value).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "recognition stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        tracing::debug!("controller loop finished");
    }

    fn on_initialized(&self, initialized: bool) {
        if initialized {
            return;
        }
        // Session is gone; quiesce the voice subsystem.
        self.inner.recognizer.stop();
        self.stop_speaking();
    }

    fn on_display(&self, display: Option<DisplayEvent>) {
        let Some(display) = display else {
            return;
        };
        if display.is_exit() {
            tracing::info!("exit display received, tearing session down");
            self.inner.session.disconnect();
            return;
        }

        {
            let mut state = self.inner.state.lock();
            state.pending_input = None;
            state.input_error = false;
        }

        // Voice the display message; a later listening restart interrupts
        // the utterance.
        if let Some(message) = display.display_message() {
            if let Err(e) = self.speak(message) {
                tracing::warn!(error = %e, "display speech failed");
            }
        }

        // Refocus after a short grace period; whether to resume listening
        // is decided then, a result or a disconnect may land in the
        // meantime.
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(controller.inner.settle).await;
            controller.publish(ControllerEvent::FocusInput);
            let should_listen = controller.inner.session.is_connected()
                && controller.inner.recognizer.is_supported()
                && {
                    let state = controller.inner.state.lock();
                    state.voice.auto_listen && !state.awaiting_revise
                };
            if should_listen {
                if let Err(e) = controller.start_listening() {
                    tracing::warn!(error = %e, "auto-listen restart failed");
                }
            }
        });
    }

    fn on_result(&self, result: Option<String>) {
        let Some(result) = result else {
            return;
        };
        if result.trim().is_empty() {
            return;
        }
        self.inner.state.lock().awaiting_revise = true;
        self.publish(ControllerEvent::ReviseAvailable(true));
        // The answer is on screen; stop capturing until the user decides
        // whether to revise.
        self.inner.recognizer.stop();
    }

    async fn on_recognition(&self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Started => {
                self.inner.state.lock().voice.listening = true;
                self.publish(ControllerEvent::ListeningChanged(true));
            }
            RecognitionEvent::Ended => {
                self.inner.state.lock().voice.listening = false;
                self.publish(ControllerEvent::ListeningChanged(false));
            }
            RecognitionEvent::Transcript { text, is_final } => {
                if !is_final {
                    self.inner.state.lock().pending_input = Some(text);
                    return;
                }
                if text.trim().is_empty() {
                    return;
                }
                if let Err(e) = self.submit(&text).await {
                    tracing::warn!(error = %e, "transcript submission failed");
                }
            }
        }
    }

    fn publish(&self, event: ControllerEvent) {
        let _ = self.inner.events.send(event);
    }
}
