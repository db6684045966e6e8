//! Typed event fan-out.
//!
//! One broadcast stream per inbound category plus the two lifecycle
//! streams. Publishing ignores the no-receiver case: consumers come and
//! go, the session does not care.

use tokio::sync::broadcast;

use vui_core::{AnalysisSituation, DisplayEvent};

const EVENT_CAPACITY: usize = 100;

pub(crate) struct SessionEvents {
    initialized: broadcast::Sender<bool>,
    connected: broadcast::Sender<bool>,
    display: broadcast::Sender<Option<DisplayEvent>>,
    result: broadcast::Sender<Option<String>>,
    analysis: broadcast::Sender<Option<AnalysisSituation>>,
}

impl SessionEvents {
    pub(crate) fn new() -> Self {
        Self {
            initialized: broadcast::channel(EVENT_CAPACITY).0,
            connected: broadcast::channel(EVENT_CAPACITY).0,
            display: broadcast::channel(EVENT_CAPACITY).0,
            result: broadcast::channel(EVENT_CAPACITY).0,
            analysis: broadcast::channel(EVENT_CAPACITY).0,
        }
    }

    pub(crate) fn publish_initialized(&self, value: bool) {
        let _ = self.initialized.send(value);
    }

    pub(crate) fn publish_connected(&self, value: bool) {
        let _ = self.connected.send(value);
    }

    pub(crate) fn publish_display(&self, value: Option<DisplayEvent>) {
        let _ = self.display.send(value);
    }

    pub(crate) fn publish_result(&self, value: Option<String>) {
        let _ = self.result.send(value);
    }

    pub(crate) fn publish_analysis(&self, value: Option<AnalysisSituation>) {
        let _ = self.analysis.send(value);
    }

    pub(crate) fn subscribe_initialized(&self) -> broadcast::Receiver<bool> {
        self.initialized.subscribe()
    }

    pub(crate) fn subscribe_connected(&self) -> broadcast::Receiver<bool> {
        self.connected.subscribe()
    }

    pub(crate) fn subscribe_display(&self) -> broadcast::Receiver<Option<DisplayEvent>> {
        self.display.subscribe()
    }

    pub(crate) fn subscribe_result(&self) -> broadcast::Receiver<Option<String>> {
        self.result.subscribe()
    }

    pub(crate) fn subscribe_analysis(&self) -> broadcast::Receiver<Option<AnalysisSituation>> {
        self.analysis.subscribe()
    }
}
