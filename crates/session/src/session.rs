//! Transport session state machine.
//!
//! A session moves between three phases: idle, connecting and connected.
//! Connecting a session resets the consumer panels, opens the channel and
//! waits for the ready handshake; on ready it establishes the three
//! inbound subscriptions before sending the start envelope. User input
//! typed before the session is connected is buffered and rides the start
//! envelope of the connect it triggers.
//!
//! The handle is cheap to clone; all state sits behind a mutex and is
//! mutated only on command or channel-event dispatch. Channel faults are
//! logged and never move the state machine on their own; teardown is
//! always an explicit `disconnect`.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use vui_core::{
    locale, AnalysisSituation, Category, DisplayEvent, Envelope, Error, InboundFrame, Phase,
    Result,
};

use crate::channel::{ChannelConnector, ChannelEvent, DuplexChannel};
use crate::events::SessionEvents;

/// Handle to a transport session.
#[derive(Clone)]
pub struct TransportSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    connector: Box<dyn ChannelConnector>,
    events: SessionEvents,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    phase: Phase,
    channel: Option<Box<dyn DuplexChannel>>,
    subscriptions: Vec<Category>,
    endpoint: Option<String>,
    locale: String,
    pending_sentence: Option<String>,
    /// Bumped on every disconnect so callbacks from a previous channel
    /// become no-ops.
    epoch: u64,
}

impl TransportSession {
    pub fn new(connector: impl ChannelConnector + 'static) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4().to_string(),
                connector: Box::new(connector),
                events: SessionEvents::new(),
                state: Mutex::new(SessionState {
                    locale: "en".to_string(),
                    ..Default::default()
                }),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase() == Phase::Connected
    }

    pub fn locale(&self) -> String {
        self.inner.state.lock().locale.clone()
    }

    /// Record endpoint and locale without connecting, so that a later
    /// `send_message` can trigger the connect on its own.
    pub fn configure(&self, endpoint: &str, locale: &str) -> Result<()> {
        locale::validate(locale)?;
        let mut state = self.inner.state.lock();
        state.endpoint = Some(endpoint.to_string());
        state.locale = locale.to_string();
        Ok(())
    }

    /// Open the session. A no-op unless the session is idle.
    ///
    /// Publishes the panel resets and `initialized = true` as soon as the
    /// attempt is underway; `connected = true` follows once the channel
    /// reports ready.
    pub async fn connect(&self, endpoint: &str, locale: &str) -> Result<()> {
        locale::validate(locale)?;
        let epoch = {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Idle {
                tracing::debug!(
                    session_id = %self.inner.id,
                    phase = %state.phase,
                    "connect ignored, session not idle"
                );
                return Ok(());
            }
            state.endpoint = Some(endpoint.to_string());
            state.locale = locale.to_string();
            state.phase = Phase::Connecting;
            state.epoch
        };

        self.inner.events.publish_analysis(None);
        self.inner.events.publish_result(None);
        self.inner.events.publish_initialized(true);

        tracing::info!(session_id = %self.inner.id, endpoint, "opening channel");
        match self.inner.connector.open(endpoint).await {
            Ok((channel, events)) => {
                {
                    let mut state = self.inner.state.lock();
                    if state.epoch != epoch || state.phase != Phase::Connecting {
                        drop(state);
                        // A disconnect raced the open; the late channel loses.
                        channel.close();
                        tracing::debug!(
                            session_id = %self.inner.id,
                            "channel opened after disconnect, discarding"
                        );
                        return Ok(());
                    }
                    state.channel = Some(channel);
                }
                self.spawn_pump(events, epoch);
                Ok(())
            }
            Err(e) => {
                tracing::error!(session_id = %self.inner.id, error = %e, "channel open failed");
                {
                    let mut state = self.inner.state.lock();
                    if state.epoch == epoch {
                        state.phase = Phase::Idle;
                    }
                }
                self.inner.events.publish_initialized(false);
                Err(e)
            }
        }
    }

    /// Send one conversation turn.
    ///
    /// While connected this is a plain input envelope. Otherwise the text
    /// is buffered as the initial sentence and a connect is triggered with
    /// the recorded endpoint; the buffered text rides the start envelope
    /// of whichever connect completes.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let (endpoint, locale) = {
            let mut state = self.inner.state.lock();
            if state.phase == Phase::Connected {
                match state.channel.as_ref() {
                    Some(channel) => {
                        if let Err(e) = channel.send(Envelope::input(text)) {
                            tracing::error!(
                                session_id = %self.inner.id,
                                error = %e,
                                "input send failed"
                            );
                        }
                    }
                    None => tracing::error!(
                        session_id = %self.inner.id,
                        "connected session without channel"
                    ),
                }
                return Ok(());
            }
            let endpoint = state.endpoint.clone().ok_or(Error::NotConfigured)?;
            state.pending_sentence = Some(text.to_string());
            (endpoint, state.locale.clone())
        };
        self.connect(&endpoint, &locale).await
    }

    /// Ask the service to revise the current query.
    ///
    /// Only valid while connected. Publishes `result = None` (the cleared
    /// result) before returning, so stale tables disappear immediately.
    pub fn send_revise_query(&self) -> Result<()> {
        {
            let state = self.inner.state.lock();
            if state.phase != Phase::Connected {
                return Err(Error::IllegalState {
                    operation: "reviseQuery",
                    phase: state.phase,
                });
            }
            if let Some(channel) = state.channel.as_ref() {
                if let Err(e) = channel.send(Envelope::revise_query()) {
                    tracing::error!(
                        session_id = %self.inner.id,
                        error = %e,
                        "reviseQuery send failed"
                    );
                }
            }
        }
        self.inner.events.publish_result(None);
        Ok(())
    }

    /// Tear the session down. Valid in every phase, idempotent, never
    /// errors. Always publishes `connected = false` followed by
    /// `initialized = false`.
    pub fn disconnect(&self) {
        let channel = {
            let mut state = self.inner.state.lock();
            state.subscriptions.clear();
            state.pending_sentence = None;
            state.epoch += 1;
            state.phase = Phase::Idle;
            state.channel.take()
        };
        if let Some(channel) = channel {
            channel.close();
        }
        self.inner.events.publish_connected(false);
        self.inner.events.publish_initialized(false);
        tracing::info!(session_id = %self.inner.id, "session disconnected");
    }

    pub fn subscribe_initialized(&self) -> broadcast::Receiver<bool> {
        self.inner.events.subscribe_initialized()
    }

    pub fn subscribe_connected(&self) -> broadcast::Receiver<bool> {
        self.inner.events.subscribe_connected()
    }

    pub fn subscribe_display(&self) -> broadcast::Receiver<Option<DisplayEvent>> {
        self.inner.events.subscribe_display()
    }

    pub fn subscribe_result(&self) -> broadcast::Receiver<Option<String>> {
        self.inner.events.subscribe_result()
    }

    pub fn subscribe_analysis(&self) -> broadcast::Receiver<Option<AnalysisSituation>> {
        self.inner.events.subscribe_analysis()
    }

    fn spawn_pump(&self, mut events: mpsc::UnboundedReceiver<ChannelEvent>, epoch: u64) {
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                session.handle_channel_event(event, epoch);
            }
        });
    }

    fn handle_channel_event(&self, event: ChannelEvent, epoch: u64) {
        match event {
            ChannelEvent::Ready => self.on_ready(epoch),
            ChannelEvent::Frame(frame) => self.on_frame(frame, epoch),
            ChannelEvent::Fault(reason) => {
                tracing::error!(session_id = %self.inner.id, %reason, "channel fault");
            }
            ChannelEvent::Closed => {
                tracing::warn!(session_id = %self.inner.id, "channel closed by peer");
            }
        }
    }

    /// Ready handshake: announce the connection, establish the three
    /// subscriptions, then send the start envelope with the buffered
    /// initial sentence (if any). Subscriptions always precede start.
    fn on_ready(&self, epoch: u64) {
        let mut state = self.inner.state.lock();
        if state.epoch != epoch || state.phase != Phase::Connecting {
            return;
        }
        self.inner.events.publish_connected(true);

        let SessionState {
            channel,
            subscriptions,
            pending_sentence,
            locale,
            phase,
            ..
        } = &mut *state;
        let Some(channel) = channel.as_ref() else {
            tracing::error!(session_id = %self.inner.id, "ready without channel");
            return;
        };

        for category in Category::ALL {
            if let Err(e) = channel.send(Envelope::subscribe(category)) {
                tracing::error!(
                    session_id = %self.inner.id,
                    category = %category,
                    error = %e,
                    "subscribe send failed"
                );
            }
            subscriptions.push(category);
        }

        let initial = pending_sentence.take();
        if let Err(e) = channel.send(Envelope::start(locale, initial.as_deref())) {
            tracing::error!(session_id = %self.inner.id, error = %e, "start send failed");
        }

        *phase = Phase::Connected;
        tracing::info!(session_id = %self.inner.id, "session connected");
    }

    fn on_frame(&self, frame: InboundFrame, epoch: u64) {
        let locale = {
            let state = self.inner.state.lock();
            if state.epoch != epoch {
                return;
            }
            if !state.subscriptions.contains(&frame.category) {
                tracing::debug!(
                    session_id = %self.inner.id,
                    category = %frame.category,
                    "frame without subscription dropped"
                );
                return;
            }
            state.locale.clone()
        };

        match frame.category {
            Category::Display => match serde_json::from_value::<DisplayEvent>(frame.body) {
                Ok(display) => self.inner.events.publish_display(Some(display)),
                Err(e) => tracing::error!(
                    session_id = %self.inner.id,
                    error = %e,
                    "malformed display payload dropped"
                ),
            },
            Category::Result => match frame.body {
                Value::Null => self.inner.events.publish_result(None),
                Value::String(text) => {
                    self.inner.events.publish_result(Some(text));
                    // Let message-oriented consumers know a table arrived.
                    let notice = locale::result_ready_notice(&locale);
                    self.inner
                        .events
                        .publish_display(Some(DisplayEvent::message(notice)));
                }
                other => tracing::error!(
                    session_id = %self.inner.id,
                    body = %other,
                    "malformed result payload dropped"
                ),
            },
            Category::AnalysisSituation => {
                match serde_json::from_value::<AnalysisSituation>(frame.body) {
                    Ok(situation) => self.inner.events.publish_analysis(Some(situation)),
                    Err(e) => tracing::error!(
                        session_id = %self.inner.id,
                        error = %e,
                        "malformed analysis-situation payload dropped"
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnector;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Let the spawned pump task drain pending channel events.
    async fn settle() {
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    }

    fn session() -> (TransportSession, crate::testing::MockHandle) {
        let (connector, handle) = MockConnector::new();
        (TransportSession::new(connector), handle)
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        assert_eq!(session.phase(), Phase::Connecting);

        session.connect("svc:1", "en").await.unwrap();
        session.connect("other:2", "de").await.unwrap();
        assert_eq!(handle.open_count(), 1);
        // the ignored connects must not overwrite the recorded locale
        assert_eq!(session.locale(), "en");
    }

    #[tokio::test]
    async fn test_connect_publishes_resets_then_initialized() {
        let (session, _handle) = session();
        let mut analysis = session.subscribe_analysis();
        let mut result = session.subscribe_result();
        let mut initialized = session.subscribe_initialized();

        session.connect("svc:1", "en").await.unwrap();

        assert_eq!(analysis.try_recv().unwrap(), None);
        assert_eq!(result.try_recv().unwrap(), None);
        assert!(initialized.try_recv().unwrap());
    }

    #[tokio::test]
    async fn test_ready_subscribes_before_start() {
        let (session, handle) = session();
        let mut connected = session.subscribe_connected();

        session.connect("svc:1", "en").await.unwrap();
        assert!(handle.sent().is_empty());

        handle.ready();
        settle().await;

        assert!(connected.try_recv().unwrap());
        assert_eq!(session.phase(), Phase::Connected);

        let sent = handle.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0], Envelope::subscribe(Category::Display));
        assert_eq!(sent[1], Envelope::subscribe(Category::Result));
        assert_eq!(sent[2], Envelope::subscribe(Category::AnalysisSituation));
        assert_eq!(sent[3].destination, "start");
        assert_eq!(sent[3].body["locale"], "en");
        assert!(sent[3].body["initialSentence"].is_null());
    }

    #[tokio::test]
    async fn test_send_message_without_endpoint_fails() {
        let (session, _handle) = session();
        let err = session.send_message("hello").await.err().unwrap();
        assert!(matches!(err, Error::NotConfigured));
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_send_message_while_idle_buffers_then_connects() {
        let (session, handle) = session();
        session.configure("svc:1", "en").unwrap();

        session.send_message("show me revenue").await.unwrap();
        // step one is observable on its own: the connect is underway but
        // nothing has been sent yet
        assert_eq!(session.phase(), Phase::Connecting);
        assert_eq!(handle.open_count(), 1);
        assert!(handle.sent().is_empty());

        handle.ready();
        settle().await;

        let sent = handle.sent();
        assert_eq!(sent[3].destination, "start");
        assert_eq!(sent[3].body["initialSentence"], "show me revenue");
    }

    #[tokio::test]
    async fn test_buffered_sentence_is_consumed_exactly_once() {
        let (session, handle) = session();
        session.configure("svc:1", "en").unwrap();
        session.send_message("first").await.unwrap();
        handle.ready();
        settle().await;

        session.send_message("second").await.unwrap();
        let sent = handle.sent();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[4], Envelope::input("second"));
        let starts = sent.iter().filter(|e| e.destination == "start").count();
        assert_eq!(starts, 1);
    }

    #[tokio::test]
    async fn test_send_message_while_connecting_keeps_single_channel() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();

        // typed before the ready handshake landed
        session.send_message("eager input").await.unwrap();
        assert_eq!(handle.open_count(), 1);

        handle.ready();
        settle().await;
        let sent = handle.sent();
        assert_eq!(sent[3].body["initialSentence"], "eager input");
    }

    #[tokio::test]
    async fn test_revise_query_requires_connected() {
        let (session, handle) = session();
        let err = session.send_revise_query().err().unwrap();
        assert!(matches!(
            err,
            Error::IllegalState {
                operation: "reviseQuery",
                phase: Phase::Idle
            }
        ));

        session.connect("svc:1", "en").await.unwrap();
        let err = session.send_revise_query().err().unwrap();
        assert!(matches!(
            err,
            Error::IllegalState {
                phase: Phase::Connecting,
                ..
            }
        ));
        assert!(handle.sent().is_empty());
    }

    #[tokio::test]
    async fn test_revise_query_clears_result_synchronously() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        handle.ready();
        settle().await;

        let mut result = session.subscribe_result();
        session.send_revise_query().unwrap();

        // published before send_revise_query returned
        assert_eq!(result.try_recv().unwrap(), None);
        assert_eq!(handle.sent().last().unwrap(), &Envelope::revise_query());
    }

    #[tokio::test]
    async fn test_disconnect_event_order_and_idempotence() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        handle.ready();
        settle().await;

        let mut connected = session.subscribe_connected();
        let mut initialized = session.subscribe_initialized();

        session.disconnect();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(handle.close_count(), 1);
        assert!(!connected.try_recv().unwrap());
        assert!(!initialized.try_recv().unwrap());

        // valid in every phase, including idle
        session.disconnect();
        assert!(!connected.try_recv().unwrap());
        assert!(!initialized.try_recv().unwrap());
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_drops_buffered_sentence() {
        let (session, handle) = session();
        session.configure("svc:1", "en").unwrap();
        session.send_message("stale sentence").await.unwrap();

        // torn down before the ready handshake landed
        session.disconnect();

        session.connect("svc:1", "en").await.unwrap();
        handle.ready();
        settle().await;

        let sent = handle.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[3].destination, "start");
        assert!(sent[3].body["initialSentence"].is_null());
    }

    #[tokio::test]
    async fn test_stale_channel_events_are_ignored_after_disconnect() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        handle.ready();
        settle().await;

        session.disconnect();
        let mut display = session.subscribe_display();

        // the old channel still had a frame in flight
        handle.frame(
            Category::Display,
            json!({ "type": "MessageDisplay", "display": { "displayMessage": "late" } }),
        );
        settle().await;

        assert!(matches!(display.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_frames_without_subscription_are_dropped() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        let mut display = session.subscribe_display();

        // still connecting, no subscriptions established yet
        handle.frame(
            Category::Display,
            json!({ "type": "MessageDisplay", "display": { "displayMessage": "early" } }),
        );
        settle().await;

        assert!(matches!(display.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_display_frames_are_published_typed() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        handle.ready();
        settle().await;

        let mut display = session.subscribe_display();
        handle.frame(
            Category::Display,
            json!({
                "type": "ListDisplay",
                "display": { "displayMessage": "Pick a cube.", "data": [{ "title": "Sales" }] }
            }),
        );
        settle().await;

        match display.try_recv().unwrap() {
            Some(DisplayEvent::List(list)) => assert_eq!(list.display_message, "Pick a cube."),
            other => panic!("expected a list display, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_display_is_dropped() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        handle.ready();
        settle().await;

        let mut display = session.subscribe_display();
        handle.frame(Category::Display, json!({ "type": "NoSuchDisplay" }));
        settle().await;

        assert!(matches!(display.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(session.phase(), Phase::Connected);
    }

    #[tokio::test]
    async fn test_result_publishes_value_and_synthetic_notice() {
        let (session, handle) = session();
        session.connect("svc:1", "de").await.unwrap();
        handle.ready();
        settle().await;

        let mut result = session.subscribe_result();
        let mut display = session.subscribe_display();
        handle.frame(Category::Result, json!("region;revenue\nEU;42"));
        settle().await;

        assert_eq!(
            result.try_recv().unwrap().as_deref(),
            Some("region;revenue\nEU;42")
        );
        match display.try_recv().unwrap() {
            Some(event) => assert_eq!(
                event.display_message(),
                Some("Das Ergebnis ist nun verfügbar.")
            ),
            None => panic!("expected the synthetic notice"),
        }
    }

    #[tokio::test]
    async fn test_null_result_clears_without_notice() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        handle.ready();
        settle().await;

        let mut result = session.subscribe_result();
        let mut display = session.subscribe_display();
        handle.frame(Category::Result, Value::Null);
        settle().await;

        assert_eq!(result.try_recv().unwrap(), None);
        assert!(matches!(display.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_analysis_situation_requires_cube() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        handle.ready();
        settle().await;

        let mut analysis = session.subscribe_analysis();

        handle.frame(Category::AnalysisSituation, json!({ "measures": [] }));
        settle().await;
        assert!(matches!(analysis.try_recv(), Err(TryRecvError::Empty)));

        handle.frame(
            Category::AnalysisSituation,
            json!({ "cube": { "label": "Sales" }, "measures": [] }),
        );
        settle().await;
        let situation = analysis.try_recv().unwrap().unwrap();
        assert_eq!(situation.cube_label(), Some("Sales"));
    }

    #[tokio::test]
    async fn test_channel_faults_do_not_change_phase() {
        let (session, handle) = session();
        session.connect("svc:1", "en").await.unwrap();
        handle.ready();
        settle().await;

        handle.fault("broken pipe");
        handle.closed();
        settle().await;

        assert_eq!(session.phase(), Phase::Connected);
    }

    #[tokio::test]
    async fn test_failed_open_returns_to_idle() {
        let (session, handle) = session();
        handle.fail_next_open();

        let mut initialized = session.subscribe_initialized();
        let err = session.connect("svc:1", "en").await.err().unwrap();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(session.phase(), Phase::Idle);

        assert!(initialized.try_recv().unwrap());
        assert!(!initialized.try_recv().unwrap());

        // a later connect may succeed
        session.connect("svc:1", "en").await.unwrap();
        assert_eq!(session.phase(), Phase::Connecting);
    }

    #[tokio::test]
    async fn test_invalid_locale_is_rejected() {
        let (session, handle) = session();
        assert!(session.connect("svc:1", "english").await.is_err());
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(handle.open_count(), 0);
    }
}
