//! Test doubles for the channel seam.
//!
//! `MockConnector` hands out channels that record every envelope and let
//! the test inject channel events by hand. Lives outside `#[cfg(test)]`
//! because downstream crates drive sessions in their own tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use vui_core::{Category, Envelope, Error, InboundFrame, Result};

use crate::channel::{ChannelConnector, ChannelEvent, DuplexChannel};

pub struct MockConnector {
    handle: MockHandle,
}

/// Shared view into a [`MockConnector`] and the channels it produced.
#[derive(Clone, Default)]
pub struct MockHandle {
    sent: Arc<Mutex<Vec<Envelope>>>,
    events: Arc<Mutex<Option<mpsc::UnboundedSender<ChannelEvent>>>>,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail_next_open: Arc<AtomicBool>,
}

impl MockConnector {
    pub fn new() -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn open(
        &self,
        _endpoint: &str,
    ) -> Result<(Box<dyn DuplexChannel>, mpsc::UnboundedReceiver<ChannelEvent>)> {
        if self.handle.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(Error::transport("mock open failure"));
        }
        self.handle.opens.fetch_add(1, Ordering::SeqCst);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        *self.handle.events.lock() = Some(event_tx);

        let channel = MockChannel {
            sent: self.handle.sent.clone(),
            closes: self.handle.closes.clone(),
        };
        Ok((Box::new(channel), event_rx))
    }
}

impl MockHandle {
    /// Inject the ready handshake.
    pub fn ready(&self) {
        self.emit(ChannelEvent::Ready);
    }

    /// Inject an inbound frame.
    pub fn frame(&self, category: Category, body: Value) {
        self.emit(ChannelEvent::Frame(InboundFrame { category, body }));
    }

    /// Inject a channel fault.
    pub fn fault(&self, reason: &str) {
        self.emit(ChannelEvent::Fault(reason.to_string()));
    }

    /// Inject a peer close.
    pub fn closed(&self) {
        self.emit(ChannelEvent::Closed);
    }

    /// Make the next `open` fail with a transport error.
    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }

    /// Everything sent over channels from this connector, in order.
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ChannelEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

struct MockChannel {
    sent: Arc<Mutex<Vec<Envelope>>>,
    closes: Arc<AtomicUsize>,
}

impl DuplexChannel for MockChannel {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.sent.lock().push(envelope);
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
