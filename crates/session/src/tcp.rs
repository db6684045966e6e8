//! Newline-delimited JSON channel over TCP.
//!
//! One JSON object per line in each direction. A writer task drains an
//! unbounded envelope queue; a reader task parses inbound lines into
//! frames. Both tasks stop when the channel is closed or the stream dies.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

use vui_core::{Envelope, Error, InboundFrame, Result};

use crate::channel::{ChannelConnector, ChannelEvent, DuplexChannel};

/// Connector producing [`TcpChannel`]s.
#[derive(Debug, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelConnector for TcpConnector {
    async fn open(
        &self,
        endpoint: &str,
    ) -> Result<(Box<dyn DuplexChannel>, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|e| Error::transport(format!("connect to {}: {}", endpoint, e)))?;
        let (read_half, mut write_half) = stream.into_split();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // The stream is usable as soon as the connect completed.
        let _ = event_tx.send(ChannelEvent::Ready);

        let mut writer_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    envelope = outbound_rx.recv() => {
                        let Some(envelope) = envelope else { break };
                        let mut line = match serde_json::to_string(&envelope) {
                            Ok(line) => line,
                            Err(e) => {
                                tracing::error!(error = %e, "failed to encode envelope");
                                continue;
                            }
                        };
                        line.push('\n');
                        if let Err(e) = write_half.write_all(line.as_bytes()).await {
                            tracing::error!(error = %e, "write failed, stopping writer");
                            break;
                        }
                    }
                    _ = writer_shutdown.changed() => break,
                }
            }
        });

        let mut reader_shutdown = shutdown_rx;
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) => {
                                let line = line.trim();
                                if line.is_empty() {
                                    continue;
                                }
                                match serde_json::from_str::<InboundFrame>(line) {
                                    Ok(frame) => {
                                        if event_tx.send(ChannelEvent::Frame(frame)).is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        tracing::warn!(error = %e, "undecodable inbound line dropped");
                                    }
                                }
                            }
                            Ok(None) => {
                                let _ = event_tx.send(ChannelEvent::Closed);
                                break;
                            }
                            Err(e) => {
                                let _ = event_tx.send(ChannelEvent::Fault(e.to_string()));
                                break;
                            }
                        }
                    }
                    _ = reader_shutdown.changed() => break,
                }
            }
        });

        let channel = TcpChannel {
            outbound: outbound_tx,
            shutdown: shutdown_tx,
        };
        Ok((Box::new(channel), event_rx))
    }
}

struct TcpChannel {
    outbound: mpsc::UnboundedSender<Envelope>,
    shutdown: watch::Sender<bool>,
}

impl DuplexChannel for TcpChannel {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.outbound
            .send(envelope)
            .map_err(|_| Error::transport("writer task has stopped"))
    }

    fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_emits_ready_and_writes_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let connector = TcpConnector::new();
        let (channel, mut events) = connector.open(&addr.to_string()).await.unwrap();
        assert_eq!(events.recv().await, Some(ChannelEvent::Ready));

        channel.send(Envelope::input("hello")).unwrap();
        let received = accept.await.unwrap();
        assert!(received.ends_with('\n'));
        let envelope: Envelope = serde_json::from_str(received.trim()).unwrap();
        assert_eq!(envelope, Envelope::input("hello"));

        channel.close();
    }

    #[tokio::test]
    async fn test_inbound_lines_become_frames_and_eof_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"category\":\"result\",\"body\":\"a;b\"}\nnot json\n")
                .await
                .unwrap();
            // dropping the socket produces EOF on the client side
        });

        let connector = TcpConnector::new();
        let (_channel, mut events) = connector.open(&addr.to_string()).await.unwrap();
        assert_eq!(events.recv().await, Some(ChannelEvent::Ready));

        match events.recv().await {
            Some(ChannelEvent::Frame(frame)) => {
                assert_eq!(frame.category, vui_core::Category::Result);
                assert_eq!(frame.body, "a;b");
            }
            other => panic!("expected a frame, got {:?}", other),
        }

        // The undecodable line is skipped, then EOF closes the channel.
        assert_eq!(events.recv().await, Some(ChannelEvent::Closed));
    }

    #[tokio::test]
    async fn test_connect_refused_is_a_transport_error() {
        let connector = TcpConnector::new();
        // Port 1 is essentially never listening.
        let err = connector.open("127.0.0.1:1").await.err().unwrap();
        assert!(matches!(err, Error::Transport(_)));
    }
}
