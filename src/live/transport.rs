//! Transport connection for the live channel.
//!
//! A [`Transport`] opens one duplex connection per call and reports its
//! lifecycle through an [`EventSink`]. Opening never fails synchronously:
//! a bad URL or a refused connection arrives as a `Closed` event, possibly
//! before `Opened` was ever sent.

use crate::error::{DashboardError, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Tag identifying one connection attempt.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Connect failed or the stream errored.
    Error(String),
    /// The server closed the connection.
    Remote(String),
    /// We closed it.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    /// Exactly one raw inbound frame, in arrival order.
    Message(String),
    Closed(CloseReason),
}

/// A transport event stamped with the generation of the connection that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: Generation,
    pub event: TransportEvent,
}

/// Where a connection reports its lifecycle.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    pub fn new(generation: Generation, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, raw: impl Into<String>) {
        self.emit(TransportEvent::Message(raw.into()));
    }

    pub fn closed(&self, reason: CloseReason) {
        self.emit(TransportEvent::Closed(reason));
    }

    fn emit(&self, event: TransportEvent) {
        // The receiver only goes away when the engine shuts down.
        let _ = self.tx.send(TaggedEvent {
            generation: self.generation,
            event,
        });
    }
}

/// Handle to one open (or opening) connection.
pub trait Connection: Send {
    fn send(&self, text: String) -> Result<()>;

    /// Tear the connection down. No further events are reported.
    fn close(&mut self);
}

pub trait Transport: Send + 'static {
    fn open(&self, url: &str, sink: EventSink) -> Box<dyn Connection>;
}

/// Live channel over a WebSocket.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn open(&self, url: &str, sink: EventSink) -> Box<dyn Connection> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(url.to_string(), sink, outbound_rx));
        Box::new(WebSocketConnection {
            outbound_tx,
            task: Some(task),
        })
    }
}

struct WebSocketConnection {
    outbound_tx: mpsc::UnboundedSender<String>,
    task: Option<JoinHandle<()>>,
}

impl Connection for WebSocketConnection {
    fn send(&self, text: String) -> Result<()> {
        self.outbound_tx
            .send(text)
            .map_err(|_| DashboardError::NotConnected)
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_socket(
    url: String,
    sink: EventSink,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            sink.closed(CloseReason::Error(e.to_string()));
            return;
        }
    };

    sink.opened();
    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => sink.message(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => sink.message(text),
                    Err(e) => warn!("[Live] Dropping non UTF-8 binary frame: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_default();
                    break CloseReason::Remote(reason);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => break CloseReason::Error(e.to_string()),
                None => break CloseReason::Remote(String::new()),
            },
            outbound = outbound_rx.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        break CloseReason::Error(e.to_string());
                    }
                }
                None => {
                    debug!("[Live] Connection handle dropped, closing socket");
                    let _ = write.close().await;
                    break CloseReason::Local;
                }
            },
        }
    };

    sink.closed(reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_events_with_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);

        sink.opened();
        sink.message("frame");
        sink.closed(CloseReason::Local);

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.generation == 7));
        assert_eq!(events[1].event, TransportEvent::Message("frame".to_string()));
    }

    #[tokio::test]
    async fn test_bad_url_reports_close_not_panic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _conn = WebSocketTransport.open("not a url", EventSink::new(1, tx));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.generation, 1);
        assert!(matches!(
            event.event,
            TransportEvent::Closed(CloseReason::Error(_))
        ));
    }
}
