//! Reconnection supervisor.
//!
//! Keeps exactly one live connection attempt at a time and retries forever
//! with a flat delay after every close. Each attempt gets a fresh
//! [`Generation`]; events from any other generation are discarded, so a late
//! close from a superseded connection cannot schedule a second reconnect.
//!
//! The supervisor does no waiting itself. The host loop asks for
//! [`ReconnectSupervisor::reconnect_deadline`], sleeps until then and calls
//! [`ReconnectSupervisor::fire_reconnect`].

use super::transport::{
    CloseReason, Connection, EventSink, Generation, TaggedEvent, Transport, TransportEvent,
};
use crate::error::{DashboardError, Result};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Not started yet.
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

pub struct ReconnectSupervisor<T: Transport> {
    transport: T,
    url: String,
    delay: Duration,
    state: ConnectionState,
    generation: Generation,
    connection: Option<Box<dyn Connection>>,
    reconnect_at: Option<Instant>,
    failed_attempts: u32,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl<T: Transport> ReconnectSupervisor<T> {
    /// Create a supervisor and the receiver its connections report to.
    pub fn new(
        transport: T,
        url: impl Into<String>,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            transport,
            url: url.into(),
            delay,
            state: ConnectionState::Idle,
            generation: 0,
            connection: None,
            reconnect_at: None,
            failed_attempts: 0,
            events_tx,
        };
        (supervisor, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Consecutive attempts that closed before opening.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Open the first connection. No-op once started.
    pub fn start(&mut self) {
        if self.state == ConnectionState::Idle {
            self.connect();
        }
    }

    fn connect(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            warn!("[Live] Connect requested while {}, ignoring", self.state);
            return;
        }

        self.generation += 1;
        self.state = ConnectionState::Connecting;
        info!(
            "[Live] Connecting to {} (generation {})",
            self.url, self.generation
        );

        let sink = EventSink::new(self.generation, self.events_tx.clone());
        self.connection = Some(self.transport.open(&self.url, sink));
    }

    /// Feed one transport event through the state machine.
    ///
    /// Returns the raw frame when the event is an inbound message from the
    /// current connection.
    pub fn handle_event(&mut self, tagged: TaggedEvent, now: Instant) -> Option<String> {
        if tagged.generation != self.generation {
            debug!(
                "[Live] Ignoring {:?} from stale generation {} (current {})",
                tagged.event, tagged.generation, self.generation
            );
            return None;
        }

        match tagged.event {
            TransportEvent::Opened => {
                if self.state == ConnectionState::Connecting {
                    info!("[Live] Connected (generation {})", self.generation);
                    self.state = ConnectionState::Connected;
                    self.failed_attempts = 0;
                }
                None
            }
            TransportEvent::Message(raw) => {
                if self.state == ConnectionState::Connected {
                    Some(raw)
                } else {
                    debug!("[Live] Dropping frame received while {}", self.state);
                    None
                }
            }
            TransportEvent::Closed(reason) => {
                self.handle_close(reason, now);
                None
            }
        }
    }

    fn handle_close(&mut self, reason: CloseReason, now: Instant) {
        match self.state {
            ConnectionState::Connecting => self.failed_attempts += 1,
            ConnectionState::Connected => {}
            ConnectionState::Idle | ConnectionState::Disconnected => {
                debug!("[Live] Duplicate close ignored: {:?}", reason);
                return;
            }
        }

        self.state = ConnectionState::Disconnected;
        self.connection = None;
        self.reconnect_at = Some(now + self.delay);
        warn!(
            "[Live] Connection closed ({:?}), reconnecting in {:?}",
            reason, self.delay
        );
    }

    /// Start the scheduled reconnect if it is due. Returns true if a new
    /// connection attempt was made.
    pub fn fire_reconnect(&mut self, now: Instant) -> bool {
        match self.reconnect_at {
            Some(at) if now >= at && self.state == ConnectionState::Disconnected => {
                self.reconnect_at = None;
                self.connect();
                true
            }
            _ => false,
        }
    }

    /// Send a frame on the current connection.
    pub fn send(&self, text: String) -> Result<()> {
        match (&self.connection, self.state) {
            (Some(conn), ConnectionState::Connected) => conn.send(text),
            _ => Err(DashboardError::NotConnected),
        }
    }

    /// Close the current connection and stop reconnecting.
    pub fn shutdown(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.close();
        }
        self.reconnect_at = None;
        self.state = ConnectionState::Idle;
        info!("[Live] Supervisor stopped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    pub(crate) struct MockState {
        pub sinks: Vec<EventSink>,
        pub opened_at: Vec<Instant>,
        pub urls: Vec<String>,
        pub sent: Vec<(Generation, String)>,
        pub closed: Vec<Generation>,
    }

    /// Records every open and hands the sinks back to the test.
    #[derive(Clone, Default)]
    pub(crate) struct MockTransport {
        pub state: Arc<Mutex<MockState>>,
    }

    impl MockTransport {
        pub fn open_count(&self) -> usize {
            self.state.lock().sinks.len()
        }

        pub fn sink(&self, index: usize) -> Option<EventSink> {
            self.state.lock().sinks.get(index).cloned()
        }
    }

    struct MockConnection {
        generation: Generation,
        state: Arc<Mutex<MockState>>,
    }

    impl Connection for MockConnection {
        fn send(&self, text: String) -> Result<()> {
            self.state.lock().sent.push((self.generation, text));
            Ok(())
        }

        fn close(&mut self) {
            self.state.lock().closed.push(self.generation);
        }
    }

    impl Transport for MockTransport {
        fn open(&self, url: &str, sink: EventSink) -> Box<dyn Connection> {
            let generation = sink.generation();
            let mut state = self.state.lock();
            state.urls.push(url.to_string());
            state.opened_at.push(Instant::now());
            state.sinks.push(sink);
            Box::new(MockConnection {
                generation,
                state: self.state.clone(),
            })
        }
    }

    const DELAY: Duration = Duration::from_secs(5);

    fn event(generation: Generation, event: TransportEvent) -> TaggedEvent {
        TaggedEvent { generation, event }
    }

    fn closed(generation: Generation) -> TaggedEvent {
        event(
            generation,
            TransportEvent::Closed(CloseReason::Remote("bye".to_string())),
        )
    }

    #[test]
    fn test_start_opens_once() {
        let transport = MockTransport::default();
        let (mut sup, _rx) = ReconnectSupervisor::new(transport.clone(), "ws://x/ws/", DELAY);

        sup.start();
        sup.start();

        assert_eq!(transport.open_count(), 1);
        assert_eq!(sup.state(), ConnectionState::Connecting);
        assert_eq!(sup.generation(), 1);
        assert_eq!(transport.state.lock().urls[0], "ws://x/ws/");
    }

    #[test]
    fn test_open_then_messages_flow() {
        let (mut sup, _rx) = ReconnectSupervisor::new(MockTransport::default(), "ws://x", DELAY);
        let now = Instant::now();
        sup.start();

        assert_eq!(sup.handle_event(event(1, TransportEvent::Opened), now), None);
        assert_eq!(sup.state(), ConnectionState::Connected);

        let frame = sup.handle_event(event(1, TransportEvent::Message("hi".into())), now);
        assert_eq!(frame.as_deref(), Some("hi"));
    }

    #[test]
    fn test_reconnect_waits_for_delay_and_fires_once() {
        let transport = MockTransport::default();
        let (mut sup, _rx) = ReconnectSupervisor::new(transport.clone(), "ws://x", DELAY);
        let t0 = Instant::now();
        sup.start();
        sup.handle_event(event(1, TransportEvent::Opened), t0);

        sup.handle_event(closed(1), t0);
        assert_eq!(sup.state(), ConnectionState::Disconnected);
        assert_eq!(sup.reconnect_deadline(), Some(t0 + DELAY));

        assert!(!sup.fire_reconnect(t0 + Duration::from_millis(4_999)));
        assert_eq!(transport.open_count(), 1);

        assert!(sup.fire_reconnect(t0 + DELAY));
        assert_eq!(transport.open_count(), 2);
        assert_eq!(sup.generation(), 2);

        assert!(!sup.fire_reconnect(t0 + DELAY * 3));
        assert_eq!(transport.open_count(), 2);
    }

    #[test]
    fn test_duplicate_and_stale_closes_do_not_double_reconnect() {
        let transport = MockTransport::default();
        let (mut sup, _rx) = ReconnectSupervisor::new(transport.clone(), "ws://x", DELAY);
        let t0 = Instant::now();
        sup.start();
        sup.handle_event(event(1, TransportEvent::Opened), t0);

        sup.handle_event(closed(1), t0);
        sup.handle_event(closed(1), t0 + Duration::from_secs(2));
        assert_eq!(sup.reconnect_deadline(), Some(t0 + DELAY));

        assert!(sup.fire_reconnect(t0 + DELAY));
        sup.handle_event(event(2, TransportEvent::Opened), t0 + DELAY);

        // Late close from the superseded connection.
        sup.handle_event(closed(1), t0 + DELAY);
        assert_eq!(sup.state(), ConnectionState::Connected);
        assert_eq!(sup.reconnect_deadline(), None);
        assert!(!sup.fire_reconnect(t0 + DELAY * 4));
        assert_eq!(transport.open_count(), 2);
    }

    #[test]
    fn test_stale_messages_are_dropped() {
        let (mut sup, _rx) = ReconnectSupervisor::new(MockTransport::default(), "ws://x", DELAY);
        let t0 = Instant::now();
        sup.start();
        sup.handle_event(closed(1), t0);
        sup.fire_reconnect(t0 + DELAY);
        sup.handle_event(event(2, TransportEvent::Opened), t0 + DELAY);

        let frame = sup.handle_event(event(1, TransportEvent::Message("old".into())), t0 + DELAY);
        assert_eq!(frame, None);
    }

    #[test]
    fn test_failed_attempts_reset_on_open() {
        let (mut sup, _rx) = ReconnectSupervisor::new(MockTransport::default(), "ws://x", DELAY);
        let mut now = Instant::now();
        sup.start();

        for generation in 1..=3 {
            sup.handle_event(closed(generation), now);
            now += DELAY;
            assert!(sup.fire_reconnect(now));
        }
        assert_eq!(sup.failed_attempts(), 3);

        sup.handle_event(event(4, TransportEvent::Opened), now);
        assert_eq!(sup.failed_attempts(), 0);
    }

    #[test]
    fn test_send_goes_to_current_connection_only() {
        let transport = MockTransport::default();
        let (mut sup, _rx) = ReconnectSupervisor::new(transport.clone(), "ws://x", DELAY);
        let t0 = Instant::now();
        sup.start();

        assert!(matches!(
            sup.send("early".into()),
            Err(DashboardError::NotConnected)
        ));

        sup.handle_event(event(1, TransportEvent::Opened), t0);
        tokio_test::assert_ok!(sup.send("ping".into()));
        assert_eq!(transport.state.lock().sent, vec![(1, "ping".to_string())]);
    }

    #[test]
    fn test_shutdown_closes_connection() {
        let transport = MockTransport::default();
        let (mut sup, _rx) = ReconnectSupervisor::new(transport.clone(), "ws://x", DELAY);
        sup.start();
        sup.shutdown();

        assert_eq!(transport.state.lock().closed, vec![1]);
        assert_eq!(sup.state(), ConnectionState::Idle);
        assert_eq!(sup.reconnect_deadline(), None);
    }
}
