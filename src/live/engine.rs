//! Sync engine: the one task that owns the sensor registry.
//!
//! Transport events, snapshot submissions, command results, the reconnect
//! timer and the age refresh tick all arrive on this task's `select!` loop,
//! so the registry is never mutated concurrently. The UI reads through a
//! `watch` channel and sends changes through [`EngineHandle`].

use super::router::{ChannelRouter, RouteOutcome, sensor_router};
use super::supervisor::{ConnectionState, ReconnectSupervisor};
use super::transport::{TaggedEvent, Transport};
use crate::config::SyncConfig;
use crate::error::{DashboardError, Result};
use crate::sensors::{SensorRegistry, SensorSnapshot, SensorView};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What the UI gets on every change.
#[derive(Debug, Clone)]
pub struct RegistryView {
    pub sensors: Arc<Vec<SensorView>>,
    pub connection: ConnectionState,
    pub generated_at: DateTime<Utc>,
}

impl RegistryView {
    fn empty() -> Self {
        Self {
            sensors: Arc::new(Vec::new()),
            connection: ConnectionState::Idle,
            generated_at: Utc::now(),
        }
    }

    /// True when the data shown may be out of date.
    pub fn is_stale(&self) -> bool {
        self.connection != ConnectionState::Connected
    }

    pub fn sensor(&self, source: &str) -> Option<&SensorView> {
        self.sensors.iter().find(|s| s.source == source)
    }
}

#[derive(Debug)]
enum EngineCommand {
    Snapshot(SensorSnapshot),
    Armed { source: String, armed: bool },
    OpenTimeout { source: String, minutes: u32 },
}

/// Cheap, cloneable access to a running [`SyncEngine`].
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    view: watch::Receiver<RegistryView>,
    cancel: CancellationToken,
}

impl EngineHandle {
    pub fn subscribe(&self) -> watch::Receiver<RegistryView> {
        self.view.clone()
    }

    /// Latest published view.
    pub fn current(&self) -> RegistryView {
        self.view.borrow().clone()
    }

    /// Apply a snapshot obtained outside the live channel. Goes through the
    /// same reconciliation as a pushed `sensor/list`.
    pub async fn apply_snapshot(&self, snapshot: SensorSnapshot) -> Result<()> {
        self.submit(EngineCommand::Snapshot(snapshot)).await
    }

    pub async fn record_armed(&self, source: impl Into<String>, armed: bool) -> Result<()> {
        self.submit(EngineCommand::Armed {
            source: source.into(),
            armed,
        })
        .await
    }

    pub async fn record_open_timeout(&self, source: impl Into<String>, minutes: u32) -> Result<()> {
        self.submit(EngineCommand::OpenTimeout {
            source: source.into(),
            minutes,
        })
        .await
    }

    /// Stop the engine and close the live connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn submit(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DashboardError::EngineStopped)
    }
}

pub struct SyncEngine<T: Transport> {
    supervisor: ReconnectSupervisor<T>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    commands_rx: mpsc::Receiver<EngineCommand>,
    router: ChannelRouter<SensorRegistry>,
    registry: SensorRegistry,
    view_tx: watch::Sender<RegistryView>,
    refresh_every: Duration,
    clock: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    cancel: CancellationToken,
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(transport: T, url: impl Into<String>, config: &SyncConfig) -> (Self, EngineHandle) {
        let (supervisor, events_rx) =
            ReconnectSupervisor::new(transport, url, config.reconnect_delay());
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (view_tx, view_rx) = watch::channel(RegistryView::empty());
        let cancel = CancellationToken::new();

        let engine = Self {
            supervisor,
            events_rx,
            commands_rx,
            router: sensor_router(),
            registry: SensorRegistry::new(),
            view_tx,
            refresh_every: config.age_refresh_interval(),
            clock: Box::new(Utc::now),
            cancel: cancel.clone(),
        };
        let handle = EngineHandle {
            commands: commands_tx,
            view: view_rx,
            cancel,
        };
        (engine, handle)
    }

    /// Replace the wall clock used to derive relative ages.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Run until [`EngineHandle::shutdown`] is called.
    pub async fn run(mut self) {
        info!("[Live] Sync engine started");

        let mut refresh =
            tokio::time::interval_at(Instant::now() + self.refresh_every, self.refresh_every);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.supervisor.start();
        self.publish();

        loop {
            let reconnect_at = self.supervisor.reconnect_deadline();

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(event) = self.events_rx.recv() => self.on_transport_event(event),
                Some(command) = self.commands_rx.recv() => self.on_command(command),
                _ = refresh.tick() => {
                    debug!("[Live] Refreshing sensor ages");
                    self.publish();
                }
                _ = sleep_until(reconnect_at) => {
                    if self.supervisor.fire_reconnect(Instant::now()) {
                        self.publish();
                    }
                }
            }
        }

        self.supervisor.shutdown();
        self.publish();
        info!("[Live] Sync engine stopped");
    }

    fn on_transport_event(&mut self, event: TaggedEvent) {
        let before = self.supervisor.state();
        let frame = self.supervisor.handle_event(event, Instant::now());

        let changed = match frame {
            Some(raw) => matches!(
                self.router.route(&mut self.registry, &raw),
                RouteOutcome::Dispatched(_)
            ),
            None => false,
        };

        if changed || self.supervisor.state() != before {
            self.publish();
        }
    }

    fn on_command(&mut self, command: EngineCommand) {
        let changed = match command {
            EngineCommand::Snapshot(snapshot) => {
                self.registry.apply_snapshot(snapshot);
                true
            }
            EngineCommand::Armed { source, armed } => self.registry.set_armed(&source, armed),
            EngineCommand::OpenTimeout { source, minutes } => {
                self.registry.set_open_timeout(&source, minutes)
            }
        };

        if changed {
            self.publish();
        }
    }

    fn publish(&self) {
        let now = (self.clock)();
        self.view_tx.send_replace(RegistryView {
            sensors: Arc::new(self.registry.view(now)),
            connection: self.supervisor.state(),
            generated_at: now,
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
