//! Channel router for the live connection.
//!
//! Every inbound frame is an envelope `{"channel": ..., "message": ...}` where
//! `message` is itself a JSON document encoded as a string. The nesting is the
//! server's wire contract and is kept as-is in both directions.

use crate::error::{DashboardError, Result};
use crate::sensors::{SensorRegistry, SensorSnapshot, StatusReport};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const SENSOR_LIST_CHANNEL: &str = "sensor/list";
pub const SENSOR_STATUS_CHANNEL: &str = "sensor/status";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    pub message: String,
}

impl Envelope {
    /// Wrap a payload the way the server does: JSON inside a JSON string.
    pub fn encode<P: Serialize>(channel: &str, payload: &P) -> Result<String> {
        let envelope = Envelope {
            channel: channel.to_string(),
            message: serde_json::to_string(payload)?,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Parse the outer envelope and the inner payload.
    pub fn decode(raw: &str) -> Result<(String, Value)> {
        let envelope: Envelope = serde_json::from_str(raw)
            .map_err(|e| DashboardError::Decode(format!("envelope: {e}")))?;
        let payload = serde_json::from_str(&envelope.message).map_err(|e| {
            DashboardError::Decode(format!("{} payload: {e}", envelope.channel))
        })?;
        Ok((envelope.channel, payload))
    }
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched(String),
    /// No handler for this channel; ignored.
    Unhandled(String),
    /// Frame or payload failed to decode; dropped.
    Dropped,
}

type Handler<C> = Box<dyn Fn(&mut C, Value) -> Result<()> + Send + Sync>;

/// Dispatches decoded payloads to per-channel handlers that mutate `C`.
pub struct ChannelRouter<C> {
    handlers: HashMap<String, Handler<C>>,
}

impl<C> Default for ChannelRouter<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<C> ChannelRouter<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `channel`, replacing any previous one.
    pub fn register<F>(&mut self, channel: impl Into<String>, handler: F)
    where
        F: Fn(&mut C, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(channel.into(), Box::new(handler));
    }

    pub fn handles(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }

    /// Decode and dispatch one raw frame. Never fails; bad frames are logged
    /// and dropped.
    pub fn route(&self, target: &mut C, raw: &str) -> RouteOutcome {
        let (channel, payload) = match Envelope::decode(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("[Router] Dropping frame: {}", e);
                return RouteOutcome::Dropped;
            }
        };

        let Some(handler) = self.handlers.get(&channel) else {
            debug!("[Router] No handler for channel {}", channel);
            return RouteOutcome::Unhandled(channel);
        };

        match handler(target, payload) {
            Ok(()) => RouteOutcome::Dispatched(channel),
            Err(e) => {
                warn!("[Router] Dropping {} frame: {}", channel, e);
                RouteOutcome::Dropped
            }
        }
    }
}

/// Router wired with the sensor channels.
pub fn sensor_router() -> ChannelRouter<SensorRegistry> {
    let mut router = ChannelRouter::new();

    router.register(SENSOR_LIST_CHANNEL, |registry: &mut SensorRegistry, payload| {
        let snapshot: SensorSnapshot = serde_json::from_value(payload)?;
        registry.apply_snapshot(snapshot);
        Ok(())
    });

    router.register(SENSOR_STATUS_CHANNEL, |registry: &mut SensorRegistry, payload| {
        let report: StatusReport = serde_json::from_value(payload)?;
        registry.apply_delta(report);
        Ok(())
    });

    router
}
