//! Operator commands.
//!
//! Commands go to the server over REST, never over the live channel. When a
//! reply carries state the registry tracks (arming, open timeout) it is fed
//! back through the engine so the UI sees it without waiting for a push.
//! Failures are returned to the caller for display and are not retried.

use crate::api::SensorApi;
use crate::error::Result;
use crate::live::EngineHandle;
use log::warn;
use std::sync::Arc;

#[derive(Clone)]
pub struct SensorCommands {
    api: Arc<dyn SensorApi>,
    engine: EngineHandle,
}

impl SensorCommands {
    pub fn new(api: Arc<dyn SensorApi>, engine: EngineHandle) -> Self {
        Self { api, engine }
    }

    /// Toggle arm/disarm and record the result on the sensor.
    pub async fn toggle_arming(&self, source: &str) -> Result<bool> {
        let armed = self.api.toggle_arming(source).await.inspect_err(|e| {
            warn!("[Api] Arming toggle for {} failed: {}", source, e);
        })?;
        self.engine.record_armed(source, armed).await?;
        Ok(armed)
    }

    pub async fn restart(&self, source: &str) -> Result<()> {
        self.api.restart(source).await.inspect_err(|e| {
            warn!("[Api] Restart of {} failed: {}", source, e);
        })
    }

    /// Fetch the open timeout and store it on the sensor.
    pub async fn load_open_timeout(&self, source: &str) -> Result<u32> {
        let minutes = self.api.open_timeout(source).await?;
        self.engine.record_open_timeout(source, minutes).await?;
        Ok(minutes)
    }

    /// Update the open timeout; the registry is only touched once the
    /// server accepted the new value.
    pub async fn set_open_timeout(&self, source: &str, minutes: u32) -> Result<()> {
        self.api
            .set_open_timeout(source, minutes)
            .await
            .inspect_err(|e| warn!("[Api] Open timeout update for {} failed: {}", source, e))?;
        self.engine.record_open_timeout(source, minutes).await
    }
}
