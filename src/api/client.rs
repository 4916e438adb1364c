//! REST client for sensor listing, report history and operator commands.

use super::types::{
    CommandReply, OpenTimeoutRequest, ReportPage, SensorList, SourceRequest,
    validate_open_timeout,
};
use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::de::DeserializeOwned;

/// The dashboard server's REST surface.
#[async_trait]
pub trait SensorApi: Send + Sync {
    /// Every sensor the server has ever seen.
    async fn list_sensors(&self) -> Result<Vec<String>>;

    /// One page of a sensor's status history.
    async fn report(&self, sensor: &str, page: u32) -> Result<ReportPage>;

    /// Configured open timeout in minutes.
    async fn open_timeout(&self, source: &str) -> Result<u32>;

    async fn restart(&self, source: &str) -> Result<()>;

    /// Flip arm/disarm and return the new armed state.
    async fn toggle_arming(&self, source: &str) -> Result<bool>;

    async fn set_open_timeout(&self, source: &str, minutes: u32) -> Result<()>;
}

/// [`SensorApi`] over HTTP against the dashboard origin.
#[derive(Debug, Clone)]
pub struct HttpSensorApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSensorApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<R: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<R> {
        let url = self.url(path);
        debug!("[Api] GET {}", url);
        let response = self.client.get(&url).query(query).send().await?;
        read_json(url, response).await
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: serde::Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("[Api] POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        read_json(url, response).await
    }
}

async fn read_json<R: DeserializeOwned>(url: String, response: reqwest::Response) -> Result<R> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        // Command endpoints send `{"status":"error","error":...}` with the 4xx.
        if let Ok(reply) = serde_json::from_str::<CommandReply>(&body)
            && let Err(rejected) = reply.into_result()
        {
            return Err(rejected);
        }
        return Err(DashboardError::HttpStatus {
            url,
            status: status.as_u16(),
            body: body.trim().to_string(),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl SensorApi for HttpSensorApi {
    async fn list_sensors(&self) -> Result<Vec<String>> {
        let list: SensorList = self.get("/api/sensor/all", &[]).await?;
        Ok(list.sensors)
    }

    async fn report(&self, sensor: &str, page: u32) -> Result<ReportPage> {
        self.get(
            "/api/report",
            &[("sensor", sensor.to_string()), ("page", page.to_string())],
        )
        .await
    }

    async fn open_timeout(&self, source: &str) -> Result<u32> {
        let reply: CommandReply = self
            .get("/api/sensor/getOpenTimeout", &[("source", source.to_string())])
            .await?;
        reply.into_result()?.open_timeout.ok_or_else(|| {
            DashboardError::CommandRejected(format!("no open timeout returned for {source}"))
        })
    }

    async fn restart(&self, source: &str) -> Result<()> {
        let reply: CommandReply = self
            .post("/api/sensor/restart", &SourceRequest { source })
            .await?;
        reply.into_result()?;
        info!("[Api] Restart requested for {}", source);
        Ok(())
    }

    async fn toggle_arming(&self, source: &str) -> Result<bool> {
        let reply: CommandReply = self
            .post("/api/sensor/arming", &SourceRequest { source })
            .await?;
        let armed = reply.into_result()?.armed.ok_or_else(|| {
            DashboardError::CommandRejected(format!("no arming state returned for {source}"))
        })?;
        info!(
            "[Api] {} is now {}",
            source,
            if armed { "armed" } else { "disarmed" }
        );
        Ok(armed)
    }

    async fn set_open_timeout(&self, source: &str, minutes: u32) -> Result<()> {
        let open_timeout = validate_open_timeout(minutes)?;
        let reply: CommandReply = self
            .post(
                "/api/sensor/openTimeout",
                &OpenTimeoutRequest {
                    source,
                    open_timeout,
                },
            )
            .await?;
        reply.into_result()?;
        Ok(())
    }
}
