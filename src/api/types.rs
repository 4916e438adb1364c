//! Request and response bodies of the dashboard REST endpoints.

use crate::error::{DashboardError, Result};
use crate::sensors::StatusReport;
use crate::sensors::record::flexible_bool;
use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_OPEN_TIMEOUT_MINUTES: u32 = 1;
pub const MAX_OPEN_TIMEOUT_MINUTES: u32 = 60;

/// `GET /api/sensor/all`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SensorList {
    #[serde(default, deserialize_with = "null_as_empty_vec")]
    pub sensors: Vec<String>,
}

/// `GET /api/report?sensor=&page=`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    #[serde(default, deserialize_with = "null_as_empty_vec")]
    pub messages: Vec<StatusReport>,
    #[serde(default)]
    pub num_pages: u32,
}

/// Common `{status, error?}` reply. The open timeout lookup adds
/// `openTimeout`, the arming toggle adds `armed`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub open_timeout: Option<u32>,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub armed: Option<bool>,
}

impl CommandReply {
    /// Turn a non-`success` reply into [`DashboardError::CommandRejected`].
    ///
    /// Replies without a `status` field (older arming responses) count as
    /// success.
    pub fn into_result(self) -> Result<Self> {
        if self.status.is_empty() || self.status == "success" {
            return Ok(self);
        }
        let message = self
            .error
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.status.clone());
        Err(DashboardError::CommandRejected(message))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRequest<'a> {
    pub source: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTimeoutRequest<'a> {
    pub source: &'a str,
    pub open_timeout: u32,
}

pub fn validate_open_timeout(minutes: u32) -> Result<u32> {
    if (MIN_OPEN_TIMEOUT_MINUTES..=MAX_OPEN_TIMEOUT_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(DashboardError::InvalidOpenTimeout(minutes))
    }
}

fn null_as_empty_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_page_parses_server_shape() {
        let page: ReportPage = serde_json::from_value(json!({
            "messages": [
                {"source": "garage", "status": "OPEN", "timestamp": "1700000000", "version": "abc"}
            ],
            "numPages": 4
        }))
        .unwrap();
        assert_eq!(page.num_pages, 4);
        assert_eq!(page.messages[0].timestamp, 1_700_000_000);

        let empty: ReportPage =
            serde_json::from_value(json!({"messages": null, "numPages": 0})).unwrap();
        assert!(empty.messages.is_empty());
    }

    #[test]
    fn test_sensor_list_null() {
        let list: SensorList = serde_json::from_value(json!({"sensors": null})).unwrap();
        assert!(list.sensors.is_empty());
    }

    #[test]
    fn test_reply_success_and_rejection() {
        let ok: CommandReply =
            serde_json::from_value(json!({"status": "success", "openTimeout": 10})).unwrap();
        assert_eq!(ok.into_result().unwrap().open_timeout, Some(10));

        let rejected: CommandReply = serde_json::from_value(json!({
            "status": "error",
            "error": "open timeout must be between 1 and 60"
        }))
        .unwrap();
        match rejected.into_result() {
            Err(DashboardError::CommandRejected(msg)) => {
                assert_eq!(msg, "open timeout must be between 1 and 60")
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        let bare: CommandReply = serde_json::from_value(json!({"status": "failed"})).unwrap();
        assert!(matches!(
            bare.into_result(),
            Err(DashboardError::CommandRejected(msg)) if msg == "failed"
        ));
    }

    #[test]
    fn test_arming_reply_accepts_string_bool() {
        let reply: CommandReply =
            serde_json::from_value(json!({"status": "success", "armed": "true"})).unwrap();
        assert_eq!(reply.armed, Some(true));

        let reply: CommandReply = serde_json::from_value(json!({"armed": false})).unwrap();
        assert_eq!(reply.into_result().unwrap().armed, Some(false));
    }

    #[test]
    fn test_open_timeout_bounds() {
        assert_eq!(validate_open_timeout(1).unwrap(), 1);
        assert_eq!(validate_open_timeout(60).unwrap(), 60);
        assert!(matches!(
            validate_open_timeout(0),
            Err(DashboardError::InvalidOpenTimeout(0))
        ));
        assert!(validate_open_timeout(61).is_err());
    }

    #[test]
    fn test_open_timeout_request_shape() {
        let body = serde_json::to_value(OpenTimeoutRequest {
            source: "garage",
            open_timeout: 5,
        })
        .unwrap();
        assert_eq!(body, json!({"source": "garage", "openTimeout": 5}));
    }
}
