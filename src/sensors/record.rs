//! Sensor records and the payloads the server pushes for them.
//!
//! The server is loose about types: timestamps arrive as integers or decimal
//! strings and arming flags as booleans or `"true"`/`"false"` strings. The
//! deserializers here accept both so one odd field never costs a frame.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Raw contact state reported by a sensor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SensorStatus {
    Open,
    Closed,
    #[default]
    Unknown,
    /// A value this client does not know; kept verbatim.
    Other(String),
}

impl From<&str> for SensorStatus {
    fn from(s: &str) -> Self {
        match s {
            "OPEN" => SensorStatus::Open,
            "CLOSED" => SensorStatus::Closed,
            "UNKNOWN" => SensorStatus::Unknown,
            other => SensorStatus::Other(other.to_string()),
        }
    }
}

impl SensorStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SensorStatus::Open => "OPEN",
            SensorStatus::Closed => "CLOSED",
            SensorStatus::Unknown => "UNKNOWN",
            SensorStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for SensorStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SensorStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(SensorStatus::from).unwrap_or_default())
    }
}

/// One sensor's reported state as it appears on the wire.
///
/// Used for every entry of a `sensor/list` snapshot, for each `sensor/status`
/// delta and for report history rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub source: String,
    #[serde(default)]
    pub status: SensorStatus,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub version: String,
}

/// Full listing pushed on `sensor/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SensorSnapshot {
    /// `null` and absent both mean "no sensors".
    #[serde(default)]
    pub sensors: Option<Vec<StatusReport>>,
    #[serde(default, deserialize_with = "arming_map")]
    pub arming: HashMap<String, bool>,
}

impl SensorSnapshot {
    pub fn new(sensors: Vec<StatusReport>, arming: HashMap<String, bool>) -> Self {
        Self {
            sensors: Some(sensors),
            arming,
        }
    }
}

/// Authoritative in-memory state of one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorRecord {
    pub source: String,
    pub status: SensorStatus,
    /// Seconds since the epoch of the last reported transition.
    pub timestamp: i64,
    /// `None` until the server has told us either way.
    pub armed: Option<bool>,
    pub version: String,
    /// Operator threshold, fetched on demand; never part of a push.
    pub open_timeout_minutes: Option<u32>,
}

impl SensorRecord {
    pub fn from_report(report: StatusReport, armed: Option<bool>) -> Self {
        Self {
            source: report.source,
            status: report.status,
            timestamp: report.timestamp,
            armed,
            version: report.version,
            open_timeout_minutes: None,
        }
    }

    /// Overwrite the fields a delta carries. Everything else stays.
    pub fn apply_report(&mut self, report: StatusReport) {
        self.status = report.status;
        self.timestamp = report.timestamp;
        self.version = report.version;
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

fn flexible_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Option::<LooseNumber>::deserialize(deserializer)? {
        None => Ok(0),
        Some(LooseNumber::Int(n)) => Ok(n),
        Some(LooseNumber::Float(f)) => Ok(f as i64),
        Some(LooseNumber::Text(s)) if s.trim().is_empty() => Ok(0),
        Some(LooseNumber::Text(s)) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid timestamp {s:?}"))),
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseBool {
    Bool(bool),
    Text(String),
}

impl LooseBool {
    fn into_bool(self) -> Option<bool> {
        match self {
            LooseBool::Bool(b) => Some(b),
            LooseBool::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            LooseBool::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            LooseBool::Text(_) => None,
        }
    }
}

/// Accepts `true`, `"true"`, `false` or `"false"`; anything else is unknown.
pub(crate) fn flexible_bool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<bool>, D::Error> {
    Ok(Option::<LooseBool>::deserialize(deserializer)?.and_then(LooseBool::into_bool))
}

fn arming_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, bool>, D::Error> {
    let raw = Option::<HashMap<String, LooseBool>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(source, armed)| armed.into_bool().map(|a| (source, a)))
        .collect())
}
