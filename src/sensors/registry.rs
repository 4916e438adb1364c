//! Sensor registry: the single source of truth for what the dashboard shows.
//!
//! Records are keyed by `source`. Snapshots replace the whole set, deltas
//! touch one record and create it when the source is new. Readers never see
//! the records directly; they get [`SensorView`]s with derived fields
//! computed against the time of the read.

use super::derive::{relative_age, status_appearance, truncate_version};
use super::record::{SensorRecord, SensorSnapshot, SensorStatus, StatusReport};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::BTreeMap;

/// What a delta did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    Updated,
    Created,
}

#[derive(Debug, Default)]
pub struct SensorRegistry {
    // BTreeMap keeps sources in ascending order for the view.
    records: BTreeMap<String, SensorRecord>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, source: &str) -> Option<&SensorRecord> {
        self.records.get(source)
    }

    /// Records in ascending `source` order.
    pub fn records(&self) -> impl Iterator<Item = &SensorRecord> {
        self.records.values()
    }

    /// Replace the registry's contents with a full listing.
    ///
    /// Sources missing from the snapshot are dropped. A source that survives
    /// keeps its fetched open timeout since snapshots never carry one.
    pub fn apply_snapshot(&mut self, snapshot: SensorSnapshot) {
        let SensorSnapshot { sensors, arming } = snapshot;
        let mut previous = std::mem::take(&mut self.records);

        for report in sensors.unwrap_or_default() {
            let armed = arming.get(&report.source).copied();
            let mut record = SensorRecord::from_report(report, armed);
            record.open_timeout_minutes = previous
                .remove(&record.source)
                .and_then(|old| old.open_timeout_minutes);
            self.records.insert(record.source.clone(), record);
        }

        info!(
            "[Registry] Snapshot applied: {} sensor(s), {} dropped",
            self.records.len(),
            previous.len()
        );
    }

    /// Apply a single-sensor update. Unknown sources get a new record.
    pub fn apply_delta(&mut self, report: StatusReport) -> DeltaOutcome {
        if let Some(record) = self.records.get_mut(&report.source) {
            debug!(
                "[Registry] {} -> {} at {}",
                report.source, report.status, report.timestamp
            );
            record.apply_report(report);
            return DeltaOutcome::Updated;
        }

        info!("[Registry] New sensor {} seen via status update", report.source);
        let record = SensorRecord::from_report(report, None);
        self.records.insert(record.source.clone(), record);
        DeltaOutcome::Created
    }

    /// Store the arming state returned by an arm/disarm command.
    /// Returns false if the source is not in the registry.
    pub fn set_armed(&mut self, source: &str, armed: bool) -> bool {
        match self.records.get_mut(source) {
            Some(record) => {
                record.armed = Some(armed);
                true
            }
            None => false,
        }
    }

    /// Store a fetched open timeout. Returns false if the source is unknown.
    pub fn set_open_timeout(&mut self, source: &str, minutes: u32) -> bool {
        match self.records.get_mut(source) {
            Some(record) => {
                record.open_timeout_minutes = Some(minutes);
                true
            }
            None => false,
        }
    }

    /// Read-only view of every record, derived against `now`.
    pub fn view(&self, now: DateTime<Utc>) -> Vec<SensorView> {
        self.records
            .values()
            .map(|record| SensorView::derive(record, now))
            .collect()
    }
}

/// A record as the UI sees it: raw fields plus derived display attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorView {
    pub source: String,
    pub status: SensorStatus,
    pub timestamp: i64,
    pub armed: Option<bool>,
    pub version: String,
    pub open_timeout_minutes: Option<u32>,
    pub icon: &'static str,
    pub color: &'static str,
    pub relative_age: String,
    pub short_version: String,
}

impl SensorView {
    pub fn derive(record: &SensorRecord, now: DateTime<Utc>) -> Self {
        let appearance = status_appearance(&record.status);
        Self {
            source: record.source.clone(),
            status: record.status.clone(),
            timestamp: record.timestamp,
            armed: record.armed,
            version: record.version.clone(),
            open_timeout_minutes: record.open_timeout_minutes,
            icon: appearance.icon,
            color: appearance.color,
            relative_age: relative_age(record.timestamp, now),
            short_version: truncate_version(&record.version).to_string(),
        }
    }
}
