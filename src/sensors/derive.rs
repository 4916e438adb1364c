//! Display attributes computed from raw sensor fields.
//!
//! Everything here is pure and total. Nothing is stored; callers recompute on
//! every read so relative ages track the wall clock.

use super::record::SensorStatus;
use chrono::{DateTime, TimeZone, Utc};

const MINUTE: f64 = 60.0;
const HOUR: f64 = 3_600.0;
const DAY: f64 = 86_400.0;
const MONTH: f64 = 2_592_000.0;
const YEAR: f64 = 31_536_000.0;

/// Largest unit first; the first bucket whose interval exceeds 1 wins.
const AGE_BUCKETS: [(f64, &str); 5] = [
    (YEAR, "years"),
    (MONTH, "months"),
    (DAY, "days"),
    (HOUR, "hours"),
    (MINUTE, "minutes"),
];

const SHORT_VERSION_LEN: usize = 7;

/// Icon and color a status renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appearance {
    pub icon: &'static str,
    pub color: &'static str,
}

pub fn status_appearance(status: &SensorStatus) -> Appearance {
    match status {
        SensorStatus::Open => Appearance {
            icon: "unlock",
            color: "red",
        },
        SensorStatus::Closed => Appearance {
            icon: "lock",
            color: "green",
        },
        SensorStatus::Unknown | SensorStatus::Other(_) => Appearance {
            icon: "zap-off",
            color: "grey",
        },
    }
}

/// Coarse "N units ago" string, using 30-day months and 365-day years.
pub fn relative_age(timestamp: i64, now: DateTime<Utc>) -> String {
    let seconds = now.timestamp().saturating_sub(timestamp).max(0);
    let elapsed = seconds as f64;

    for (unit, name) in AGE_BUCKETS {
        let interval = elapsed / unit;
        if interval > 1.0 {
            return format!("{} {} ago", interval.floor() as i64, name);
        }
    }

    format!("{seconds} seconds ago")
}

/// First seven characters of a firmware build id.
pub fn truncate_version(version: &str) -> &str {
    match version.char_indices().nth(SHORT_VERSION_LEN) {
        Some((end, _)) => &version[..end],
        None => version,
    }
}

/// `Y-M-D H:MM:SS` in the given zone. Month, day and hour are not padded.
pub fn format_timestamp<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_opt(timestamp, 0).single() {
        Some(dt) => dt.format("%Y-%-m-%-d %-H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_status_appearance() {
        let open = status_appearance(&SensorStatus::from("OPEN"));
        assert_eq!((open.icon, open.color), ("unlock", "red"));

        let closed = status_appearance(&SensorStatus::from("CLOSED"));
        assert_eq!((closed.icon, closed.color), ("lock", "green"));

        let weird = status_appearance(&SensorStatus::from("WEIRD"));
        assert_eq!((weird.icon, weird.color), ("zap-off", "grey"));
        assert_eq!(status_appearance(&SensorStatus::Unknown), weird);
    }

    #[test]
    fn test_relative_age_buckets() {
        let now = at(1_700_000_000);
        let ts = now.timestamp();

        assert_eq!(relative_age(ts - 45, now), "45 seconds ago");
        assert_eq!(relative_age(ts - 3_700, now), "1 hours ago");
        assert_eq!(relative_age(ts - 90_000, now), "1 days ago");
        assert_eq!(relative_age(ts - 61 * 86_400, now), "2 months ago");
        assert_eq!(relative_age(ts - 400 * 86_400, now), "1 years ago");
    }

    #[test]
    fn test_relative_age_boundaries() {
        let now = at(1_700_000_000);
        let ts = now.timestamp();

        // Exactly one unit is not "more than one", so it falls to the next.
        assert_eq!(relative_age(ts - 60, now), "60 seconds ago");
        assert_eq!(relative_age(ts - 3_600, now), "60 minutes ago");
        assert_eq!(relative_age(ts, now), "0 seconds ago");
        assert_eq!(relative_age(ts + 30, now), "0 seconds ago");
    }

    #[test]
    fn test_relative_age_extreme_timestamps() {
        let now = at(1_700_000_000);

        assert_eq!(relative_age(i64::MAX, now), "0 seconds ago");
        let ancient = relative_age(i64::MIN, now);
        assert!(ancient.ends_with(" years ago"), "{ancient}");
    }

    #[test]
    fn test_truncate_version() {
        assert_eq!(truncate_version("abcdef1234"), "abcdef1");
        assert_eq!(truncate_version("abc"), "abc");
        assert_eq!(truncate_version(""), "");
        assert_eq!(truncate_version("ääääääääää"), "äääääää");
    }

    #[test]
    fn test_format_timestamp_utc() {
        assert_eq!(format_timestamp(1_700_000_000, &Utc), "2023-11-14 22:13:20");
        assert_eq!(format_timestamp(0, &Utc), "1970-1-1 0:00:00");
    }
}
