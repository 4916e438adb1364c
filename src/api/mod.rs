//! REST collaborator: sensor listing, report history and operator commands.

mod client;
pub mod types;

pub use client::{HttpSensorApi, SensorApi};
pub use types::{ReportPage, validate_open_timeout};
