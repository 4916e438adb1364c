//! Sensor state: records, the registry that owns them, and the derived
//! display attributes the UI renders.

pub mod derive;
pub mod record;
pub mod registry;

pub use record::{SensorRecord, SensorSnapshot, SensorStatus, StatusReport};
pub use registry::{DeltaOutcome, SensorRegistry, SensorView};
