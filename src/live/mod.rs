//! Live channel: connection, reconnection, routing and the engine that ties
//! them to the sensor registry.

pub mod engine;
pub mod router;
pub mod supervisor;
pub mod transport;

pub use engine::{EngineHandle, RegistryView, SyncEngine};
pub use router::{
    ChannelRouter, Envelope, RouteOutcome, SENSOR_LIST_CHANNEL, SENSOR_STATUS_CHANNEL,
};
pub use supervisor::{ConnectionState, ReconnectSupervisor};
pub use transport::{
    CloseReason, Connection, EventSink, Generation, TaggedEvent, Transport, TransportEvent,
    WebSocketTransport,
};
