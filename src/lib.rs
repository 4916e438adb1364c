//! Sensor dashboard client library.
//!
//! Keeps a live, in-memory registry of remote contact sensors in sync with
//! the dashboard server: a reconnecting WebSocket feeds channel-routed
//! snapshots and deltas into the registry, and operator commands go out over
//! the REST API.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod live;
pub mod sensors;
