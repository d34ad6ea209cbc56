//! Bed-occupancy monitor.
//!
//! Polls a pressure-mapping bed sensor over HTTP, turns its status into
//! bed-exit, bed-entry and turn-timer events for the cloud backend, and
//! power-cycles the sensor through a relay when it stops answering.

pub mod backend;
pub mod config;
pub mod control;
pub mod error;
pub mod hardware;
pub mod instance_lock;
pub mod monitor;
pub mod network;
pub mod orchestrator;
pub mod recovery;
pub mod sensor;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{MonitorError, Result};
