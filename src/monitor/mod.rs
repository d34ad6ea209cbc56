//! Monitoring domain logic.
//!
//! Pure state machines that turn successive sensor snapshots into domain
//! events. Nothing in here performs I/O; the orchestrator feeds snapshots in
//! and carries the resulting decisions out to the event sink and the sensor.

pub mod event;
pub mod presence;
pub mod rotation;
pub mod snapshot;

pub use event::MonitorEvent;
pub use presence::{PresenceState, PresenceTracker};
pub use rotation::{RotationAction, RotationMonitor, RotationState};
pub use snapshot::MonitorSnapshot;
