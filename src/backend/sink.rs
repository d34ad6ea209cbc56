use crate::monitor::MonitorEvent;
use async_trait::async_trait;

/// Best-effort remote write path. Implementations log their own failures;
/// the caller never retries.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send_event(&self, event: &MonitorEvent);

    /// Append one line to the remote log stream.
    async fn write_log(&self, message: &str);
}

/// Remote record of which bed a sensor is attached to.
#[async_trait]
pub trait BedRegistry: Send + Sync {
    /// Returns whether the backend accepted the assignment.
    async fn assign_bed(&self, sensor_id: &str, bed_id: &str) -> bool;
}
