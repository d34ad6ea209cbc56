use crate::error::Result;
use crate::monitor::MonitorSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Number of frames fetched before a given frame id by
/// [`SensorGateway::frames_within_window`].
pub const FRAME_WINDOW: u64 = 300;

/// One stored pressure frame as returned by the frames resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub readings: serde_json::Value,
}

/// Typed access to the sensor's HTTP surface.
///
/// Every call is bounded by a timeout. Configuration writes report plain
/// success; `false` means "unknown, assume not applied" and callers must not
/// treat it as fatal.
#[async_trait]
pub trait SensorGateway: Send + Sync {
    /// Read the monitor document.
    async fn poll(&self) -> Result<MonitorSnapshot>;

    /// Set both the sampling and the storage frequency.
    async fn set_frequency(&self, hz: u32) -> bool;

    /// Set the turn-timer interval.
    async fn set_rotation_interval(&self, seconds: u32) -> bool;

    /// Acknowledge the turn timer, restarting its countdown.
    async fn reset_rotation_interval(&self) -> bool;

    /// Disable the spot, smooth and noise filters.
    async fn set_default_filters(&self) -> bool;

    /// Drop every stored frame.
    async fn delete_all_frames(&self) -> bool;

    /// Cheap liveness check. Implemented as the idempotent frame delete, so
    /// it is true only when the sensor answers "no content".
    async fn probe_connectivity(&self) -> bool;

    /// Frames in the window ending at `frame_id`.
    async fn frames_within_window(&self, frame_id: u64) -> Result<Vec<Frame>>;
}

/// `(after, before)` bounds for the frame window ending at `frame_id`.
pub fn frame_window(frame_id: u64) -> (u64, u64) {
    (frame_id.saturating_sub(FRAME_WINDOW), frame_id)
}
