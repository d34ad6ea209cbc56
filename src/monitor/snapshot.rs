//! Monitor snapshot returned by one poll of `GET /api/monitor`.

use serde::Deserialize;

/// One poll result. Compared by value with the previous snapshot: an equal
/// snapshot means the sensor produced no new data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSnapshot {
    pub presence: bool,
    /// Turn-timer countdown in seconds; negative once expired.
    pub rotation_countdown_seconds: i64,
    pub storage_used_percent: f64,
}

#[derive(Deserialize)]
struct RawMonitor {
    attended: RawAttended,
    body: RawBody,
    storage: RawStorage,
}

#[derive(Deserialize)]
struct RawAttended {
    countdown: i64,
}

#[derive(Deserialize)]
struct RawBody {
    present: bool,
}

#[derive(Deserialize)]
struct RawStorage {
    used: f64,
}

impl MonitorSnapshot {
    pub fn new(presence: bool, rotation_countdown_seconds: i64, storage_used_percent: f64) -> Self {
        Self {
            presence,
            rotation_countdown_seconds,
            storage_used_percent,
        }
    }

    /// Parse the sensor's monitor document. Unknown fields are ignored.
    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        let raw: RawMonitor = serde_json::from_str(payload)?;
        Ok(Self {
            presence: raw.body.present,
            rotation_countdown_seconds: raw.attended.countdown,
            storage_used_percent: raw.storage.used,
        })
    }
}
