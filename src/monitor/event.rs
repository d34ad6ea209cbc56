/// Domain events forwarded to the backend. Each carries the identifier of
/// the sensor that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    BedExit { sensor_id: String },
    BedEntry { sensor_id: String },
    TurnTimerExpire { sensor_id: String },
}

impl MonitorEvent {
    pub fn sensor_id(&self) -> &str {
        match self {
            Self::BedExit { sensor_id }
            | Self::BedEntry { sensor_id }
            | Self::TurnTimerExpire { sensor_id } => sensor_id,
        }
    }

    /// Wire name used by the backend's `eventType` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BedExit { .. } => "bedExit",
            Self::BedEntry { .. } => "bedEntry",
            Self::TurnTimerExpire { .. } => "turnTimerExpire",
        }
    }
}
