//! Wire payloads for the backend. Domain types are only serialised here.

use crate::monitor::MonitorEvent;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload<'a> {
    pub event_type: &'static str,
    pub sensor_id: &'a str,
}

impl<'a> From<&'a MonitorEvent> for EventPayload<'a> {
    fn from(event: &'a MonitorEvent) -> Self {
        Self {
            event_type: event.event_type(),
            sensor_id: event.sensor_id(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BedAssignment<'a> {
    pub sensor_id: &'a str,
    pub bed_id: &'a str,
}

/// CloudWatch Logs `PutLogEvents` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBatch<'a> {
    pub log_group_name: &'a str,
    pub log_stream_name: &'a str,
    pub log_events: Vec<LogLine<'a>>,
}

#[derive(Debug, Serialize)]
pub struct LogLine<'a> {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: &'a str,
}

impl<'a> LogBatch<'a> {
    pub fn single(group: &'a str, stream: &'a str, timestamp_ms: i64, message: &'a str) -> Self {
        Self {
            log_group_name: group,
            log_stream_name: stream,
            log_events: vec![LogLine {
                timestamp: timestamp_ms,
                message,
            }],
        }
    }
}
