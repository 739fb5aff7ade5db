//! Telemetry reading and its wire shape.
//!
//! A [`Reading`] is produced once per sampling period and is immutable.
//! External layers see it as JSON through [`TelemetryPayload`]:
//!
//! ```json
//! {"flow":1.25,"volume":42.5,"time":"14:03:27","synced":true}
//! ```
//!
//! `synced` is `false` when the time base had no calendar source and
//! `time` is device uptime instead of a time of day.

use chrono::FixedOffset;
use serde::Serialize;

use crate::clock::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// L/min.
    pub flow_rate: f32,
    /// L since boot or the last reset.
    pub total_volume: f32,
    pub timestamp: Timestamp,
}

impl Reading {
    pub fn time_of_day(&self, offset: FixedOffset) -> heapless::String<8> {
        self.timestamp.time_of_day(offset)
    }

    pub fn to_payload(&self, offset: FixedOffset) -> TelemetryPayload {
        TelemetryPayload {
            flow: self.flow_rate.max(0.0),
            volume: self.total_volume.max(0.0),
            time: self.time_of_day(offset),
            synced: self.timestamp.is_authoritative(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPayload {
    pub flow: f32,
    pub volume: f32,
    pub time: heapless::String<8>,
    pub synced: bool,
}

impl TelemetryPayload {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
