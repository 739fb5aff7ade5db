//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per
//! application event to the ESP-IDF logger (UART / USB-CDC in
//! production).  A web or MQTT publisher would implement the same trait.

use chrono::FixedOffset;
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink {
    civil_offset: FixedOffset,
}

impl LogEventSink {
    /// Timestamps are rendered in `civil_offset`.
    pub fn new(civil_offset: FixedOffset) -> Self {
        Self { civil_offset }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(r) => {
                info!(
                    "TELEM | time={}{} | flow={:.3}L/min | volume={:.3}L",
                    r.time_of_day(self.civil_offset),
                    if r.timestamp.is_authoritative() { "" } else { " (uptime)" },
                    r.flow_rate,
                    r.total_volume,
                );
            }
            AppEvent::TimeSyncChanged { from, to } => {
                info!("TIME | {} -> {}", from, to);
            }
            AppEvent::NetworkTimeRejected { behind_secs } => {
                warn!("TIME | network update rejected, {}s behind", behind_secs);
            }
            AppEvent::RtcWriteFailed(e) => {
                warn!("TIME | RTC write-back failed: {}", e);
            }
            AppEvent::RtcUnavailable(e) => {
                warn!("TIME | RTC unavailable: {}", e);
            }
            AppEvent::VolumeReset { cleared_liters } => {
                info!("RESET | volume cleared ({:.3}L)", cleared_liters);
            }
            AppEvent::Started(state) => {
                info!("START | time_base={}", state);
            }
        }
    }
}
