//! Outbound application events.
//!
//! The [`MeterService`](super::service::MeterService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.

use crate::error::ClockError;
use crate::telemetry::Reading;
use crate::timebase::SyncState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// A new reading was produced by the sampling task.
    Telemetry(Reading),

    /// The time base moved between sync states.
    TimeSyncChanged { from: SyncState, to: SyncState },

    /// A network update was further behind than the slew bound.
    NetworkTimeRejected { behind_secs: i64 },

    /// The one-shot RTC write after a network update failed.
    RtcWriteFailed(ClockError),

    /// The RTC could not be read this cycle.
    RtcUnavailable(ClockError),

    /// Cumulative volume was zeroed by an external request.
    VolumeReset { cleared_liters: f32 },

    /// The service has started (carries the initial sync state).
    Started(SyncState),
}
