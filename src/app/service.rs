//! Meter service: the hexagonal core.
//!
//! [`MeterService`] owns the rate estimator, the latest reading and the
//! time base.  It is shared by reference between the sampling task, the
//! maintenance task and whatever outer layer serves [`TelemetryPort`].
//!
//! ```text
//!   PulseCounter ──▶ ┌───────────────────────────┐ ──▶ EventSink
//!                    │        MeterService       │
//!   Ds3231 / SNTP ──▶│  RateEstimator · TimeBase │ ◀── TelemetryPort
//!                    └───────────────────────────┘
//! ```
//!
//! The estimator and the cached reading sit behind one critical-section
//! mutex, so a volume reset can never interleave with a sample.

use core::cell::RefCell;

use chrono::{FixedOffset, NaiveDateTime};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, info, warn};

use crate::clock::ClockSource;
use crate::clock::monotonic::Monotonic;
use crate::config::MeterConfig;
use crate::error::ClockError;
use crate::sensors::flow::RateEstimator;
use crate::sensors::pulse::PulseCounter;
use crate::telemetry::Reading;
use crate::timebase::{Maintenance, SourceStatus, SyncState, TimeBase};

use super::events::AppEvent;
use super::ports::{EventSink, TelemetryPort};

struct Metering<'a, M> {
    estimator: RateEstimator<'a, M>,
    latest: Option<Reading>,
}

pub struct MeterService<'a, M> {
    metering: Mutex<CriticalSectionRawMutex, RefCell<Metering<'a, M>>>,
    time: TimeBase<M>,
    civil_offset: FixedOffset,
}

impl<'a, M: Monotonic + Clone> MeterService<'a, M> {
    /// `config` must already be validated.
    pub fn new(config: &MeterConfig, counter: &'a PulseCounter, tick: M) -> Self {
        let estimator = RateEstimator::new(counter, tick.clone(), config.pulses_per_liter);
        Self {
            metering: Mutex::new(RefCell::new(Metering {
                estimator,
                latest: None,
            })),
            time: TimeBase::new(tick, config.slew_bound_secs),
            civil_offset: config.civil_offset(),
        }
    }

    pub fn time_base(&self) -> &TimeBase<M> {
        &self.time
    }

    pub fn civil_offset(&self) -> FixedOffset {
        self.civil_offset
    }

    pub fn source_status(&self) -> SourceStatus {
        self.time.source_status()
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Read the RTC once and announce the starting sync state.
    pub fn boot<C: ClockSource>(&self, rtc: &mut C, sink: &mut impl EventSink) -> SyncState {
        match self.time.boot(rtc) {
            Ok(state) => {
                sink.emit(&AppEvent::TimeSyncChanged {
                    from: SyncState::Unsynchronized,
                    to: state,
                });
            }
            Err(e) => {
                warn!("RTC unavailable at boot ({}), serving relative time", e);
                sink.emit(&AppEvent::RtcUnavailable(e));
            }
        }
        let state = self.time.state();
        sink.emit(&AppEvent::Started(state));
        info!("MeterService started in {}", state);
        state
    }

    // ── Periodic work ─────────────────────────────────────────

    /// One sampling period.  Called from the sampling task only.
    pub fn sample_tick(&self, sink: &mut impl EventSink) -> Reading {
        let reading = self.metering.lock(|m| {
            let mut m = m.borrow_mut();
            let reading = m.estimator.sample(&self.time);
            m.latest = Some(reading);
            reading
        });
        sink.emit(&AppEvent::Telemetry(reading));
        reading
    }

    /// One time-base maintenance step.  Called from the maintenance task.
    pub fn time_tick<C: ClockSource>(
        &self,
        pending_network: Option<NaiveDateTime>,
        rtc: &mut C,
        sink: &mut impl EventSink,
    ) -> Maintenance {
        let before = self.time.state();
        let outcome = self.time.maintain(pending_network, rtc);

        match outcome {
            Maintenance::NetworkAdopted(adoption) => {
                info!("Network time adopted");
                if let Err(e) = adoption.rtc_write {
                    warn!("RTC write-back failed: {}", e);
                    sink.emit(&AppEvent::RtcWriteFailed(e));
                }
            }
            Maintenance::NetworkRejected(ClockError::Implausible { behind_secs }) => {
                warn!("Network time {}s behind, discarded", behind_secs);
                sink.emit(&AppEvent::NetworkTimeRejected { behind_secs });
            }
            Maintenance::NetworkRejected(e) => {
                warn!("Network time discarded: {}", e);
            }
            Maintenance::RtcUnavailable(e) => {
                if e.is_retryable() {
                    debug!("RTC read failed ({}), retrying next cycle", e);
                } else {
                    warn!("RTC returned unusable time: {}", e);
                }
                sink.emit(&AppEvent::RtcUnavailable(e));
            }
            Maintenance::RtcAnchored { .. } | Maintenance::Idle => {}
        }

        let after = self.time.state();
        if after != before {
            sink.emit(&AppEvent::TimeSyncChanged {
                from: before,
                to: after,
            });
        }
        outcome
    }

    /// [`TelemetryPort::reset_volume`] plus a [`AppEvent::VolumeReset`].
    pub fn reset_volume_with(&self, sink: &mut impl EventSink) -> f32 {
        let cleared = TelemetryPort::reset_volume(self);
        sink.emit(&AppEvent::VolumeReset {
            cleared_liters: cleared,
        });
        cleared
    }
}

impl<M: Monotonic + Clone> TelemetryPort for MeterService<'_, M> {
    fn latest_reading(&self) -> Option<Reading> {
        self.metering.lock(|m| m.borrow().latest)
    }

    fn reset_volume(&self) -> f32 {
        self.metering.lock(|m| {
            let mut m = m.borrow_mut();
            let cleared = m.estimator.reset_volume();
            if let Some(r) = m.latest.as_mut() {
                r.total_volume = 0.0;
            }
            cleared
        })
    }
}
