//! Time base: one authoritative wall clock reconciled from three sources.
//!
//! ```text
//!                 RTC read ok                  network update
//!  UNSYNCHRONIZED ───────────▶ HARDWARE_SYNCED ───────────────▶ NETWORK_SYNCED
//!        │                                                          ▲
//!        └──────────────────── network update ──────────────────────┘
//! ```
//!
//! The time base holds an *anchor*: a UTC value paired with the monotonic
//! tick at which it was taken.  [`TimeBase::now`] extrapolates from the
//! anchor with the monotonic clock, so reading the time never touches the
//! I²C bus.  Without an anchor, `now()` returns uptime marked
//! non-authoritative.
//!
//! `NETWORK_SYNCED` is sticky: later RTC reads never displace a network
//! anchor.  There is no terminal state.
//!
//! The state flag and the per-source availability flags are atomics; the
//! anchor sits behind a critical-section mutex that is held only for a
//! copy, so `now()` is safe from the sampling task while the maintenance
//! task re-anchors.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::clock::monotonic::{Monotonic, MonotonicClock};
use crate::clock::network::check_plausible;
use crate::clock::{ClockRank, ClockSource, Timestamp};
use crate::error::ClockError;

/// Earliest RTC value accepted as real time.  A DS3231 that lost its
/// backup cell restarts at 2000-01-01.
const MIN_PLAUSIBLE_YEAR: i32 = 2020;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SyncState {
    Unsynchronized = 0,
    HardwareSynced = 1,
    NetworkSynced = 2,
}

impl SyncState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::HardwareSynced,
            2 => Self::NetworkSynced,
            _ => Self::Unsynchronized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsynchronized => "UNSYNCHRONIZED",
            Self::HardwareSynced => "HARDWARE_SYNCED",
            Self::NetworkSynced => "NETWORK_SYNCED",
        }
    }
}

impl core::fmt::Display for SyncState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-source availability, as of the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStatus {
    pub state: SyncState,
    /// The RTC answered the most recent read or write.
    pub rtc_available: bool,
    /// A network update has been accepted since boot.
    pub network_seen: bool,
}

/// Anything that can stamp a reading.
pub trait WallClock {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    utc: NaiveDateTime,
    at_us: u64,
    source: ClockRank,
}

/// Outcome of an accepted network update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkAdoption {
    pub previous: SyncState,
    /// Result of the one-shot RTC write-back.  Never blocks adoption.
    pub rtc_write: Result<(), ClockError>,
}

/// What one maintenance step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maintenance {
    NetworkAdopted(NetworkAdoption),
    NetworkRejected(ClockError),
    /// RTC read succeeded and the anchor was refreshed from it.
    RtcAnchored { previous: SyncState },
    /// RTC read failed; the prior anchor (if any) is retained.
    RtcUnavailable(ClockError),
    /// Network-synced and nothing pending.
    Idle,
}

pub struct TimeBase<M> {
    state: AtomicU8,
    anchor: Mutex<CriticalSectionRawMutex, Cell<Option<Anchor>>>,
    mono: MonotonicClock<M>,
    slew_bound_secs: u32,
    rtc_available: AtomicBool,
    network_seen: AtomicBool,
}

impl<M: Monotonic> TimeBase<M> {
    pub fn new(mono: M, slew_bound_secs: u32) -> Self {
        Self {
            state: AtomicU8::new(SyncState::Unsynchronized as u8),
            anchor: Mutex::new(Cell::new(None)),
            mono: MonotonicClock::new(mono),
            slew_bound_secs,
            rtc_available: AtomicBool::new(false),
            network_seen: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SyncState {
        SyncState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn source_status(&self) -> SourceStatus {
        SourceStatus {
            state: self.state(),
            rtc_available: self.rtc_available.load(Ordering::Relaxed),
            network_seen: self.network_seen.load(Ordering::Relaxed),
        }
    }

    /// Identity of the source currently trusted, if any.
    pub fn trusted_source(&self) -> ClockRank {
        self.anchor
            .lock(|a| a.get().map_or(ClockRank::Monotonic, |a| a.source))
    }

    /// Best current time.  Never blocks on I/O.
    pub fn now(&self) -> Timestamp {
        let now_us = self.mono.now_us();
        match self.anchor.lock(Cell::get) {
            Some(a) => {
                let elapsed = i64::try_from(now_us.saturating_sub(a.at_us)).unwrap_or(i64::MAX);
                let utc = a
                    .utc
                    .checked_add_signed(TimeDelta::microseconds(elapsed))
                    .unwrap_or(a.utc);
                Timestamp::Civil {
                    utc,
                    source: a.source,
                }
            }
            None => Timestamp::Relative { uptime_us: now_us },
        }
    }

    /// Boot-time RTC read.  On failure the time base stays
    /// `UNSYNCHRONIZED` and serves relative time.
    pub fn boot<C: ClockSource>(&self, rtc: &mut C) -> Result<SyncState, ClockError> {
        self.anchor_from_rtc(rtc)?;
        Ok(self.state())
    }

    /// A network time provider reported `utc`.
    ///
    /// Accepted from any state unless it is further behind the current
    /// authoritative time than the slew bound.  On acceptance the RTC is
    /// written once, best effort.
    pub fn on_network_time<C: ClockSource>(
        &self,
        utc: NaiveDateTime,
        rtc: &mut C,
    ) -> Result<NetworkAdoption, ClockError> {
        let current = self.now().utc();
        let utc = check_plausible(utc, current, self.slew_bound_secs)?;

        let previous = self.state();
        self.set_anchor(utc, ClockRank::Network, SyncState::NetworkSynced);
        self.network_seen.store(true, Ordering::Relaxed);

        let rtc_write = rtc.write(&utc);
        self.rtc_available
            .store(!matches!(rtc_write, Err(ClockError::Bus(_))), Ordering::Relaxed);
        Ok(NetworkAdoption { previous, rtc_write })
    }

    /// Periodic upkeep, run from the maintenance task.
    pub fn maintain<C: ClockSource>(
        &self,
        pending_network: Option<NaiveDateTime>,
        rtc: &mut C,
    ) -> Maintenance {
        if let Some(utc) = pending_network {
            return match self.on_network_time(utc, rtc) {
                Ok(adoption) => Maintenance::NetworkAdopted(adoption),
                Err(e) => Maintenance::NetworkRejected(e),
            };
        }

        let previous = self.state();
        if previous == SyncState::NetworkSynced {
            return Maintenance::Idle;
        }
        match self.anchor_from_rtc(rtc) {
            Ok(()) => Maintenance::RtcAnchored { previous },
            Err(e) => Maintenance::RtcUnavailable(e),
        }
    }

    fn anchor_from_rtc<C: ClockSource>(&self, rtc: &mut C) -> Result<(), ClockError> {
        let read = rtc.read().and_then(|ts| match ts {
            Timestamp::Civil { utc, .. } if utc >= min_plausible_time() => Ok(utc),
            Timestamp::Civil { .. } => Err(ClockError::OutOfRange),
            Timestamp::Relative { .. } => Err(ClockError::Unavailable),
        });
        self.rtc_available
            .store(!matches!(read, Err(ClockError::Bus(_) | ClockError::Unavailable)), Ordering::Relaxed);
        let utc = read?;

        // A network update may have landed between the read and here.
        match self.state() {
            SyncState::NetworkSynced => {}
            SyncState::HardwareSynced if self.agrees_with_rtc(utc) => {}
            _ => self.set_anchor(utc, ClockRank::Hardware, SyncState::HardwareSynced),
        }
        Ok(())
    }

    /// The registers hold whole seconds, so an extrapolation inside the
    /// second the RTC reports is kept rather than truncated.
    fn agrees_with_rtc(&self, rtc_utc: NaiveDateTime) -> bool {
        self.now().utc().is_some_and(|current| {
            current >= rtc_utc && current - rtc_utc < TimeDelta::seconds(1)
        })
    }

    fn set_anchor(&self, utc: NaiveDateTime, source: ClockRank, state: SyncState) {
        let at_us = self.mono.now_us();
        self.anchor.lock(|a| {
            a.set(Some(Anchor { utc, at_us, source }));
            self.state.store(state as u8, Ordering::Release);
        });
    }
}

impl<M: Monotonic> WallClock for TimeBase<M> {
    fn now(&self) -> Timestamp {
        TimeBase::now(self)
    }
}

/// Lower bound used by the RTC plausibility check.
pub fn min_plausible_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(MIN_PLAUSIBLE_YEAR, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}
