//! Clock sources and the timestamp type they produce.
//!
//! Three sources feed the [`TimeBase`](crate::timebase::TimeBase):
//!
//! | Source            | Rank | Writable | Persists | Arrival            |
//! |-------------------|------|----------|----------|--------------------|
//! | `rtc::Ds3231`     | 2    | yes      | yes      | polled over I²C    |
//! | `network`         | 1    | no       | no       | SNTP callback      |
//! | `monotonic`       | 0    | no       | no       | always available   |
//!
//! Every civil value crossing this module's boundary is UTC.  Sources that
//! store local time (the RTC may be configured to) translate at their own
//! edge with [`to_utc`] / [`to_local`]; nothing downstream applies offsets
//! except presentation helpers on [`Timestamp`].

pub mod monotonic;
pub mod network;
pub mod rtc;

use core::fmt::Write as _;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Timelike, Utc};

use crate::error::ClockError;

/// Authority of a clock source.  Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ClockRank {
    Monotonic = 0,
    Network = 1,
    Hardware = 2,
}

/// What a source can do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub available: bool,
    pub rank: ClockRank,
    pub can_write: bool,
}

/// A point in time as reported by a clock source or the time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Calendar time in UTC, vouched for by `source`.
    Civil { utc: NaiveDateTime, source: ClockRank },
    /// Device uptime only.  Carries no calendar meaning and must be shown
    /// as non-authoritative.
    Relative { uptime_us: u64 },
}

impl Timestamp {
    /// `true` for calendar time from the RTC or the network.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Self::Civil { .. })
    }

    pub fn utc(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Civil { utc, .. } => Some(*utc),
            Self::Relative { .. } => None,
        }
    }

    /// `HH:MM:SS` in `offset`.  Relative stamps render uptime, wrapped at
    /// 24 h so the label always parses as a time of day.
    pub fn time_of_day(&self, offset: FixedOffset) -> heapless::String<8> {
        let (h, m, s) = match self {
            Self::Civil { utc, .. } => {
                let local = to_local(*utc, offset);
                (local.hour(), local.minute(), local.second())
            }
            Self::Relative { uptime_us } => {
                let secs = uptime_us / 1_000_000;
                (((secs / 3600) % 24) as u32, ((secs / 60) % 60) as u32, (secs % 60) as u32)
            }
        };
        let mut buf = heapless::String::new();
        let _ = write!(buf, "{h:02}:{m:02}:{s:02}");
        buf
    }

    /// ISO-8601 with explicit offset, e.g. `2025-03-14T09:26:53-06:00`.
    /// Relative stamps render as `uptime+<secs>s`.
    pub fn iso8601(&self, offset: FixedOffset) -> heapless::String<32> {
        let mut buf = heapless::String::new();
        match self {
            Self::Civil { utc, .. } => {
                let local = to_local(*utc, offset);
                let off = offset.local_minus_utc();
                let sign = if off < 0 { '-' } else { '+' };
                let off = off.unsigned_abs();
                let _ = write!(
                    buf,
                    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}{:02}:{:02}",
                    local.year(),
                    local.month(),
                    local.day(),
                    local.hour(),
                    local.minute(),
                    local.second(),
                    sign,
                    off / 3600,
                    (off / 60) % 60,
                );
            }
            Self::Relative { uptime_us } => {
                let _ = write!(buf, "uptime+{}s", uptime_us / 1_000_000);
            }
        }
        buf
    }
}

/// A source of time.  `write` is optional; read-only sources keep the
/// default, which reports [`ClockError::ReadOnly`].
pub trait ClockSource {
    fn capability(&self) -> Capability;

    /// Current time from this source, normalized to UTC.
    fn read(&mut self) -> Result<Timestamp, ClockError>;

    /// Set the source to `utc`.
    fn write(&mut self, _utc: &NaiveDateTime) -> Result<(), ClockError> {
        Err(ClockError::ReadOnly)
    }
}

impl<C: ClockSource + ?Sized> ClockSource for &mut C {
    fn capability(&self) -> Capability {
        (**self).capability()
    }

    fn read(&mut self) -> Result<Timestamp, ClockError> {
        (**self).read()
    }

    fn write(&mut self, utc: &NaiveDateTime) -> Result<(), ClockError> {
        (**self).write(utc)
    }
}

/// Wall-clock time held in `offset` → UTC.
pub fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> NaiveDateTime {
    local - chrono::TimeDelta::seconds(i64::from(offset.local_minus_utc()))
}

/// UTC → wall-clock time in `offset`.
pub fn to_local(utc: NaiveDateTime, offset: FixedOffset) -> NaiveDateTime {
    DateTime::<Utc>::from_naive_utc_and_offset(utc, Utc)
        .with_timezone(&offset)
        .naive_local()
}
