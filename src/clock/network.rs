//! Network time mailbox.
//!
//! The SNTP completion callback runs on the lwIP task and cannot reach the
//! time base directly, so it posts the synchronised UTC value into
//! [`NETWORK_TIME`].  The maintenance task waits on the same signal and
//! hands the value to [`TimeBase::on_network_time`].
//!
//! ```text
//!   SNTP callback ──deliver()──▶ NETWORK_TIME ──wait()/take()──▶ maintenance task
//! ```
//!
//! Only the most recent delivery is kept; an older unread value is simply
//! replaced.
//!
//! [`TimeBase::on_network_time`]: crate::timebase::TimeBase::on_network_time

use chrono::NaiveDateTime;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use super::{Capability, ClockRank, ClockSource, Timestamp};
use crate::error::ClockError;

/// Process-wide mailbox fed by the SNTP callback.
pub static NETWORK_TIME: NetworkClock = NetworkClock::new();

/// Read-only, asynchronously arriving UTC source.
pub struct NetworkClock {
    pending: Signal<CriticalSectionRawMutex, NaiveDateTime>,
}

impl Default for NetworkClock {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkClock {
    pub const fn new() -> Self {
        Self {
            pending: Signal::new(),
        }
    }

    /// Post a freshly synchronised UTC value.  Safe from any task.
    pub fn deliver(&self, utc: NaiveDateTime) {
        self.pending.signal(utc);
    }

    /// Consume the pending value, if any.
    pub fn take(&self) -> Option<NaiveDateTime> {
        self.pending.try_take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.signaled()
    }

    /// Wait for the next delivery and consume it.
    pub async fn wait(&self) -> NaiveDateTime {
        self.pending.wait().await
    }
}

impl ClockSource for &NetworkClock {
    fn capability(&self) -> Capability {
        Capability {
            available: self.is_pending(),
            rank: ClockRank::Network,
            can_write: false,
        }
    }

    /// Each synchronisation event is reported exactly once.
    fn read(&mut self) -> Result<Timestamp, ClockError> {
        self.take()
            .map(|utc| Timestamp::Civil {
                utc,
                source: ClockRank::Network,
            })
            .ok_or(ClockError::Unavailable)
    }
}

/// Check a network update against the current authoritative time.
///
/// Forward jumps of any size are accepted.  A backward jump larger than
/// `slew_bound_secs` is rejected with [`ClockError::Implausible`].  With no
/// authoritative time to compare against, any value is accepted.
pub fn check_plausible(
    candidate: NaiveDateTime,
    current: Option<NaiveDateTime>,
    slew_bound_secs: u32,
) -> Result<NaiveDateTime, ClockError> {
    let Some(current) = current else {
        return Ok(candidate);
    };
    let behind_secs = (current - candidate).num_seconds();
    if behind_secs > i64::from(slew_bound_secs) {
        return Err(ClockError::Implausible { behind_secs });
    }
    Ok(candidate)
}
