//! Always-available uptime clock.
//!
//! Lowest-ranked source.  Never fails, never goes backward, carries no
//! calendar meaning.  The [`TimeBase`](crate::timebase::TimeBase) uses it
//! both as the last-resort source and as the tick that advances civil
//! time between anchors.

use core::sync::atomic::{AtomicU64, Ordering};

use super::{Capability, ClockRank, ClockSource, Timestamp};
use crate::error::ClockError;

/// Microseconds since boot.  Must be non-decreasing.
pub trait Monotonic {
    fn now_us(&self) -> u64;
}

impl<M: Monotonic + ?Sized> Monotonic for &M {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// [`ClockSource`] view over a [`Monotonic`] tick.
#[derive(Debug)]
pub struct MonotonicClock<M> {
    tick: M,
}

impl<M: Monotonic> MonotonicClock<M> {
    pub const fn new(tick: M) -> Self {
        Self { tick }
    }

    pub fn now_us(&self) -> u64 {
        self.tick.now_us()
    }
}

impl<M: Monotonic> ClockSource for MonotonicClock<M> {
    fn capability(&self) -> Capability {
        Capability {
            available: true,
            rank: ClockRank::Monotonic,
            can_write: false,
        }
    }

    fn read(&mut self) -> Result<Timestamp, ClockError> {
        Ok(Timestamp::Relative {
            uptime_us: self.tick.now_us(),
        })
    }
}

/// Hand-driven tick for tests and simulation.
#[derive(Debug, Default)]
pub struct ManualMonotonic(AtomicU64);

impl ManualMonotonic {
    pub const fn new(start_us: u64) -> Self {
        Self(AtomicU64::new(start_us))
    }

    /// Move forward by `us`.  Saturates rather than wrapping.
    pub fn advance_us(&self, us: u64) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| Some(t.saturating_add(us)));
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_us(secs.saturating_mul(1_000_000));
    }

    /// Jump to `us`.  Earlier values are ignored.
    pub fn set_us(&self, us: u64) {
        self.0.fetch_max(us, Ordering::AcqRel);
    }
}

impl Monotonic for ManualMonotonic {
    fn now_us(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}
