//! Interrupt-fed pulse counter for the hall-effect flow sensor.
//!
//! The sensor emits one pulse per fixed volume of liquid.  The GPIO ISR
//! calls [`PulseCounter::record_edge`] on each rising edge; the sampling
//! task reads the count and never writes it, except through the explicit
//! [`PulseCounter::reset`] used by a volume reset.
//!
//! The count is a single `AtomicU32`, so task-context reads can never
//! observe a torn value and the ISR increment is a single RMW with no
//! lock.  Consumers must difference counts with wrapping arithmetic.

use core::sync::atomic::{AtomicU32, Ordering};

/// Counter shared by the flow ISR and the sampling task.
/// `static` because ESP-IDF ISR callbacks cannot capture state.
pub static FLOW_PULSES: PulseCounter = PulseCounter::new();

/// Called from the GPIO ISR on each rising edge of the flow sensor.
pub fn flow_isr_handler() {
    FLOW_PULSES.record_edge();
}

/// Lock-free monotonic pulse counter.
#[derive(Debug)]
pub struct PulseCounter {
    count: AtomicU32,
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Interrupt context only.  Never blocks, never allocates.
    #[inline]
    pub fn record_edge(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Current count.  Wraps at `u32::MAX`.
    #[inline]
    pub fn read(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Zero the counter and return the count it held.
    ///
    /// A single atomic swap: an edge racing the reset lands either in the
    /// returned value or in the new count, never in neither.
    pub fn reset(&self) -> u32 {
        self.count.swap(0, Ordering::AcqRel)
    }

    /// Counter preloaded with `count`, for rollover tests.
    #[cfg(test)]
    pub(crate) const fn preloaded(count: u32) -> Self {
        Self {
            count: AtomicU32::new(count),
        }
    }
}
