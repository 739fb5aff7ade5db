//! ESP32 monotonic tick.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microseconds since boot).
//! - **`not(target_os = "espidf")`**: `std::time::Instant`, for host-side
//!   tests and simulation.

use crate::clock::monotonic::Monotonic;

/// Microsecond uptime for the platform.  Cheap to clone; clones share
/// the same origin.
#[derive(Debug, Clone, Copy)]
pub struct SystemMonotonic {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemMonotonic {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMonotonic {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl Monotonic for SystemMonotonic {
    #[cfg(target_os = "espidf")]
    fn now_us(&self) -> u64 {
        // SAFETY: read-only query of the esp_timer counter; no preconditions.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }).max(0) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}
