//! Long-running task bodies.
//!
//! ```text
//!  ┌─────────────────────────────┐      ┌──────────────────────────────────┐
//!  │ flow-sample (APP core, p=5) │      │ time-maint (PRO core, p=3)       │
//!  │                             │      │  futures_lite::block_on          │
//!  │  loop {                     │      │  loop {                          │
//!  │    sample_tick()            │      │    or(NETWORK_TIME.wait(),       │
//!  │    sleep until deadline     │      │       Timer::after(interval))    │
//!  │  }                          │      │    time_tick()                   │
//!  └─────────────────────────────┘      │  }                               │
//!                                       └──────────────────────────────────┘
//! ```
//!
//! The sampling loop never touches the I²C bus; all RTC traffic is on
//! the maintenance task.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::time::Instant;

use chrono::NaiveDateTime;
use embedded_hal::i2c::I2c;
use futures_lite::future;
use log::{info, warn};

use crate::app::ports::{EventSink, TelemetryPort};
use crate::app::service::MeterService;
use crate::clock::monotonic::Monotonic;
use crate::clock::network::NetworkClock;
use crate::clock::rtc::Ds3231;

// ── Sampling ──────────────────────────────────────────────────

/// Absolute-deadline ticker: each wake is scheduled from the previous
/// deadline, not from when the work finished, so jitter does not
/// accumulate.  An overrun re-bases on the current instant.
pub struct Deadline {
    next: Instant,
    period: Duration,
}

impl Deadline {
    pub fn new(period: Duration) -> Self {
        Self {
            next: Instant::now() + period,
            period,
        }
    }

    /// Time to sleep before the next tick, advancing the deadline.
    pub fn wait_time(&mut self) -> Duration {
        let now = Instant::now();
        let wait = self.next.saturating_duration_since(now);
        if wait.is_zero() {
            warn!("sampler: overran period by {:?}", now - self.next);
            self.next = now + self.period;
        } else {
            self.next += self.period;
        }
        wait
    }
}

/// Sampling task body.  Returns when `stop` is set.
pub fn run_sampler<M: Monotonic + Clone>(
    service: &MeterService<'_, M>,
    period: Duration,
    sink: &mut impl EventSink,
    stop: &AtomicBool,
) {
    let mut deadline = Deadline::new(period);
    info!("sampler: period {:?}", period);
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(deadline.wait_time());
        service.sample_tick(sink);
    }
}

// ── Time-base maintenance ────────────────────────────────────

/// Wait for a network delivery or the interval, whichever is first.
/// `None` means the interval elapsed with nothing delivered.
pub async fn next_network_time(network: &NetworkClock, interval: Duration) -> Option<NaiveDateTime> {
    future::or(async { Some(network.wait().await) }, async {
        async_io_mini::Timer::after(interval).await;
        None
    })
    .await
}

/// Maintenance task body.  Returns when `stop` is set.
pub async fn run_maintenance<M, I2C>(
    service: &MeterService<'_, M>,
    network: &NetworkClock,
    rtc: &mut Ds3231<I2C>,
    interval: Duration,
    sink: &mut impl EventSink,
    stop: &AtomicBool,
) where
    M: Monotonic + Clone,
    I2C: I2c,
{
    info!("maintenance: interval {:?}", interval);
    while !stop.load(Ordering::Relaxed) {
        let pending = next_network_time(network, interval).await;
        let timer_tick = pending.is_none();
        service.time_tick(pending, rtc, sink);
        if timer_tick {
            log_status(service, rtc);
        }
    }
}

/// The periodic console line: time, flow, volume, RTC temperature.
pub fn log_status<M, I2C>(service: &MeterService<'_, M>, rtc: &mut Ds3231<I2C>)
where
    M: Monotonic + Clone,
    I2C: I2c,
{
    let offset = service.civil_offset();
    let status = service.source_status();
    let now = service.time_base().now();
    let temp = match rtc.temperature_c() {
        Ok(t) => t,
        Err(e) => {
            warn!("RTC temperature read failed: {}", e);
            f32::NAN
        }
    };
    let (flow, volume) = service
        .latest_reading()
        .map_or((0.0, 0.0), |r| (r.flow_rate, r.total_volume));
    info!(
        "STATUS | {} [{}{}] | flow={:.2}L/min | volume={:.2}L | rtc_temp={:.2}°C",
        now.iso8601(offset),
        status.state,
        if status.rtc_available { "" } else { ", rtc down" },
        flow,
        volume,
        temp,
    );
}
