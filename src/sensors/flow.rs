//! Flow-rate and volume estimator.
//!
//! Samples the [`PulseCounter`] once per period and converts the pulse
//! delta into litres per minute and cumulative litres:
//!
//! ```text
//!   flow_rate    = pulses × 60 / (pulses_per_liter × elapsed_s)   L/min
//!   total_volume = Σ pulses / pulses_per_liter                    L
//! ```
//!
//! The estimator only reads the counter.  The single exception is
//! [`RateEstimator::reset_volume`], which swaps the counter to zero and
//! re-baselines in one step while the caller holds the estimator lock.
//!
//! Volume is accumulated as a pulse total and divided on demand, so
//! repeated small additions never lose precision in `f32`.

use crate::clock::monotonic::Monotonic;
use crate::sensors::pulse::PulseCounter;
use crate::telemetry::Reading;
use crate::timebase::WallClock;

pub struct RateEstimator<'a, M> {
    counter: &'a PulseCounter,
    tick: M,
    pulses_per_liter: f32,
    last_count: u32,
    last_sample_us: u64,
    /// L/min as of the last sample with positive elapsed time.
    flow_rate: f32,
    /// Pulses accumulated since boot or the last reset.
    volume_pulses: u64,
}

impl<'a, M: Monotonic> RateEstimator<'a, M> {
    /// `pulses_per_liter` must be positive and finite; see
    /// [`MeterConfig::validate`](crate::config::MeterConfig::validate).
    pub fn new(counter: &'a PulseCounter, tick: M, pulses_per_liter: f32) -> Self {
        let last_sample_us = tick.now_us();
        Self {
            counter,
            tick,
            pulses_per_liter,
            last_count: 0,
            last_sample_us,
            flow_rate: 0.0,
            volume_pulses: 0,
        }
    }

    pub fn flow_rate(&self) -> f32 {
        self.flow_rate
    }

    pub fn total_volume(&self) -> f32 {
        (self.volume_pulses as f64 / f64::from(self.pulses_per_liter)) as f32
    }

    /// Take one sample and stamp it with `clock`.
    ///
    /// With no elapsed time since the previous sample the rate is left
    /// alone and the pulse baseline is kept, so the pending pulses are
    /// credited on the next sample instead of being lost or doubled.
    pub fn sample<W: WallClock + ?Sized>(&mut self, clock: &W) -> Reading {
        let now_us = self.tick.now_us();
        let count = self.counter.read();

        if now_us > self.last_sample_us {
            let pulses = count.wrapping_sub(self.last_count);
            let elapsed_s = (now_us - self.last_sample_us) as f64 / 1_000_000.0;
            self.flow_rate = (f64::from(pulses) * 60.0
                / (f64::from(self.pulses_per_liter) * elapsed_s)) as f32;
            self.volume_pulses = self.volume_pulses.saturating_add(u64::from(pulses));
            self.last_count = count;
        } else {
            log::debug!("flow: zero-length sample interval, rate held");
        }
        self.last_sample_us = now_us;

        Reading {
            flow_rate: self.flow_rate,
            total_volume: self.total_volume(),
            timestamp: clock.now(),
        }
    }

    /// Zero the cumulative volume.  Returns the litres cleared.
    ///
    /// The counter swap and the baseline reset happen together: an edge
    /// racing the swap is either in the discarded count or the first
    /// pulse of the new total.
    pub fn reset_volume(&mut self) -> f32 {
        let cleared = self.total_volume();
        let unsampled = self.counter.reset().wrapping_sub(self.last_count);
        self.last_count = 0;
        self.volume_pulses = 0;
        log::debug!("flow: reset dropped {} unsampled pulses", unsampled);
        cleared
    }
}
