//! System configuration parameters
//!
//! All tunable parameters for the flow meter.  Values can be overridden
//! via NVS; see [`crate::adapters::nvs::NvsConfigStore`].

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterConfig {
    // --- Flow sensor ---
    /// GPIO carrying the sensor's pulse output (rising edge).
    pub pulse_gpio: i32,
    /// Sensor calibration: pulses emitted per litre.
    pub pulses_per_liter: f32,

    // --- Sampling task ---
    /// Rate-estimator sampling period (milliseconds).
    pub sample_period_ms: u32,
    /// FreeRTOS priority of the sampling task.
    pub sampler_priority: u8,
    /// Sampling task stack (KiB).
    pub sampler_stack_kb: u16,

    // --- Hardware RTC ---
    pub rtc_sda_gpio: i32,
    pub rtc_scl_gpio: i32,
    pub rtc_i2c_freq_hz: u32,
    /// Upper bound on one RTC bus transaction (milliseconds).
    pub rtc_timeout_ms: u32,
    /// Offset of the civil time the RTC registers hold, east of UTC (seconds).
    pub rtc_offset_secs: i32,

    // --- Time base ---
    /// Offset used to present timestamps, east of UTC (seconds).
    pub civil_offset_secs: i32,
    /// Largest accepted backward jump for a network time update (seconds).
    pub slew_bound_secs: u32,
    /// Time-base maintenance interval (seconds).
    pub maintenance_interval_secs: u32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            // Flow sensor
            pulse_gpio: pins::FLOW_PULSE_GPIO,
            pulses_per_liter: 300.0,

            // Sampling
            sample_period_ms: 1000, // 1 Hz
            sampler_priority: 5,
            sampler_stack_kb: 4,

            // RTC (DS3231 keeps UTC)
            rtc_sda_gpio: pins::I2C_SDA_GPIO,
            rtc_scl_gpio: pins::I2C_SCL_GPIO,
            rtc_i2c_freq_hz: 100_000,
            rtc_timeout_ms: 100,
            rtc_offset_secs: 0,

            // Time base
            civil_offset_secs: -6 * 3600, // CST
            slew_bound_secs: 120,
            maintenance_interval_secs: 60,
        }
    }
}

impl MeterConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=48).contains(&self.pulse_gpio) {
            return Err(ConfigError::ValidationFailed("pulse_gpio must be 0–48"));
        }
        if !(self.pulses_per_liter.is_finite() && (1.0..=100_000.0).contains(&self.pulses_per_liter)) {
            return Err(ConfigError::ValidationFailed(
                "pulses_per_liter must be 1–100000",
            ));
        }
        if !(100..=60_000).contains(&self.sample_period_ms) {
            return Err(ConfigError::ValidationFailed(
                "sample_period_ms must be 100–60000",
            ));
        }
        if !(1..=22).contains(&self.sampler_priority) {
            return Err(ConfigError::ValidationFailed("sampler_priority must be 1–22"));
        }
        if !(2..=32).contains(&self.sampler_stack_kb) {
            return Err(ConfigError::ValidationFailed("sampler_stack_kb must be 2–32"));
        }
        if self.rtc_sda_gpio == self.rtc_scl_gpio {
            return Err(ConfigError::ValidationFailed("RTC SDA and SCL must differ"));
        }
        if !(10_000..=400_000).contains(&self.rtc_i2c_freq_hz) {
            return Err(ConfigError::ValidationFailed(
                "rtc_i2c_freq_hz must be 10k–400k",
            ));
        }
        if !(1..=1000).contains(&self.rtc_timeout_ms) {
            return Err(ConfigError::ValidationFailed("rtc_timeout_ms must be 1–1000"));
        }
        if FixedOffset::east_opt(self.rtc_offset_secs).is_none() {
            return Err(ConfigError::ValidationFailed("rtc_offset_secs out of range"));
        }
        if FixedOffset::east_opt(self.civil_offset_secs).is_none() {
            return Err(ConfigError::ValidationFailed("civil_offset_secs out of range"));
        }
        if self.slew_bound_secs > 86_400 {
            return Err(ConfigError::ValidationFailed("slew_bound_secs must be ≤ 1 day"));
        }
        if !(1..=3600).contains(&self.maintenance_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "maintenance_interval_secs must be 1–3600",
            ));
        }
        Ok(())
    }

    /// Offset the RTC registers are stored in.  Falls back to UTC for an
    /// unvalidated out-of-range value.
    pub fn rtc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.rtc_offset_secs).unwrap_or(utc_offset())
    }

    /// Offset used when presenting timestamps.
    pub fn civil_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.civil_offset_secs).unwrap_or(utc_offset())
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}
