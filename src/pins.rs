//! GPIO / peripheral pin assignments for the flow meter board.
//!
//! Single source of truth for the defaults in [`crate::config::MeterConfig`];
//! drivers take the configured pin rather than reading these directly.

// ---------------------------------------------------------------------------
// Flow sensor
// ---------------------------------------------------------------------------

/// Hall-effect flow sensor pulse output, interrupt on rising edge.
/// Open-collector output; the internal pull-up is enabled.
pub const FLOW_PULSE_GPIO: i32 = 3;

// ---------------------------------------------------------------------------
// I²C bus (DS3231 RTC at 0x68)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 6;
pub const I2C_SCL_GPIO: i32 = 7;
