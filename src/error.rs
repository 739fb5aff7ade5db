//! Clock error types for the flowmeter firmware.
//!
//! Every variant is `Copy` so errors can be carried through events and
//! status snapshots without allocation.  The other subsystems keep their
//! own error enums next to the code (`ConfigError`, `HwInitError`); the
//! binary collects all of them through `anyhow`.
//!
//! Nothing in the metering core is fatal: callers log these and degrade
//! to "best available data, correctly labelled".

use core::fmt;

use embedded_hal::i2c::ErrorKind;

// ---------------------------------------------------------------------------
// Clock errors
// ---------------------------------------------------------------------------

/// Register field named in [`ClockError::InvalidRegister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcField {
    Seconds,
    Minutes,
    Hours,
    Weekday,
    Day,
    Month,
    Year,
}

impl fmt::Display for RtcField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Weekday => "weekday",
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        };
        f.write_str(name)
    }
}

/// Failure of the underlying bus transaction.  Always retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFault {
    /// Device or data byte was not acknowledged.
    Nack,
    /// Lost arbitration on a multi-master bus.
    ArbitrationLost,
    /// Bus error (misplaced start/stop).
    Bus,
    /// Receive overrun.
    Overrun,
    /// Driver-specific failure, including transaction timeouts.
    Other,
}

impl From<ErrorKind> for BusFault {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NoAcknowledge(_) => Self::Nack,
            ErrorKind::ArbitrationLoss => Self::ArbitrationLost,
            ErrorKind::Bus => Self::Bus,
            ErrorKind::Overrun => Self::Overrun,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for BusFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nack => write!(f, "NACK"),
            Self::ArbitrationLost => write!(f, "arbitration lost"),
            Self::Bus => write!(f, "bus error"),
            Self::Overrun => write!(f, "overrun"),
            Self::Other => write!(f, "transaction failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// The hardware transaction failed; retry on the next cycle.
    Bus(BusFault),
    /// A decoded register field is outside its valid range or is not
    /// packed decimal.
    InvalidRegister { field: RtcField },
    /// The time cannot be represented by the source (e.g. outside the
    /// RTC's two-digit century).
    OutOfRange,
    /// A network update would move time backward beyond the slew bound.
    Implausible { behind_secs: i64 },
    /// The source has nothing to report this cycle.
    Unavailable,
    /// The source cannot be written.
    ReadOnly,
}

impl ClockError {
    /// Transient failures that the next scheduled cycle should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Bus(_) | Self::Unavailable)
    }
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(fault) => write!(f, "bus: {fault}"),
            Self::InvalidRegister { field } => write!(f, "invalid {field} register"),
            Self::OutOfRange => write!(f, "time out of representable range"),
            Self::Implausible { behind_secs } => {
                write!(f, "update is {behind_secs}s behind current time")
            }
            Self::Unavailable => write!(f, "source unavailable"),
            Self::ReadOnly => write!(f, "source is read-only"),
        }
    }
}

impl core::error::Error for ClockError {}

impl From<BusFault> for ClockError {
    fn from(fault: BusFault) -> Self {
        Self::Bus(fault)
    }
}
