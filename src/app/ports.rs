//! Port traits: the hexagonal boundary between the metering core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MeterService (domain)
//! ```
//!
//! Driven adapters (event sinks, config storage) implement these traits
//! and are injected into [`MeterService`](super::service::MeterService).
//! [`TelemetryPort`] faces the other way: it is the whole surface that an
//! outer layer (web server, console) may call.

use crate::config::MeterConfig;
use crate::telemetry::Reading;

// ───────────────────────────────────────────────────────────────
// Telemetry port (driving adapter: outer layer → domain)
// ───────────────────────────────────────────────────────────────

/// The only two operations external layers may invoke.
pub trait TelemetryPort {
    /// Most recent reading, or `None` before the first sample.
    fn latest_reading(&self) -> Option<Reading>;

    /// Zero the cumulative volume.  Returns the litres cleared.
    fn reset_volume(&self) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`MeterConfig`].
///
/// Implementations validate with [`MeterConfig::validate`] before
/// persisting and reject, never clamp, out-of-range values.
pub trait ConfigPort {
    /// Returns [`MeterConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<MeterConfig, ConfigError>;

    fn save(&self, config: &MeterConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored blob failed to deserialize.
    Corrupted,
    /// A field failed range validation.  Names the field and the range.
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

