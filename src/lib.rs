//! Flowmeter firmware library.
//!
//! Exposes the metering and timekeeping logic for integration testing and
//! host simulation.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod clock;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod sensors;
pub mod tasks;
pub mod telemetry;
pub mod timebase;
