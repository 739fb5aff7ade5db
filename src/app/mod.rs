//! Application core: metering and timekeeping rules, no direct I/O.
//!
//! Hardware is reached only through [`ClockSource`](crate::clock::ClockSource)
//! implementations and the port traits in [`ports`], so the whole layer
//! runs on the host against mocks.

pub mod events;
pub mod ports;
pub mod service;
