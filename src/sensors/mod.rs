//! Flow sensor subsystem.
//!
//! [`pulse`] holds the interrupt-fed counter; [`flow`] turns its count into
//! rate and volume on the sampling task.

pub mod flow;
pub mod pulse;
