//! Peripheral initialisation and task helpers.

pub mod hw_init;
pub mod task_pin;
