//! Core-pinned thread spawning for the ESP32-S3.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::Builder::spawn`
//! creates a FreeRTOS task pinned to a core with an explicit priority and
//! stack size.  On non-ESP targets it falls back to a plain thread with
//! the requested stack.
//!
//! `esp_pthread_set_cfg()` is thread-local and applies to the *next*
//! `pthread_create()` from the calling thread, so the config/spawn pair
//! must not be interleaved with other thread creation on that thread.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers for the ESP32-S3 dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// PRO_CPU: Wi-Fi, lwIP, the SNTP callback and time-base maintenance.
    Pro = 0,
    /// APP_CPU: flow sampling.
    App = 1,
}

/// Thread parameters for [`spawn_on_core`].
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// Must end in `\0` for FreeRTOS, e.g. `"flow-sample\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

#[cfg(target_os = "espidf")]
pub fn spawn_on_core<F>(spec: TaskSpec, f: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    // SAFETY: the default config is plain data; `thread_name` points at a
    // 'static NUL-terminated string that outlives the spawned task.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as _;
        cfg.thread_name = spec.name.as_ptr() as *const _;
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
}

/// Simulation fallback: ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core<F>(spec: TaskSpec, f: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb * 1024)
        .spawn(f)
}
