//! One-shot hardware peripheral initialization.
//!
//! Configures the flow sensor's pulse input and hooks its edge interrupt
//! to [`flow_isr_handler`] using raw ESP-IDF sys calls.  Called once from
//! `main()` before the sampling task starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::sensors::pulse::flow_isr_handler;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    InvalidPin(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrAddFailed(i32),
    IntrEnableFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidPin(pin) => write!(f, "GPIO{} is not a valid input", pin),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrAddFailed(rc) => write!(f, "GPIO ISR handler add failed (rc={})", rc),
            Self::IntrEnableFailed(rc) => write!(f, "GPIO interrupt enable failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

// ── Flow pulse input ──────────────────────────────────────────

/// Runs in interrupt context: one atomic increment, nothing else.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn flow_gpio_isr(_arg: *mut core::ffi::c_void) {
    flow_isr_handler();
}

/// Configure `gpio` as a pulled-up input interrupting on the rising edge
/// and register the flow ISR.
#[cfg(target_os = "espidf")]
pub fn init_pulse_input(gpio: i32) -> Result<(), HwInitError> {
    if !(0..64).contains(&gpio) {
        return Err(HwInitError::InvalidPin(gpio));
    }
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << gpio,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_POSEDGE,
    };
    // SAFETY: called once from main() before the sampling task exists.
    // ESP_ERR_INVALID_STATE from the ISR service means it is already
    // installed. The handler is a static fn that touches only an atomic.
    unsafe {
        let ret = gpio_config(&cfg);
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        let ret = gpio_isr_handler_add(gpio, Some(flow_gpio_isr), core::ptr::null_mut());
        if ret != ESP_OK {
            return Err(HwInitError::IsrAddFailed(ret));
        }
        let ret = gpio_intr_enable(gpio);
        if ret != ESP_OK {
            gpio_isr_handler_remove(gpio);
            return Err(HwInitError::IntrEnableFailed(ret));
        }
    }
    info!("hw_init: flow pulse input on GPIO{} (rising edge)", gpio);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_pulse_input(gpio: i32) -> Result<(), HwInitError> {
    if !(0..64).contains(&gpio) {
        return Err(HwInitError::InvalidPin(gpio));
    }
    log::info!("hw_init(sim): pulse input GPIO{} not wired", gpio);
    Ok(())
}
