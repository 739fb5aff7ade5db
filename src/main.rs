//! Flowmeter firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  LogEventSink   NvsConfigStore   SystemMonotonic   SNTP bridge │
//! │  (EventSink)    (ConfigPort)     (Monotonic)       (mailbox)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              MeterService (pure logic)                 │    │
//! │  │  RateEstimator · TimeBase                              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  GPIO ISR → FLOW_PULSES          Ds3231 on I2C0                │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use core::sync::atomic::AtomicBool;
use core::time::Duration;

use anyhow::Result;
use esp_idf_svc::hal::gpio::AnyIOPin;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use flowmeter::adapters::log_sink::LogEventSink;
use flowmeter::adapters::nvs::NvsConfigStore;
use flowmeter::adapters::sntp;
use flowmeter::adapters::time::SystemMonotonic;
use flowmeter::app::service::MeterService;
use flowmeter::clock::network::NETWORK_TIME;
use flowmeter::clock::rtc::Ds3231;
use flowmeter::config::MeterConfig;
use flowmeter::drivers::hw_init;
use flowmeter::drivers::task_pin::{Core, TaskSpec, spawn_on_core};
use flowmeter::sensors::pulse::FLOW_PULSES;
use flowmeter::tasks;

/// Never set in production; the tasks run for the life of the device.
static STOP: AtomicBool = AtomicBool::new(false);

/// I²C and the async timer reactor; low priority, the sampler must win.
const MAINTENANCE_TASK: TaskSpec = TaskSpec {
    name: "time-maint\0",
    core: Core::Pro,
    priority: 3,
    stack_kb: 8,
};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Flowmeter v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsConfigStore::new(nvs_partition) {
        Ok(store) => store.load_or_default(),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            MeterConfig::default()
        }
    };
    let civil_offset = config.civil_offset();

    // ── 3. Flow pulse input ───────────────────────────────────
    hw_init::init_pulse_input(config.pulse_gpio)?;

    // ── 4. RTC on I2C0 ────────────────────────────────────────
    let i2c_config = I2cConfig::new()
        .baudrate(Hertz(config.rtc_i2c_freq_hz))
        .timeout(Duration::from_millis(u64::from(config.rtc_timeout_ms)).into());
    // SAFETY: the configured SDA/SCL pins are used by nothing else on
    // this board; the typed pin singletons for them are never taken.
    let (sda, scl) = unsafe {
        (
            AnyIOPin::new(config.rtc_sda_gpio),
            AnyIOPin::new(config.rtc_scl_gpio),
        )
    };
    let i2c = I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_config)?;
    let mut rtc = Ds3231::new(i2c, config.rtc_offset());

    // ── 5. Service + boot-time RTC read ──────────────────────
    let service: &'static MeterService<'static, SystemMonotonic> = Box::leak(Box::new(
        MeterService::new(&config, &FLOW_PULSES, SystemMonotonic::new()),
    ));
    let mut sink = LogEventSink::new(civil_offset);
    service.boot(&mut rtc, &mut sink);

    // ── 6. Sampling task ──────────────────────────────────────
    let period = Duration::from_millis(u64::from(config.sample_period_ms));
    spawn_on_core(
        TaskSpec {
            name: "flow-sample\0",
            core: Core::App,
            priority: config.sampler_priority,
            stack_kb: usize::from(config.sampler_stack_kb),
        },
        move || {
            let mut sink = LogEventSink::new(civil_offset);
            tasks::run_sampler(service, period, &mut sink, &STOP);
        },
    )?;

    // ── 7. Network time ───────────────────────────────────────
    let _sntp = match sntp::start(&NETWORK_TIME) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("SNTP start failed ({}), RTC only", e);
            None
        }
    };

    // ── 8. Time-base maintenance (PRO core, next to SNTP) ─────
    let interval = Duration::from_secs(u64::from(config.maintenance_interval_secs));
    let maintenance = spawn_on_core(MAINTENANCE_TASK, move || {
        futures_lite::future::block_on(tasks::run_maintenance(
            service,
            &NETWORK_TIME,
            &mut rtc,
            interval,
            &mut sink,
            &STOP,
        ));
    })?;

    info!("System ready.");

    // Keeps the SNTP handle alive for as long as maintenance runs.
    maintenance
        .join()
        .map_err(|_| anyhow::anyhow!("time-maint task panicked"))?;

    Ok(())
}
