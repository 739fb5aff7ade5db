//! Fuzz target: persisted `MeterConfig` blob
//!
//! Decodes arbitrary bytes the way the NVS store does and runs the
//! validator on whatever comes out.  Neither step may panic, and a config
//! that validates must survive a re-encode unchanged.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use flowmeter::config::MeterConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = postcard::from_bytes::<MeterConfig>(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        let bytes = postcard::to_allocvec(&cfg).expect("valid config must encode");
        let again: MeterConfig = postcard::from_bytes(&bytes).expect("re-encoded config must decode");
        assert_eq!(again, cfg);
    }
});
