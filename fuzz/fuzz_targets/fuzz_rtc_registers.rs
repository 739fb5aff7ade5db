//! Fuzz target: `RtcRegisters::decode`
//!
//! Feeds arbitrary register blocks (as read off a glitchy bus) through the
//! DS3231 decoder and asserts that it never panics and that anything it
//! accepts survives an encode/decode cycle unchanged.
//!
//! cargo fuzz run fuzz_rtc_registers

#![no_main]

use flowmeter::clock::rtc::{RtcRegisters, decode_temperature};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some(block) = data.get(..7) else {
        return;
    };
    let mut raw = [0u8; 7];
    raw.copy_from_slice(block);

    if let Ok(dt) = RtcRegisters(raw).decode() {
        let regs = RtcRegisters::encode(&dt).expect("decoded time must be encodable");
        assert_eq!(regs.decode(), Ok(dt));
    }

    if let [msb, lsb, ..] = &data[7..] {
        let t = decode_temperature(*msb, *lsb);
        assert!((-128.0..128.0).contains(&t));
    }
});
