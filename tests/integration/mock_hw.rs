//! Mock hardware for integration tests.
//!
//! `MockRtcBus` emulates a DS3231 behind an `embedded_hal::i2c::I2c`
//! implementation: a register file with an auto-incrementing pointer, a
//! NACK switch, and a count of writes into the time block.  Clones share
//! the same chip so a test can keep a handle while the driver owns one.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{FixedOffset, NaiveDateTime};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use flowmeter::app::events::AppEvent;
use flowmeter::app::ports::EventSink;
use flowmeter::clock::rtc::{DS3231_ADDR, Ds3231, RtcRegisters};
use flowmeter::clock::to_local;
use flowmeter::timebase::SyncState;

// ── DS3231 register file ──────────────────────────────────────

struct Chip {
    regs: [u8; 0x13],
    pointer: usize,
    nack: bool,
    time_writes: usize,
}

#[derive(Clone)]
pub struct MockRtcBus {
    chip: Rc<RefCell<Chip>>,
}

#[allow(dead_code)]
impl MockRtcBus {
    /// Chip with a zeroed (invalid) time block.
    pub fn blank() -> Self {
        Self {
            chip: Rc::new(RefCell::new(Chip {
                regs: [0; 0x13],
                pointer: 0,
                nack: false,
                time_writes: 0,
            })),
        }
    }

    /// Chip whose registers hold `utc` expressed in `stored_offset`.
    pub fn holding(utc: NaiveDateTime, stored_offset: FixedOffset) -> Self {
        let bus = Self::blank();
        bus.set_registers(RtcRegisters::encode(&to_local(utc, stored_offset)).unwrap());
        bus
    }

    pub fn set_registers(&self, regs: RtcRegisters) {
        self.chip.borrow_mut().regs[..7].copy_from_slice(&regs.0);
    }

    pub fn registers(&self) -> RtcRegisters {
        let mut block = [0u8; 7];
        block.copy_from_slice(&self.chip.borrow().regs[..7]);
        RtcRegisters(block)
    }

    pub fn set_temperature(&self, msb: u8, lsb: u8) {
        let mut chip = self.chip.borrow_mut();
        chip.regs[0x11] = msb;
        chip.regs[0x12] = lsb;
    }

    /// Make every transaction fail with an address NACK.
    pub fn set_nack(&self, nack: bool) {
        self.chip.borrow_mut().nack = nack;
    }

    /// Write transactions that touched the time block.
    pub fn time_writes(&self) -> usize {
        self.chip.borrow().time_writes
    }

    /// Driver over a clone of this bus.
    pub fn driver(&self, stored_offset: FixedOffset) -> Ds3231<MockRtcBus> {
        Ds3231::new(self.clone(), stored_offset)
    }
}

impl ErrorType for MockRtcBus {
    type Error = ErrorKind;
}

impl I2c for MockRtcBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut chip = self.chip.borrow_mut();
        if chip.nack || address != DS3231_ADDR {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    chip.pointer = usize::from(reg);
                    if !data.is_empty() && chip.pointer < 7 {
                        chip.time_writes += 1;
                    }
                    for &b in data {
                        let p = chip.pointer % 0x13;
                        chip.regs[p] = b;
                        chip.pointer += 1;
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        let p = chip.pointer % 0x13;
                        *b = chip.regs[p];
                        chip.pointer += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Recording event sink ──────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_changes(&self) -> Vec<(SyncState, SyncState)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::TimeSyncChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}
