//! DS3231 battery-backed real-time clock.
//!
//! Highest-ranked source: survives power loss and can be written.  The
//! driver is generic over any [`embedded_hal::i2c::I2c`] bus, so the same
//! code runs against `esp_idf_hal::i2c::I2cDriver` on the device and
//! against a mock bus in tests.
//!
//! ## Register map (subset)
//!
//! ```text
//!   0x00  seconds   BCD, bit 7 reserved         mask 0x7F
//!   0x01  minutes   BCD, bit 7 reserved         mask 0x7F
//!   0x02  hours     BCD, 24 h, bits 7:6 mode    mask 0x3F
//!   0x03  weekday   1..7, 1 = Sunday            mask 0x07
//!   0x04  day       BCD                         mask 0x3F
//!   0x05  month     BCD, bit 7 century          mask 0x1F
//!   0x06  year      BCD, 00..99 → 2000..2099
//!   0x11  temp MSB  signed integer °C
//!   0x12  temp LSB  bits 7:6 = 0.25 °C steps
//! ```
//!
//! The registers hold civil time in a configured offset (UTC by default).
//! [`ClockSource::read`] and [`ClockSource::write`] translate to and from
//! UTC so nothing outside this file sees the stored offset.

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use embedded_hal::i2c::{Error as _, I2c};

use super::{Capability, ClockRank, ClockSource, Timestamp, to_local, to_utc};
use crate::error::{BusFault, ClockError, RtcField};

/// 7-bit bus address.
pub const DS3231_ADDR: u8 = 0x68;
const REG_TIME: u8 = 0x00;
const REG_TEMP: u8 = 0x11;

// ── Packed-decimal register block ──────────────────────────────

/// Raw 7-byte time block as stored at register 0x00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcRegisters(pub [u8; 7]);

impl RtcRegisters {
    /// Decode to a calendar value in the RTC's stored offset.
    ///
    /// Flag bits are masked off first.  Any nibble above 9 or any field
    /// outside its calendar range is rejected with the offending field.
    pub fn decode(&self) -> Result<NaiveDateTime, ClockError> {
        let [sec, min, hour, wday, day, month, year] = self.0;

        let sec = bcd_field(sec, 0x7F, RtcField::Seconds, 0, 59)?;
        let min = bcd_field(min, 0x7F, RtcField::Minutes, 0, 59)?;
        let hour = bcd_field(hour, 0x3F, RtcField::Hours, 0, 23)?;
        bcd_field(wday, 0x07, RtcField::Weekday, 1, 7)?;
        let day = bcd_field(day, 0x3F, RtcField::Day, 1, 31)?;
        let month = bcd_field(month, 0x1F, RtcField::Month, 1, 12)?;
        let year = bcd_field(year, 0xFF, RtcField::Year, 0, 99)?;

        // 31 February and friends pass the per-field checks.
        let date = NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
            .ok_or(ClockError::InvalidRegister { field: RtcField::Day })?;
        date.and_hms_opt(hour, min, sec)
            .ok_or(ClockError::InvalidRegister { field: RtcField::Seconds })
    }

    /// Encode a calendar value already expressed in the RTC's stored offset.
    pub fn encode(local: &NaiveDateTime) -> Result<Self, ClockError> {
        let year = local.year();
        if !(2000..=2099).contains(&year) {
            return Err(ClockError::OutOfRange);
        }
        Ok(Self([
            to_bcd(local.second()),
            to_bcd(local.minute()),
            to_bcd(local.hour()),
            (local.weekday().num_days_from_sunday() + 1) as u8,
            to_bcd(local.day()),
            to_bcd(local.month()),
            to_bcd((year - 2000) as u32),
        ]))
    }
}

fn bcd_field(raw: u8, mask: u8, field: RtcField, lo: u32, hi: u32) -> Result<u32, ClockError> {
    let v = raw & mask;
    let (tens, ones) = (v >> 4, v & 0x0F);
    if tens > 9 || ones > 9 {
        return Err(ClockError::InvalidRegister { field });
    }
    let value = u32::from(tens) * 10 + u32::from(ones);
    if !(lo..=hi).contains(&value) {
        return Err(ClockError::InvalidRegister { field });
    }
    Ok(value)
}

fn to_bcd(v: u32) -> u8 {
    (((v / 10) << 4) | (v % 10)) as u8
}

/// Decode the two temperature registers to °C.
pub fn decode_temperature(msb: u8, lsb: u8) -> f32 {
    f32::from(msb as i8) + f32::from(lsb >> 6) * 0.25
}

// ── Driver ─────────────────────────────────────────────────────

pub struct Ds3231<I2C> {
    i2c: I2C,
    offset: FixedOffset,
    /// Outcome of the most recent time transaction.  False until the
    /// chip has answered once.
    reachable: bool,
}

impl<I2C: I2c> Ds3231<I2C> {
    /// `offset` is the civil offset the registers are kept in.
    pub fn new(i2c: I2C, offset: FixedOffset) -> Self {
        Self {
            i2c,
            offset,
            reachable: false,
        }
    }

    pub fn read_registers(&mut self) -> Result<RtcRegisters, ClockError> {
        let mut block = [0u8; 7];
        let res = self
            .i2c
            .write_read(DS3231_ADDR, &[REG_TIME], &mut block)
            .map_err(|e| ClockError::from(BusFault::from(e.kind())));
        self.reachable = res.is_ok();
        res.map(|()| RtcRegisters(block))
    }

    pub fn write_registers(&mut self, regs: &RtcRegisters) -> Result<(), ClockError> {
        let mut frame = [0u8; 8];
        frame[0] = REG_TIME;
        frame[1..].copy_from_slice(&regs.0);
        let res = self
            .i2c
            .write(DS3231_ADDR, &frame)
            .map_err(|e| ClockError::from(BusFault::from(e.kind())));
        self.reachable = res.is_ok();
        res
    }

    /// Calendar time as stored, with the offset it is stored in.
    pub fn read_local(&mut self) -> Result<(NaiveDateTime, FixedOffset), ClockError> {
        let local = self.read_registers()?.decode()?;
        Ok((local, self.offset))
    }

    /// Die temperature.  Diagnostic only; updated by the chip every 64 s.
    pub fn temperature_c(&mut self) -> Result<f32, ClockError> {
        let mut raw = [0u8; 2];
        self.i2c
            .write_read(DS3231_ADDR, &[REG_TEMP], &mut raw)
            .map_err(|e| ClockError::from(BusFault::from(e.kind())))?;
        Ok(decode_temperature(raw[0], raw[1]))
    }
}

impl<I2C: I2c> ClockSource for Ds3231<I2C> {
    fn capability(&self) -> Capability {
        Capability {
            available: self.reachable,
            rank: ClockRank::Hardware,
            can_write: true,
        }
    }

    fn read(&mut self) -> Result<Timestamp, ClockError> {
        let (local, offset) = self.read_local()?;
        Ok(Timestamp::Civil {
            utc: to_utc(local, offset),
            source: ClockRank::Hardware,
        })
    }

    fn write(&mut self, utc: &NaiveDateTime) -> Result<(), ClockError> {
        let regs = RtcRegisters::encode(&to_local(*utc, self.offset))?;
        self.write_registers(&regs)
    }
}
