//! Integration tests: Ds3231 (mock bus) + NetworkClock → TimeBase via
//! MeterService maintenance.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use flowmeter::app::events::AppEvent;
use flowmeter::app::service::MeterService;
use flowmeter::clock::monotonic::ManualMonotonic;
use flowmeter::clock::network::NetworkClock;
use flowmeter::clock::rtc::RtcRegisters;
use flowmeter::clock::{ClockRank, ClockSource, Timestamp};
use flowmeter::config::MeterConfig;
use flowmeter::error::{ClockError, RtcField};
use flowmeter::sensors::pulse::PulseCounter;
use flowmeter::timebase::{Maintenance, SyncState};

use crate::mock_hw::{MockRtcBus, RecordingSink};

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

#[test]
fn network_adoption_writes_rtc_exactly_once() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::holding(at(10, 0, 0), utc());
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();
    svc.boot(&mut rtc, &mut sink);

    // 60 s behind the RTC: inside the 120 s slew bound.
    let n = at(9, 59, 0);
    let outcome = svc.time_tick(Some(n), &mut rtc, &mut sink);
    assert!(matches!(outcome, Maintenance::NetworkAdopted(_)));
    assert_eq!(svc.time_base().now().utc(), Some(n));
    assert_eq!(bus.time_writes(), 1);
    assert_eq!(bus.registers().decode(), Ok(n));

    // Later maintenance ticks never write again.
    tick.advance_secs(60);
    svc.time_tick(None, &mut rtc, &mut sink);
    svc.time_tick(None, &mut rtc, &mut sink);
    assert_eq!(bus.time_writes(), 1);

    assert_eq!(
        sink.sync_changes(),
        vec![
            (SyncState::Unsynchronized, SyncState::HardwareSynced),
            (SyncState::HardwareSynced, SyncState::NetworkSynced),
        ]
    );
}

#[test]
fn implausible_network_time_is_discarded() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::holding(at(10, 0, 0), utc());
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();
    svc.boot(&mut rtc, &mut sink);
    let before = svc.time_base().now();

    let outcome = svc.time_tick(Some(at(9, 0, 0)), &mut rtc, &mut sink);
    assert_eq!(
        outcome,
        Maintenance::NetworkRejected(ClockError::Implausible { behind_secs: 3600 })
    );
    assert_eq!(svc.time_base().now(), before);
    assert_eq!(svc.time_base().state(), SyncState::HardwareSynced);
    assert_eq!(bus.time_writes(), 0);
    assert!(sink
        .events
        .contains(&AppEvent::NetworkTimeRejected { behind_secs: 3600 }));
}

#[test]
fn rtc_stored_in_local_offset_is_normalized() {
    let cst = FixedOffset::west_opt(6 * 3600).unwrap();
    let bus = MockRtcBus::blank();
    // Registers say 04:30 local (CST) → 10:30 UTC.
    bus.set_registers(RtcRegisters([0x00, 0x30, 0x04, 0x02, 0x01, 0x09, 0x25]));
    let mut rtc = bus.driver(cst);

    assert_eq!(rtc.read_local(), Ok((at(4, 30, 0), cst)));
    assert_eq!(
        rtc.read(),
        Ok(Timestamp::Civil {
            utc: at(10, 30, 0),
            source: ClockRank::Hardware
        })
    );

    rtc.write(&at(12, 0, 0)).unwrap();
    assert_eq!(bus.registers().decode(), Ok(at(6, 0, 0)));
}

#[test]
fn bus_failure_is_retried_until_rtc_returns() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::holding(at(10, 0, 0), utc());
    bus.set_nack(true);
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();

    assert_eq!(svc.boot(&mut rtc, &mut sink), SyncState::Unsynchronized);
    assert!(!svc.source_status().rtc_available);
    assert!(!rtc.capability().available);

    tick.advance_secs(60);
    let outcome = svc.time_tick(None, &mut rtc, &mut sink);
    assert!(matches!(outcome, Maintenance::RtcUnavailable(ClockError::Bus(_))));

    bus.set_nack(false);
    tick.advance_secs(60);
    svc.time_tick(None, &mut rtc, &mut sink);
    assert_eq!(svc.time_base().state(), SyncState::HardwareSynced);
    assert!(svc.source_status().rtc_available);
    assert_eq!(
        sink.sync_changes(),
        vec![(SyncState::Unsynchronized, SyncState::HardwareSynced)]
    );
}

#[test]
fn corrupt_registers_are_rejected() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::blank();
    bus.set_registers(RtcRegisters([0x00, 0x00, 0x00, 0x01, 0x01, 0x13, 0x25]));
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();

    svc.boot(&mut rtc, &mut sink);
    assert_eq!(
        sink.events[0],
        AppEvent::RtcUnavailable(ClockError::InvalidRegister { field: RtcField::Month })
    );
    assert_eq!(svc.time_base().state(), SyncState::Unsynchronized);
    assert!(!svc.time_base().now().is_authoritative());
}

#[test]
fn rtc_write_failure_does_not_block_network_sync() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::blank();
    bus.set_nack(true);
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();
    svc.boot(&mut rtc, &mut sink);

    let n = at(15, 0, 0);
    svc.time_tick(Some(n), &mut rtc, &mut sink);
    assert_eq!(svc.time_base().state(), SyncState::NetworkSynced);
    assert_eq!(svc.time_base().now().utc(), Some(n));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::RtcWriteFailed(_))), 1);
}

#[test]
fn network_synced_ignores_later_rtc_drift() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::holding(at(10, 0, 0), utc());
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();
    svc.boot(&mut rtc, &mut sink);
    svc.time_tick(Some(at(10, 0, 5)), &mut rtc, &mut sink);

    // Someone sets the chip back an hour behind our back.
    bus.set_registers(RtcRegisters::encode(&at(9, 0, 0)).unwrap());
    tick.advance_secs(60);
    assert_eq!(svc.time_tick(None, &mut rtc, &mut sink), Maintenance::Idle);
    assert_eq!(svc.time_base().now().utc(), Some(at(10, 1, 5)));
}

#[test]
fn mailbox_feeds_maintenance() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::holding(at(8, 0, 0), utc());
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();
    let network = NetworkClock::new();
    svc.boot(&mut rtc, &mut sink);

    network.deliver(at(8, 0, 1));
    network.deliver(at(8, 0, 2));
    svc.time_tick(network.take(), &mut rtc, &mut sink);
    assert_eq!(svc.time_base().now().utc(), Some(at(8, 0, 2)));
    assert!(svc.source_status().network_seen);
    assert!(network.take().is_none());
}

#[test]
fn rtc_temperature_is_diagnostic_only() {
    let bus = MockRtcBus::holding(at(10, 0, 0), utc());
    bus.set_temperature(0x1A, 0x80);
    let mut rtc = bus.driver(utc());
    assert!((rtc.temperature_c().unwrap() - 26.5).abs() < f32::EPSILON);

    bus.set_nack(true);
    assert!(rtc.temperature_c().is_err());
}

#[test]
fn relative_time_advances_monotonically_until_sync() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(1_000);
    let svc = MeterService::new(&config, &counter, &tick);
    let tb = svc.time_base();

    let a = tb.now();
    tick.advance_us(500);
    let b = tb.now();
    match (a, b) {
        (Timestamp::Relative { uptime_us: x }, Timestamp::Relative { uptime_us: y }) => {
            assert!(y > x);
        }
        other => panic!("expected relative stamps, got {:?}", other),
    }

    let mut rtc = MockRtcBus::holding(at(0, 0, 0), utc()).driver(utc());
    svc.time_tick(Some(at(0, 0, 0) + TimeDelta::days(1)), &mut rtc, &mut RecordingSink::new());
    assert!(tb.now().is_authoritative());
}

#[test]
fn rtc_maintenance_never_steps_readings_backward() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::holding(at(10, 0, 0), utc());
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();
    svc.boot(&mut rtc, &mut sink);

    tick.advance_us(60_900_000);
    bus.set_registers(RtcRegisters::encode(&at(10, 1, 0)).unwrap());
    let before = svc.sample_tick(&mut sink).timestamp.utc().unwrap();
    svc.time_tick(None, &mut rtc, &mut sink);
    let after = svc.sample_tick(&mut sink).timestamp.utc().unwrap();
    assert!(after >= before, "{after} < {before}");
}

#[test]
fn rtc_is_unavailable_until_it_answers() {
    let bus = MockRtcBus::holding(at(10, 0, 0), utc());
    let mut rtc = bus.driver(utc());
    assert!(!rtc.capability().available);

    rtc.read().unwrap();
    assert!(rtc.capability().available);

    bus.set_nack(true);
    assert!(rtc.read().is_err());
    assert!(!rtc.capability().available);
}
