//! Integration tests: PulseCounter → MeterService → Reading / TelemetryPort.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use flowmeter::app::events::AppEvent;
use flowmeter::app::ports::TelemetryPort;
use flowmeter::app::service::MeterService;
use flowmeter::clock::monotonic::ManualMonotonic;
use flowmeter::clock::{ClockRank, Timestamp};
use flowmeter::config::MeterConfig;
use flowmeter::sensors::pulse::PulseCounter;
use flowmeter::timebase::SyncState;

use crate::mock_hw::{MockRtcBus, RecordingSink};

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 4, 15)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn edges(counter: &PulseCounter, n: u32) {
    for _ in 0..n {
        counter.record_edge();
    }
}

#[test]
fn calibration_scenario_with_rtc_timestamp() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::holding(at(18, 0, 0), utc());
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();

    assert_eq!(svc.boot(&mut rtc, &mut sink), SyncState::HardwareSynced);

    edges(&counter, 150);
    tick.advance_secs(30);
    let r = svc.sample_tick(&mut sink);

    assert!((r.flow_rate - 1.0).abs() < 1e-6);
    assert!((r.total_volume - 0.5).abs() < 1e-6);
    assert_eq!(
        r.timestamp,
        Timestamp::Civil {
            utc: at(18, 0, 30),
            source: ClockRank::Hardware
        }
    );

    // Default civil offset is CST.
    let payload = r.to_payload(svc.civil_offset());
    assert_eq!(payload.time.as_str(), "12:00:30");
    assert!(payload.synced);
    assert_eq!(
        payload.to_json().unwrap(),
        r#"{"flow":1.0,"volume":0.5,"time":"12:00:30","synced":true}"#
    );
}

#[test]
fn no_reading_before_first_sample() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    assert!(svc.latest_reading().is_none());
}

#[test]
fn latest_reading_tracks_sampler() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let mut sink = RecordingSink::new();

    edges(&counter, 30);
    tick.advance_secs(1);
    let r = svc.sample_tick(&mut sink);
    assert_eq!(svc.latest_reading(), Some(r));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Telemetry(_))), 1);
}

#[test]
fn reset_clears_latest_and_rebaselines() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let mut sink = RecordingSink::new();

    edges(&counter, 600);
    tick.advance_secs(60);
    svc.sample_tick(&mut sink);

    let cleared = svc.reset_volume_with(&mut sink);
    assert!((cleared - 2.0).abs() < 1e-6);
    let latest = svc.latest_reading().unwrap();
    assert!(latest.total_volume.abs() < f32::EPSILON);
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::VolumeReset { .. })
    ));

    edges(&counter, 90);
    tick.advance_secs(1);
    let r = svc.sample_tick(&mut sink);
    assert!((r.total_volume - 0.3).abs() < 1e-6);
}

#[test]
fn unsampled_pulses_are_dropped_by_reset() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let mut sink = RecordingSink::new();

    edges(&counter, 300);
    svc.reset_volume();
    tick.advance_secs(1);
    let r = svc.sample_tick(&mut sink);
    assert!(r.total_volume.abs() < f32::EPSILON);
    assert!(r.flow_rate.abs() < f32::EPSILON);
}

#[test]
fn dead_rtc_yields_flagged_relative_time() {
    let config = MeterConfig::default();
    let counter = PulseCounter::new();
    let tick = ManualMonotonic::new(0);
    let svc = MeterService::new(&config, &counter, &tick);
    let bus = MockRtcBus::blank();
    bus.set_nack(true);
    let mut rtc = bus.driver(utc());
    let mut sink = RecordingSink::new();

    assert_eq!(svc.boot(&mut rtc, &mut sink), SyncState::Unsynchronized);
    assert!(matches!(sink.events[0], AppEvent::RtcUnavailable(_)));
    assert_eq!(sink.events[1], AppEvent::Started(SyncState::Unsynchronized));

    tick.advance_secs(3661);
    let r = svc.sample_tick(&mut sink);
    assert!(!r.timestamp.is_authoritative());
    let payload = r.to_payload(svc.civil_offset());
    assert_eq!(payload.time.as_str(), "01:01:01");
    assert!(!payload.synced);
}

#[test]
fn sampler_and_reset_from_other_threads() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    let config = MeterConfig::default();
    let counter: &'static PulseCounter = Box::leak(Box::new(PulseCounter::new()));
    let tick: &'static ManualMonotonic = Box::leak(Box::new(ManualMonotonic::new(0)));
    let svc = Arc::new(MeterService::new(&config, counter, tick));
    let done = Arc::new(AtomicBool::new(false));

    let isr = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                counter.record_edge();
            }
        })
    };
    let sampler = {
        let svc = Arc::clone(&svc);
        thread::spawn(move || {
            let mut sink = RecordingSink::new();
            for _ in 0..500 {
                tick.advance_us(1_000);
                let r = svc.sample_tick(&mut sink);
                assert!(r.flow_rate >= 0.0);
                assert!(r.total_volume >= 0.0);
            }
        })
    };
    for _ in 0..50 {
        svc.reset_volume();
        thread::yield_now();
    }
    sampler.join().unwrap();
    done.store(true, Ordering::Relaxed);
    isr.join().unwrap();

    // Quiesced: one more reset, then an exact count.
    svc.reset_volume();
    edges(counter, 30);
    tick.advance_secs(1);
    let r = svc.sample_tick(&mut RecordingSink::new());
    assert!((r.total_volume - 0.1).abs() < 1e-6);
}
