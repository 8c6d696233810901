//! End-to-end acquisition scenarios over the simulated peripheral.

use metron_core::{
    AbortPolicy, Adc, AdcConfig, AdcPeripheral, CaptureMode, ChannelConfig, ChannelId,
    ChannelSelect, DriverState, Error, Event, EventFlag, HardwareScan, LimitBound, ScanStrategy,
    SoftwareScan,
};
use metron_hal_sim::{Pattern, ScanCapability, SimAdc};

fn ch(n: u8) -> ChannelId {
    ChannelId::new(n).unwrap()
}

fn engine<'buf>(capability: ScanCapability) -> Adc<'buf, SimAdc, SoftwareScan> {
    let mut adc = Adc::new(SimAdc::new(capability), SoftwareScan, AdcConfig::default());
    adc.init().unwrap();
    adc
}

/// Drive the engine the way an IRQ handler would, until it goes idle.
fn run_to_idle<S: ScanStrategy>(adc: &mut Adc<'_, SimAdc, S>) {
    let mut guard = 0;
    while adc.is_busy() {
        if adc.peripheral().event_pending(EventFlag::SampleReady) {
            adc.on_interrupt();
        }
        guard += 1;
        assert!(guard < 10_000, "engine never went idle");
    }
}

#[test]
fn test_scan_order_follows_enable_order() {
    let mut buf = [0i16; 6];
    let mut adc = engine(ScanCapability::SingleStep);
    // Enable in non-numeric order; scan order must match it
    for (n, value) in [(4u8, 40i16), (0, 10), (2, 20)] {
        adc.enable_channel(ch(n), ChannelConfig::default()).unwrap();
        adc.peripheral_mut().set_pattern(ch(n), Pattern::constant(value));
    }
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    run_to_idle(&mut adc);
    match adc.poll_event() {
        Some(Event::Done {
            buffer,
            count,
            overflowed,
        }) => {
            assert_eq!(count, 6);
            assert!(!overflowed);
            assert_eq!(buffer, &[40, 10, 20, 40, 10, 20]);
        }
        other => panic!("expected Done, got {other:?}"),
    }
    assert!(adc.poll_event().is_none());
}

#[test]
fn test_two_channel_two_pass_capture() {
    // Two channels, two passes: one Done{buffer, 4} whose contents
    // interleave as [A0, B0, A1, B1].
    let mut buf = [0i16; 4];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.enable_channel(ch(1), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(0), Pattern::ramp(0, 1));
    adc.peripheral_mut().set_pattern(ch(1), Pattern::ramp(100, 1));
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    run_to_idle(&mut adc);
    match adc.poll_event() {
        Some(Event::Done { buffer, count, .. }) => {
            assert_eq!(count, 4);
            assert_eq!(buffer, &[0, 100, 1, 101]);
        }
        other => panic!("expected Done, got {other:?}"),
    }
    assert!(adc.poll_event().is_none(), "exactly one event expected");
}

#[test]
fn test_single_pass_stops_after_one_cycle() {
    let mut buf = [0i16; 8];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.enable_channel(ch(1), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(0), Pattern::constant(1));
    adc.peripheral_mut().set_pattern(ch(1), Pattern::constant(2));
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::SinglePass)
        .unwrap();
    run_to_idle(&mut adc);
    match adc.poll_event() {
        Some(Event::Done { buffer, count, .. }) => {
            assert_eq!(count, 2);
            assert_eq!(&buffer[..2], &[1, 2]);
        }
        other => panic!("expected Done, got {other:?}"),
    }
}

#[test]
fn test_gapless_double_buffering() {
    let mut a = [0i16; 4];
    let mut b = [0i16; 4];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(0), Pattern::ramp(0, 1));
    adc.start_buffered(&mut a, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    adc.queue_next_buffer(&mut b).unwrap();
    run_to_idle(&mut adc);
    // Two Dones; the secondary's first sample immediately follows the
    // primary's last: nothing dropped, nothing duplicated.
    match adc.poll_event() {
        Some(Event::Done { buffer, count, .. }) => {
            assert_eq!(count, 4);
            assert_eq!(buffer, &[0, 1, 2, 3]);
        }
        other => panic!("expected first Done, got {other:?}"),
    }
    match adc.poll_event() {
        Some(Event::Done { buffer, count, .. }) => {
            assert_eq!(count, 4);
            assert_eq!(buffer, &[4, 5, 6, 7]);
        }
        other => panic!("expected second Done, got {other:?}"),
    }
    assert_eq!(adc.state(), DriverState::Idle);
}

#[test]
fn test_buffer_chain_keeps_capture_alive() {
    let mut a = [0i16; 2];
    let mut b = [0i16; 2];
    let mut c = [0i16; 2];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(0), Pattern::ramp(0, 1));
    adc.start_buffered(&mut a, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    adc.queue_next_buffer(&mut b).unwrap();
    // Drive until the first handoff, then refill the secondary slot
    let mut first_done = None;
    while first_done.is_none() {
        adc.on_interrupt();
        first_done = adc.poll_event();
    }
    assert!(adc.is_busy());
    adc.queue_next_buffer(&mut c).unwrap();
    run_to_idle(&mut adc);
    let mut seen = vec![];
    if let Some(Event::Done { buffer, .. }) = first_done {
        seen.extend_from_slice(buffer);
    }
    while let Some(Event::Done { buffer, .. }) = adc.poll_event() {
        seen.extend_from_slice(buffer);
    }
    assert_eq!(seen, [0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_second_secondary_rejected_while_queued() {
    let mut a = [0i16; 8];
    let mut b = [0i16; 8];
    let mut c = [0i16; 8];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.start_buffered(&mut a, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    adc.queue_next_buffer(&mut b).unwrap();
    assert_eq!(adc.queue_next_buffer(&mut c), Err(Error::AlreadyQueued));
    let _ = adc.abort();
}

#[test]
fn test_sample_single_rejected_while_buffered_session_runs() {
    // sample_single during a buffered session returns Busy and the
    // buffered capture is unaffected.
    let mut buf = [0i16; 4];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.enable_channel(ch(1), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(0), Pattern::constant(11));
    adc.peripheral_mut().set_pattern(ch(1), Pattern::constant(22));
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    assert_eq!(adc.sample_single(ch(0)), Err(Error::Busy));
    run_to_idle(&mut adc);
    match adc.poll_event() {
        Some(Event::Done { buffer, count, .. }) => {
            assert_eq!(count, 4);
            assert_eq!(buffer, &[11, 22, 11, 22]);
        }
        other => panic!("expected Done, got {other:?}"),
    }
}

#[test]
fn test_single_channel_buffered_select() {
    let mut buf = [0i16; 3];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.enable_channel(ch(1), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(1), Pattern::ramp(7, 7));
    adc.start_buffered(&mut buf, ChannelSelect::One(ch(1)), CaptureMode::Continuous)
        .unwrap();
    run_to_idle(&mut adc);
    match adc.poll_event() {
        Some(Event::Done { buffer, .. }) => assert_eq!(buffer, &[7, 14, 21]),
        other => panic!("expected Done, got {other:?}"),
    }
}

#[test]
fn test_abort_mid_session_discard() {
    let mut buf = [0i16; 6];
    // Declared before `adc` so it outlives the driver's borrow (drop order)
    let mut again = [0i16; 2];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(0), Pattern::ramp(0, 1));
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    adc.on_interrupt();
    adc.on_interrupt();
    assert!(adc.is_busy());
    // A third conversion is already latched; default policy discards it
    adc.abort().unwrap();
    assert_eq!(adc.state(), DriverState::Idle);
    match adc.poll_event() {
        Some(Event::Done { buffer, count, .. }) => {
            assert_eq!(count, 2);
            assert_eq!(&buffer[..2], &[0, 1]);
        }
        other => panic!("expected partial Done, got {other:?}"),
    }
    // A subsequent start must succeed
    adc.start_buffered(&mut again, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    run_to_idle(&mut adc);
}

#[test]
fn test_abort_mid_session_deliver_partial() {
    let mut buf = [0i16; 6];
    let mut adc = Adc::new(
        SimAdc::new(ScanCapability::SingleStep),
        SoftwareScan,
        AdcConfig {
            abort_policy: AbortPolicy::DeliverPartial,
            ..AdcConfig::default()
        },
    );
    adc.init().unwrap();
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(0), Pattern::ramp(0, 1));
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    adc.on_interrupt();
    adc.on_interrupt();
    // The latched third conversion is appended before hand-back
    adc.abort().unwrap();
    match adc.poll_event() {
        Some(Event::Done { buffer, count, .. }) => {
            assert_eq!(count, 3);
            assert_eq!(&buffer[..3], &[0, 1, 2]);
        }
        other => panic!("expected partial Done, got {other:?}"),
    }
}

#[test]
fn test_abort_returns_queued_secondary_untouched() {
    let mut a = [0i16; 8];
    let mut b = [0i16; 8];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.start_buffered(&mut a, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    adc.queue_next_buffer(&mut b).unwrap();
    adc.on_interrupt();
    adc.abort().unwrap();
    let first = adc.poll_event();
    assert!(matches!(first, Some(Event::Done { count: 1, .. })));
    let second = adc.poll_event();
    assert!(
        matches!(second, Some(Event::Done { count: 0, .. })),
        "secondary must come back unfilled"
    );
}

#[test]
fn test_abort_stop_timeout_still_forces_idle() {
    let mut buf = [0i16; 4];
    let mut adc = Adc::new(
        SimAdc::new(ScanCapability::SingleStep),
        SoftwareScan,
        AdcConfig {
            stop_poll_budget: 16,
            ..AdcConfig::default()
        },
    );
    adc.init().unwrap();
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    adc.peripheral_mut().set_ignore_stop(true);
    assert_eq!(adc.abort(), Err(Error::Timeout));
    // Degraded but defined: idle, and the buffer came back
    assert_eq!(adc.state(), DriverState::Idle);
    assert!(matches!(adc.poll_event(), Some(Event::Done { .. })));
}

#[test]
fn test_limit_events_are_edge_triggered() {
    // One event per crossing, not one per sample beyond the threshold.
    let mut buf = [0i16; 6];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.set_limits(ch(0), None, Some(3000)).unwrap();
    adc.peripheral_mut().set_pattern(
        ch(0),
        Pattern::sequence(&[500, 3500, 3600, 200, 3700, 100]),
    );
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    run_to_idle(&mut adc);
    let mut limit_events = 0;
    let mut done_seen = false;
    while let Some(event) = adc.poll_event() {
        match event {
            Event::Limit { channel, bound } => {
                assert_eq!(channel, ch(0));
                assert_eq!(bound, LimitBound::High);
                limit_events += 1;
            }
            Event::Done { count, .. } => {
                assert_eq!(count, 6);
                done_seen = true;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(limit_events, 2);
    assert!(done_seen);
}

#[test]
fn test_limits_watch_single_conversions_too() {
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.set_limits(ch(0), Some(100), None).unwrap();
    adc.peripheral_mut().set_pattern(ch(0), Pattern::constant(50));
    let _ = adc.sample_single(ch(0)).unwrap();
    assert!(matches!(
        adc.poll_event(),
        Some(Event::Limit {
            bound: LimitBound::Low,
            ..
        })
    ));
}

#[test]
fn test_set_limits_allowed_while_busy() {
    let mut buf = [0i16; 4];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    // The comparator is independent of the session lifecycle
    assert_eq!(adc.set_limits(ch(0), Some(10), Some(100)), Ok(()));
    let _ = adc.abort();
}

#[test]
fn test_start_single_delivers_sample_event() {
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(3), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(3), Pattern::constant(321));
    adc.start_single(ch(3)).unwrap();
    assert!(adc.is_busy());
    adc.on_interrupt();
    assert_eq!(adc.state(), DriverState::Idle);
    assert_eq!(adc.poll_event(), Some(Event::Sample { value: 321 }));
}

#[test]
fn test_capture_blocking_returns_filled_buffer() {
    let mut buf = [0i16; 4];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.peripheral_mut().set_pattern(ch(0), Pattern::ramp(5, 5));
    let done = adc
        .capture_blocking(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    assert_eq!(done.count, 4);
    assert!(!done.overflowed);
    assert_eq!(done.buffer, &[5, 10, 15, 20]);
    assert_eq!(adc.state(), DriverState::Idle);
}

#[test]
fn test_overflow_rides_on_done_event() {
    let mut buf = [0i16; 4];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    adc.on_interrupt();
    adc.peripheral_mut().inject_overflow();
    run_to_idle(&mut adc);
    match adc.poll_event() {
        Some(Event::Done { overflowed, .. }) => assert!(overflowed),
        other => panic!("expected Done, got {other:?}"),
    }
    assert_eq!(adc.stats().overflows, 1);
}

#[test]
fn test_hardware_scan_same_order_fewer_triggers() {
    let mut soft_buf = [0i16; 6];
    let mut hard_buf = [0i16; 6];

    let mut soft = engine(ScanCapability::SingleStep);
    let mut hard: Adc<SimAdc, HardwareScan> = Adc::new(
        SimAdc::new(ScanCapability::NativeScan),
        HardwareScan,
        AdcConfig::default(),
    );
    hard.init().unwrap();

    for n in [0u8, 1] {
        soft.enable_channel(ch(n), ChannelConfig::default()).unwrap();
        hard.enable_channel(ch(n), ChannelConfig::default()).unwrap();
    }
    soft.peripheral_mut().set_pattern(ch(0), Pattern::ramp(0, 10));
    soft.peripheral_mut().set_pattern(ch(1), Pattern::ramp(1, 10));
    hard.peripheral_mut().set_pattern(ch(0), Pattern::ramp(0, 10));
    hard.peripheral_mut().set_pattern(ch(1), Pattern::ramp(1, 10));

    soft.start_buffered(&mut soft_buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    run_to_idle(&mut soft);
    hard.start_buffered(&mut hard_buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    run_to_idle(&mut hard);

    let soft_done = match soft.poll_event() {
        Some(Event::Done { buffer, .. }) => buffer,
        other => panic!("expected Done, got {other:?}"),
    };
    let hard_done = match hard.poll_event() {
        Some(Event::Done { buffer, .. }) => buffer,
        other => panic!("expected Done, got {other:?}"),
    };
    // Identical externally observable order...
    assert_eq!(soft_done, hard_done);
    assert_eq!(soft_done, &[0, 1, 10, 11, 20, 21]);
    // ...at very different trigger cost: one per conversion vs one per pass
    assert_eq!(soft.peripheral().sample_triggers(), 6);
    assert_eq!(hard.peripheral().sample_triggers(), 3);
}

#[test]
fn test_disable_requires_idle_then_succeeds() {
    let mut buf = [0i16; 2];
    let mut adc = engine(ScanCapability::SingleStep);
    adc.enable_channel(ch(0), ChannelConfig::default()).unwrap();
    adc.start_buffered(&mut buf, ChannelSelect::All, CaptureMode::Continuous)
        .unwrap();
    assert_eq!(adc.disable_channel(ch(0)), Err(Error::InvalidState));
    adc.abort().unwrap();
    assert_eq!(adc.disable_channel(ch(0)), Ok(()));
    assert_eq!(adc.disable_channel(ch(0)), Err(Error::NotEnabled));
}
