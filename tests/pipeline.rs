use std::thread;
use std::time::{Duration, Instant};
use uwb_localization::processing::encode_frame;
use uwb_localization::{
    AnchorSet, ApiError, DistanceReading, LocalizationConfig, LocalizationSystem, MockTransceiver,
    Point2, ShutdownReason, SystemState, TagPosition, UwbState,
};

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn config(period_ms: u64, stale_cycle_limit: u32) -> LocalizationConfig {
    LocalizationConfig {
        estimation_period_ms: period_ms,
        stale_cycle_limit,
        ..Default::default()
    }
}

#[test]
fn frames_in_position_out() {
    let (transceiver, handle) = MockTransceiver::new();
    let mut system = LocalizationSystem::with_transceiver(config(1, 10_000), Box::new(transceiver)).unwrap();

    let anchors = [Point2::new(0.0, 0.0), Point2::new(6.0, 0.0), Point2::new(6.0, 4.0), Point2::new(0.0, 4.0)];
    assert_eq!(system.configure_anchors(&anchors), 4);
    system.start().unwrap();

    // Garbage on the line is skipped
    handle.push_line(b"DIST?\n".to_vec());

    let path = [Point2::new(1.0, 1.0), Point2::new(2.5, 1.5), Point2::new(4.0, 3.0)];
    for (i, tag) in path.iter().enumerate() {
        let reading = DistanceReading::from_geometry(system.anchors(), *tag, i as u8 + 1).unwrap();
        handle.push_reading(&reading);

        assert!(wait_for(|| system.get_position().tag_id == i as u8 + 1));
        let position = system.get_position();
        assert!((position.x - tag.x).abs() < 0.05, "x {} vs {}", position.x, tag.x);
        assert!((position.y - tag.y).abs() < 0.05, "y {} vs {}", position.y, tag.y);
    }

    let status = system.status();
    assert!(status.is_running());
    assert!(status.has_fix);
    assert_eq!(status.anchor_count, 4);
    assert_eq!(status.reader.frames_decoded, 3);
    assert_eq!(status.reader.frames_dropped, 1);

    system.stop();
    assert!(handle.is_closed());
    assert_eq!(system.state(), SystemState::Stopped(ShutdownReason::Requested));
}

#[test]
fn master_tag_frame_reports_tag_zero() {
    let (transceiver, handle) = MockTransceiver::new();
    let mut system = LocalizationSystem::with_transceiver(config(1, 10_000), Box::new(transceiver)).unwrap();
    system.configure_anchors(AnchorSet::default_layout().as_slice());

    let reading = DistanceReading::from_geometry(&AnchorSet::default_layout(), Point2::new(-1.5, 1.5), 0).unwrap();
    let frame = encode_frame(&reading);
    assert_eq!(frame[4], 0x0f);
    handle.push_line(frame.to_vec());

    system.start().unwrap();
    assert!(wait_for(|| system.has_fix()));

    let state = UwbState::from(system.get_position());
    assert_eq!(state.tag_id, 0);
    assert!((state.position_x + 1.5).abs() < 0.05);
    assert!((state.position_y - 1.5).abs() < 0.05);
}

#[test]
fn silent_sensor_shuts_down_once() {
    let (transceiver, handle) = MockTransceiver::new();
    let mut system = LocalizationSystem::with_transceiver(config(1, 25), Box::new(transceiver)).unwrap();
    system.configure_anchors(AnchorSet::default_layout().as_slice());

    let reading = DistanceReading::from_geometry(&AnchorSet::default_layout(), Point2::new(-2.0, 1.0), 5).unwrap();
    handle.push_reading(&reading);
    system.start().unwrap();

    assert!(wait_for(|| system.state() != SystemState::Running));
    assert_eq!(system.state(), SystemState::Stopped(ShutdownReason::SensorSilence));
    assert!(handle.is_closed());
    assert!(system.status().sensor_lost());
    assert_eq!(system.status().reader.frames_decoded, 1);

    // The last fix is still readable after shutdown
    let position = system.get_position();
    assert_eq!(position.tag_id, 5);
    assert!((position.x + 2.0).abs() < 0.05);

    system.stop();
    system.stop();
    assert_eq!(system.shutdown_count(), 1);
    assert_eq!(handle.close_count(), 1);
}

#[test]
fn too_few_anchors_is_rejected() {
    let (transceiver, _handle) = MockTransceiver::new();
    let mut system = LocalizationSystem::with_transceiver(config(10, 200), Box::new(transceiver)).unwrap();
    system.configure_anchors(&[Point2::new(0.0, 0.0), Point2::new(3.0, 0.0)]);

    assert!(matches!(
        system.start(),
        Err(ApiError::InsufficientAnchors { available: 2, required: 3 })
    ));
    assert!(!system.is_running());
    assert_eq!(system.get_position(), TagPosition::default());
}

#[test]
fn config_with_too_few_anchors_is_rejected() {
    let config = LocalizationConfig {
        anchors: vec![Point2::new(0.0, 0.0)],
        ..Default::default()
    };
    assert!(matches!(
        LocalizationSystem::new(config),
        Err(ApiError::Configuration(_))
    ));
}
