//! Multi-track sync integration tests
//!
//! Fake tracks stand still unless a test moves them, so every drift is
//! scripted.

use approx::assert_relative_eq;
use gridsync::prelude::*;
use gridsync::Error;

use crate::helpers::tolerances::TIME_EPSILON;
use crate::helpers::*;

#[test]
fn test_drift_above_threshold_is_corrected() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let track = FakeTrack::new();
    let id = session.add_track(track.boxed());

    session.play();
    clock.advance(1.0);
    track.drift_to(1.030);
    session.tick_sync();

    let seeks = track.state().seeks;
    assert_relative_eq!(*seeks.last().unwrap(), 1.0, epsilon = TIME_EPSILON);
    assert_eq!(session.track_status(id).unwrap().corrections, 1);
}

#[test]
fn test_drift_below_threshold_is_left_alone() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let track = FakeTrack::new();
    let id = session.add_track(track.boxed());

    session.play();
    let seeks_at_start = track.state().seeks.len();
    clock.advance(1.0);
    track.drift_to(1.010);
    session.tick_sync();

    assert_eq!(track.state().seeks.len(), seeks_at_start);
    assert_eq!(session.track_status(id).unwrap().corrections, 0);
}

#[test]
fn test_speed_change_updates_track_rates() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let track = FakeTrack::new();
    session.add_track(track.boxed());

    session.play();
    session.set_speed(80.0);
    clock.advance(0.5);
    track.drift_to(0.4);
    session.tick_sync();
    assert_eq!(track.state().rate, 0.8);

    // Within epsilon: no further rate writes.
    let writes = track.state().rate_sets;
    clock.advance(0.5);
    track.drift_to(0.8);
    session.tick_sync();
    assert_eq!(track.state().rate_sets, writes);
}

#[test]
fn test_failing_track_is_isolated() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let good = FakeTrack::new();
    let bad = FakeTrack::new();
    let good_id = session.add_track(good.boxed());
    let bad_id = session.add_track(bad.boxed());

    session.play();
    bad.fail_with(TrackError::Media("decoder underrun".into()));
    clock.advance(2.0);
    session.tick_sync();

    // The healthy track was still corrected and the clock kept running.
    assert_relative_eq!(
        *good.state().seeks.last().unwrap(),
        2.0,
        epsilon = TIME_EPSILON
    );
    assert!(session.is_playing());

    let status = session.track_status(bad_id).unwrap();
    assert!(status.faults >= 1);
    assert_eq!(
        status.last_error,
        Some(TrackError::Media("decoder underrun".into()))
    );
    assert_eq!(session.track_status(good_id).unwrap().faults, 0);

    // Recovery: the next tick corrects it like any other track.
    bad.recover();
    clock.advance(0.5);
    session.tick_sync();
    assert_relative_eq!(*bad.state().seeks.last().unwrap(), 2.5, epsilon = TIME_EPSILON);
}

#[test]
fn test_track_added_mid_playback_joins_at_clock_position() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session.play();
    clock.advance(3.0);

    let late = FakeTrack::new();
    session.add_track(late.boxed());
    let state = late.state();
    assert!(state.playing);
    assert_relative_eq!(*state.seeks.last().unwrap(), 3.0, epsilon = TIME_EPSILON);
}

#[test]
fn test_remove_track() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let track = FakeTrack::new();
    let id = session.add_track(track.boxed());
    session.play();

    let _handle = session.remove_track(id).unwrap();
    assert!(!track.state().playing);
    assert!(session.track_statuses().is_empty());

    match session.remove_track(id) {
        Err(gridsync::core::Error::UnknownTrack(missing)) => assert_eq!(missing, id),
        other => panic!("expected UnknownTrack, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_engine_surfaces_unknown_track() {
    let clock = manual_clock();
    let engine = test_engine(&clock);
    let id = engine.add_track(FakeTrack::new().boxed());
    engine.remove_track(id).unwrap();
    assert!(matches!(
        engine.track_status(id),
        Err(Error::Core(gridsync::core::Error::UnknownTrack(_)))
    ));
}
