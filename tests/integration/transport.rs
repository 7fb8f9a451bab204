//! Transport integration tests
//!
//! Play/pause/stop, seeking, speed, looping, and end of media, all on a
//! manual clock.

use approx::assert_relative_eq;
use gridsync::core::AnchorReason;
use gridsync::prelude::*;

use crate::helpers::tolerances::TIME_EPSILON;
use crate::helpers::*;

#[test]
fn test_play_pause_resume_stop() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let track = FakeTrack::new();
    session.add_track(track.boxed());

    session.play();
    assert!(session.is_playing());
    assert!(track.state().playing);

    clock.advance(1.0);
    assert_relative_eq!(session.tick_sync().audio_time, 1.0, epsilon = TIME_EPSILON);

    session.pause();
    assert!(!track.state().playing);
    clock.advance(3.0);
    assert_relative_eq!(session.audio_time(), 1.0, epsilon = TIME_EPSILON);

    // Resume from where we paused.
    session.play();
    clock.advance(0.5);
    assert_relative_eq!(session.audio_time(), 1.5, epsilon = TIME_EPSILON);

    session.stop();
    assert_eq!(session.motion(), MotionState::Stopped);
    assert_eq!(session.audio_time(), 0.0);
    assert_eq!(track.state().seeks.last().copied(), Some(0.0));
    assert!(!track.state().playing);
}

#[test]
fn test_seek_clamps_to_song_end_in_grid_time() {
    let clock = manual_clock();
    let session = test_session(&clock);
    // 30 audio seconds; the half-tempo section makes that grid 20.
    let song = Song::new(120.0, 30.0).with_tempo_changes(vec![TempoChange::new(10.0, 60.0)]);
    session.load_song(&song).unwrap();

    session.seek(100.0);
    let state = session.state();
    assert_eq!(state.grid_time, 20.0);
    assert_relative_eq!(state.audio_time, 30.0, epsilon = TIME_EPSILON);

    session.seek(15.0);
    assert_relative_eq!(session.audio_time(), 20.0, epsilon = TIME_EPSILON);

    session.seek(-5.0);
    assert_eq!(session.state().grid_time, 0.0);
}

#[test]
fn test_seek_while_playing_moves_tracks() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let track = FakeTrack::new();
    session.add_track(track.boxed());

    session.play();
    clock.advance(2.0);
    session.seek(10.0);

    assert_eq!(session.clock_state().reason, AnchorReason::Seek);
    assert_eq!(track.state().seeks.last().copied(), Some(10.0));
    clock.advance(1.0);
    assert_relative_eq!(session.tick_sync().grid_time, 11.0, epsilon = TIME_EPSILON);
}

#[test]
fn test_end_of_media_stops_and_rewinds() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let track = FakeTrack::new();
    session.add_track(track.boxed());
    session.load_song(&Song::new(120.0, 2.0)).unwrap();

    session.play();
    run_for(&clock, &session, 2.1, 0.05);

    let state = session.state();
    assert_eq!(state.motion, MotionState::Stopped);
    assert!(!state.is_playing);
    assert_eq!(state.audio_time, 0.0);
    assert_eq!(session.audio_time(), 0.0);
    assert!(!track.state().playing);
    assert_eq!(track.state().seeks.last().copied(), Some(0.0));
}

#[test]
fn test_speed_scales_audio_time() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session.play();
    clock.advance(1.0);

    session.set_speed(150.0);
    assert_eq!(session.clock_state().reason, AnchorReason::Speed);
    clock.advance(2.0);
    assert_relative_eq!(session.audio_time(), 4.0, epsilon = TIME_EPSILON);

    // Clamped to the configured range.
    session.set_speed(10.0);
    assert_eq!(session.speed_percent(), 50.0);
    assert_eq!(session.state().speed_percent, 50.0);
}

#[test]
fn test_loop_wrap_is_exact_and_restarts_beats() {
    let clock = manual_clock();
    let (session, clicks) = clicking_session(&clock);
    // Grid 6 sits in the half-tempo section: audio 8.
    session
        .set_tempo_changes(&[TempoChange::new(4.0, 60.0)])
        .unwrap();
    session.set_loop(LoopRange::new(2.0, 6.0)).unwrap();
    session.play();

    let mut previous = 0.0;
    let wrapped = loop {
        clock.advance(0.01);
        session.tick_scheduler();
        let state = session.tick_sync();
        if state.grid_time < previous {
            break state;
        }
        previous = state.grid_time;
        assert!(previous < 7.0, "loop never wrapped");
    };

    assert_eq!(wrapped.grid_time, 2.0);
    assert_eq!(wrapped.audio_time, 2.0);
    assert!(wrapped.is_playing);
    assert!(wrapped.loop_enabled);
    assert_eq!(session.clock_state().reason, AnchorReason::LoopWrap);

    run_for(&clock, &session, 1.0, 0.01);

    let beats: Vec<i64> = drain(&clicks).iter().map(|c| c.beat_index).collect();
    // First pass: 120 BPM to grid 4 (beats 0..=8), 60 BPM after (beat 9 at
    // grid 5). Beat 10 is the loop end and never sounds.
    assert_eq!(&beats[..10], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert!(!beats.contains(&10));
    // Second pass starts over at the loop start.
    assert_eq!(&beats[10..13], &[4, 5, 6]);
}

#[test]
fn test_invalid_loop_rejected() {
    let clock = manual_clock();
    let session = test_session(&clock);
    assert!(session.set_loop(LoopRange::new(5.0, 5.0)).is_err());
    assert!(session.set_loop(LoopRange::new(-1.0, 5.0)).is_err());
    assert!(!session.loop_range().enabled);
}

#[test]
fn test_open_loop_wraps_at_media_end() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session.load_song(&Song::new(120.0, 3.0)).unwrap();
    session
        .set_loop(LoopRange {
            enabled: true,
            start: Some(1.0),
            end: None,
        })
        .unwrap();

    session.play();
    run_for(&clock, &session, 3.5, 0.05);

    // Still playing: the loop wrapped instead of hitting end of media.
    assert!(session.is_playing());
    assert!(session.audio_time() < 3.0);
}

#[test]
fn test_subscribers_get_published_states() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let rx = session.subscribe(16);

    session.play();
    clock.advance(0.25);
    session.tick_sync();
    session.pause();

    let states: Vec<PlaybackState> = rx.try_iter().collect();
    assert_eq!(states.len(), 3);
    assert_eq!(states[0].motion, MotionState::Playing);
    assert_relative_eq!(states[1].grid_time, 0.25, epsilon = TIME_EPSILON);
    assert_eq!(states[2].motion, MotionState::Paused);
}

#[test]
fn test_dropped_subscriber_is_pruned() {
    let clock = manual_clock();
    let session = test_session(&clock);
    drop(session.subscribe(1));
    session.play();
    let rx = session.subscribe(1);
    session.tick_sync();
    assert_eq!(rx.len(), 1);
}

#[test]
fn test_stop_while_stopped_rewinds_a_seek() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let track = FakeTrack::new();
    session.add_track(track.boxed());
    session.load_song(&Song::new(120.0, 60.0)).unwrap();

    session.seek(40.0);
    assert_relative_eq!(session.audio_time(), 40.0, epsilon = TIME_EPSILON);

    session.stop();
    assert_eq!(session.motion(), MotionState::Stopped);
    assert_eq!(session.audio_time(), 0.0);
    assert_eq!(session.state().grid_time, 0.0);
    assert_eq!(session.clock_state().reason, AnchorReason::Stop);
    assert_eq!(track.state().seeks.last().copied(), Some(0.0));
}

#[test]
fn test_stop_from_paused_after_seek_rewinds() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session.load_song(&Song::new(120.0, 60.0)).unwrap();

    session.play();
    clock.advance(1.0);
    session.pause();
    session.seek(20.0);
    session.stop();
    assert_eq!(session.audio_time(), 0.0);

    // The next play starts from the top.
    session.play();
    clock.advance(0.5);
    assert_relative_eq!(session.tick_sync().audio_time, 0.5, epsilon = TIME_EPSILON);
}

#[test]
fn test_loading_a_shorter_song_rewinds() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let track = FakeTrack::new();
    session.add_track(track.boxed());
    session.load_song(&Song::new(120.0, 60.0)).unwrap();
    session.seek(40.0);

    session.load_song(&Song::new(120.0, 10.0)).unwrap();
    assert_eq!(session.audio_time(), 0.0);
    assert_eq!(track.state().seeks.last().copied(), Some(0.0));

    // Playback is inside the new song, not at its end.
    session.play();
    clock.advance(1.0);
    let state = session.tick_sync();
    assert!(state.is_playing);
    assert_relative_eq!(state.audio_time, 1.0, epsilon = TIME_EPSILON);
}

#[test]
fn test_loop_past_media_end_plays_to_end() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session.load_song(&Song::new(120.0, 30.0)).unwrap();
    session.set_loop(LoopRange::new(40.0, 50.0)).unwrap();

    session.seek(29.0);
    session.play();
    run_for(&clock, &session, 2.0, 0.05);

    let state = session.state();
    assert_eq!(state.motion, MotionState::Stopped);
    assert_eq!(state.audio_time, 0.0);
    assert_ne!(session.clock_state().reason, AnchorReason::LoopWrap);
}

#[test]
fn test_set_loop_publishes() {
    let clock = manual_clock();
    let session = test_session(&clock);
    let rx = session.subscribe(4);

    session.set_loop(LoopRange::new(2.0, 6.0)).unwrap();
    assert!(rx.try_recv().unwrap().loop_enabled);
    assert!(session.state().loop_enabled);
}
