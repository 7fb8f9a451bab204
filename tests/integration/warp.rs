//! Warp integration tests
//!
//! Grid <-> audio mapping as seen through a session, and the JSON song
//! contract.

use approx::assert_relative_eq;
use gridsync::prelude::*;
use proptest::prelude::*;

use crate::helpers::tolerances::TIME_EPSILON;
use crate::helpers::*;

#[test]
fn test_half_tempo_section_stretches_audio() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session
        .set_tempo_changes(&[TempoChange::new(10.0, 60.0)])
        .unwrap();

    let tempo = session.tempo_snapshot();
    assert_relative_eq!(tempo.grid_to_audio(10.0), 10.0, epsilon = TIME_EPSILON);
    assert_relative_eq!(tempo.grid_to_audio(20.0), 30.0, epsilon = TIME_EPSILON);
    assert_relative_eq!(tempo.audio_to_grid(30.0), 20.0, epsilon = TIME_EPSILON);

    // Playback crosses the boundary at audio 10 and slows the grid.
    session.play();
    clock.advance(30.0);
    let state = session.tick_sync();
    assert_relative_eq!(state.grid_time, 20.0, epsilon = TIME_EPSILON);
    assert_eq!(state.tempo, 60.0);
}

#[test]
fn test_doubled_tempo_compresses_audio() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session
        .set_tempo_changes(&[TempoChange::new(0.0, 240.0)])
        .unwrap();

    let tempo = session.tempo_snapshot();
    assert_relative_eq!(tempo.grid_to_audio(10.0), 5.0, epsilon = TIME_EPSILON);
    assert_relative_eq!(tempo.audio_to_grid(5.0), 10.0, epsilon = TIME_EPSILON);
}

#[test]
fn test_unwarped_mapping_is_identity() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session
        .set_tempo_changes(&[TempoChange::new(10.0, 60.0)])
        .unwrap();
    session.set_warp_enabled(false);

    let tempo = session.tempo_snapshot();
    assert!(!tempo.warp().is_enabled());
    assert_eq!(tempo.grid_to_audio(20.0), 20.0);
    assert_eq!(tempo.audio_to_grid(30.0), 30.0);
    // The beat grid still follows the tempo changes.
    assert_eq!(tempo.resolver().tempo_at(15.0), 60.0);
}

#[test]
fn test_base_tempo_change_rescales() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session
        .set_tempo_changes(&[TempoChange::new(10.0, 120.0)])
        .unwrap();
    session.set_base_tempo(60.0);

    let tempo = session.tempo_snapshot();
    // Before the first change the base tempo applies at rate 1.
    assert_relative_eq!(tempo.grid_to_audio(10.0), 10.0, epsilon = TIME_EPSILON);
    // 120 against a 60 base plays twice as fast.
    assert_relative_eq!(tempo.grid_to_audio(20.0), 15.0, epsilon = TIME_EPSILON);
}

#[test]
fn test_invalid_tempo_change_leaves_map_untouched() {
    let clock = manual_clock();
    let session = test_session(&clock);
    session
        .set_tempo_changes(&[TempoChange::new(10.0, 60.0)])
        .unwrap();
    let before = session.tempo_snapshot().version();

    let err = session.set_tempo_changes(&[TempoChange::new(f64::NAN, 90.0)]);
    assert!(err.is_err());
    assert_eq!(session.tempo_snapshot().version(), before);
    assert_relative_eq!(
        session.tempo_snapshot().grid_to_audio(20.0),
        30.0,
        epsilon = TIME_EPSILON
    );
}

#[test]
fn test_song_json_contract() {
    let json = r#"{
        "tempo": 120,
        "duration": 95.5,
        "tempoChanges": [
            { "time": 0, "tempo": 120, "timeSignature": "4/4" },
            { "time": 16, "tempo": 90, "timeSignature": "7/8", "subdivision": "3+2+2" },
            {
                "time": 32, "tempo": 90, "timeSignature": "4/4", "hidden": true,
                "curve": { "type": "linear", "targetTempo": 140, "targetTime": 40 }
            }
        ]
    }"#;
    let song: Song = serde_json::from_str(json).unwrap();
    assert_eq!(song.tempo_changes.len(), 3);
    assert!(song.tempo_changes[2].hidden);

    let clock = manual_clock();
    let session = test_session(&clock);
    session.load_song(&song).unwrap();
    assert_eq!(session.duration(), 95.5);

    let tempo = session.tempo_snapshot();
    let info = tempo.at(20.0);
    assert_eq!(info.tempo, 90.0);
    assert_eq!(info.time_signature, TimeSignature::new(7, 8));
    assert_eq!(info.subdivision.map(|s| s.groups().to_vec()), Some(vec![3, 2, 2]));

    // Halfway through the curve.
    assert_relative_eq!(tempo.resolver().tempo_at(36.0), 115.0, epsilon = TIME_EPSILON);
}

#[test]
fn test_bad_time_signature_rejected_by_json() {
    let json = r#"{ "time": 0, "tempo": 120, "timeSignature": "4/3" }"#;
    assert!(serde_json::from_str::<TempoChange>(json).is_err());
}

proptest! {
    #[test]
    fn seek_reports_the_requested_grid_time(
        tempo_a in 40.0f64..240.0,
        tempo_b in 40.0f64..240.0,
        grid in 0.0f64..60.0,
    ) {
        let clock = manual_clock();
        let session = test_session(&clock);
        session
            .set_tempo_changes(&[TempoChange::new(0.0, tempo_a), TempoChange::new(20.0, tempo_b)])
            .unwrap();

        session.seek(grid);
        let state = session.state();
        prop_assert_eq!(state.grid_time, grid);
        let tempo = session.tempo_snapshot();
        prop_assert!((state.audio_time - tempo.grid_to_audio(grid)).abs() < TIME_EPSILON);
        prop_assert!((tempo.audio_to_grid(state.audio_time) - grid).abs() < 1e-6);
    }
}
