//! Scheduler integration tests
//!
//! Clicks are collected from a channel sink while the manual clock advances
//! in scheduler-interval steps.

use approx::assert_relative_eq;
use gridsync::core::{Accent, AudioClockSource};
use gridsync::prelude::*;

use crate::helpers::tolerances::{CURVE_EPSILON, TIME_EPSILON};
use crate::helpers::*;

const STEP: f64 = 0.025;

fn indices(clicks: &[ClickEvent]) -> Vec<i64> {
    clicks.iter().map(|c| c.beat_index).collect()
}

#[test]
fn test_clicks_are_unique_and_on_time_at_180_bpm() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session.set_base_tempo(180.0);

    session.play();
    run_for(&clock, &session, 10.0, STEP);

    let clicks = drain(&rx);
    // 3 beats per second, 200 ms lookahead past the 10 s mark.
    assert_eq!(indices(&clicks), (0..=30).collect::<Vec<_>>());
    for click in &clicks {
        let expected = HW_START + click.beat_index as f64 / 3.0;
        assert_relative_eq!(click.time, expected, epsilon = TIME_EPSILON);
    }
    assert_eq!(session.dropped_late_beats(), 0);
}

#[test]
fn test_clicks_arrive_ahead_of_time() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session.play();
    drain(&rx);

    for _ in 0..200 {
        clock.advance(STEP);
        session.tick_scheduler();
        let now = clock.now();
        for click in rx.try_iter() {
            assert!(click.time >= now - 0.002);
            assert!(click.time < now + 0.2);
        }
    }
}

#[test]
fn test_compound_meter_accents() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session
        .set_tempo_changes(&[
            TempoChange::new(0.0, 120.0).with_time_signature(TimeSignature::new(6, 8))
        ])
        .unwrap();

    session.play();
    run_for(&clock, &session, 2.9, STEP);

    let clicks = drain(&rx);
    let accents: Vec<Accent> = clicks.iter().take(6).map(|c| c.accent).collect();
    assert_eq!(
        accents,
        vec![
            Accent::Downbeat,
            Accent::Subdivision,
            Accent::Subdivision,
            Accent::Beat,
            Accent::Subdivision,
            Accent::Subdivision,
        ]
    );
    // Second bar starts over.
    assert_eq!(clicks[6].bar, 2);
    assert_eq!(clicks[6].accent, Accent::Downbeat);
    assert_eq!(clicks[3].beat_number, 2);
}

#[test]
fn test_macro_mode_clicks_main_beats_only() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session.set_metronome_mode(MetronomeMode::Macro);
    session
        .set_tempo_changes(&[
            TempoChange::new(0.0, 120.0).with_time_signature(TimeSignature::new(6, 8))
        ])
        .unwrap();

    session.play();
    run_for(&clock, &session, 2.9, STEP);

    // Pulses 0..=6 are due; only 0, 3, and 6 are main beats.
    assert_eq!(indices(&drain(&rx)), vec![0, 3, 6]);
}

#[test]
fn test_irregular_meter_strong_beats() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session
        .set_tempo_changes(&[TempoChange::new(0.0, 120.0)
            .with_time_signature(TimeSignature::new(7, 8))
            .with_subdivision(Subdivision::parse("3+2+2").unwrap())])
        .unwrap();

    session.play();
    run_for(&clock, &session, 3.3, STEP);

    let clicks = drain(&rx);
    let strong: Vec<u32> = clicks
        .iter()
        .take(7)
        .enumerate()
        .filter(|(_, c)| c.is_strong_beat)
        .map(|(i, _)| i as u32)
        .collect();
    assert_eq!(strong, vec![0, 3, 5]);
    assert_eq!(clicks[5].accent, Accent::Beat);
    assert_eq!(clicks[5].beat_number, 3);
    assert_eq!(clicks[7].bar, 2);
}

#[test]
fn test_disabled_metronome_still_tracks_beats() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session.set_metronome_enabled(false);

    session.play();
    run_for(&clock, &session, 1.0, STEP);

    assert!(drain(&rx).is_empty());
    assert!(session.scheduled_beat_count() > 0);

    // Turning it back on mid-playback never replays past beats.
    session.set_metronome_enabled(true);
    run_for(&clock, &session, 1.0, STEP);
    let clicks = drain(&rx);
    assert!(!clicks.is_empty());
    assert!(clicks[0].beat_index >= 3);
}

#[test]
fn test_tempo_edit_realigns_next_click() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session.play();
    run_for(&clock, &session, 1.0, STEP);
    drain(&rx);

    // Audio 1.0 is grid 0.5 under 60 BPM from the top; the next beat is
    // grid 1.0, audio 2.0, one hardware second away.
    session
        .set_tempo_changes(&[TempoChange::new(0.0, 60.0)])
        .unwrap();
    run_for(&clock, &session, 1.5, STEP);

    let clicks = drain(&rx);
    assert_eq!(clicks[0].beat_index, 1);
    assert_relative_eq!(clicks[0].time, HW_START + 2.0, epsilon = TIME_EPSILON);
}

#[test]
fn test_speed_change_never_duplicates() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session.play();
    run_for(&clock, &session, 1.0, STEP);
    session.set_speed(150.0);
    run_for(&clock, &session, 2.0, STEP);

    // Audio reached 4.0; lookahead adds 0.3 audio seconds at 150%.
    assert_eq!(indices(&drain(&rx)), (0..=8).collect::<Vec<_>>());
}

#[test]
fn test_late_beats_are_dropped_not_fired() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session.play();

    // The scheduler stalls for a second.
    clock.advance(1.0);
    session.tick_scheduler();

    let clicks = drain(&rx);
    assert_eq!(indices(&clicks), vec![0, 2]);
    assert_eq!(session.dropped_late_beats(), 1);
    assert_relative_eq!(clicks[1].time, HW_START + 1.0, epsilon = TIME_EPSILON);
}

#[test]
fn test_accelerando_shortens_intervals() {
    let clock = manual_clock();
    let (session, rx) = clicking_session(&clock);
    session
        .set_tempo_changes(&[
            TempoChange::new(0.0, 60.0).with_curve(CurveKind::Linear, 120.0, 8.0)
        ])
        .unwrap();

    session.play();
    run_for(&clock, &session, 12.0, STEP);

    let times: Vec<f64> = drain(&rx).iter().map(|c| c.time).collect();
    assert!(times.len() >= 5);
    let intervals: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    for pair in intervals.windows(2) {
        assert!(pair[1] < pair[0] + CURVE_EPSILON, "{intervals:?}");
    }
    assert!(intervals[intervals.len() - 1] < intervals[0]);
}

#[test]
fn test_scheduled_set_stays_bounded() {
    let clock = manual_clock();
    let (session, _rx) = clicking_session(&clock);
    session.set_base_tempo(300.0);
    session.play();
    run_for(&clock, &session, 30.0, STEP);
    assert!(session.scheduled_beat_count() <= 100);
}
