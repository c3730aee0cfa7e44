//! Marker Jump Tests
//!
//! End-to-end jump and loop scenarios driven through the engine on the
//! simulated backend.

use std::time::Duration;

use approx::assert_relative_eq;
use stagemix::analysis::ClickBeat;
use stagemix::engine::{AudioSource, SimulatedBackend, TransportState};
use stagemix::markers::UserMarker;
use stagemix::notice::{Notice, NoticeLevel};
use stagemix::playback::{JumpActivation, JumpPhase};
use stagemix::state::{MixerState, SavedProject};
use stagemix::{MixerConfig, MixerEngine};

const FRAME: Duration = Duration::from_millis(10);

/// Click, guide and bass stems, guide loaded second
const CLICK: usize = 0;
const GUIDE: usize = 1;
const PREVIEW: usize = 3;

fn click_beats(times: &[f64], duration: f64) -> Vec<ClickBeat> {
    times
        .iter()
        .enumerate()
        .map(|(i, &time)| ClickBeat {
            time,
            number: i as u32 + 1,
            percentage: time / duration * 100.0,
            is_strong: i % 4 == 0,
        })
        .collect()
}

/// Beats every half second from 0.1s
fn regular_beats(count: usize) -> Vec<f64> {
    (0..count).map(|k| 0.1 + 0.5 * k as f64).collect()
}

fn marker(time: f64, name: &str) -> UserMarker {
    UserMarker {
        time,
        name: name.to_string(),
        beat_number: 0,
        percentage: time / 60.0 * 100.0,
        color: "#45B7D1".to_string(),
    }
}

fn engine(beats: &[f64], markers: Vec<UserMarker>) -> (MixerEngine, SimulatedBackend) {
    engine_with_backend(SimulatedBackend::new(), beats, markers)
}

fn engine_with_backend(
    backend: SimulatedBackend,
    beats: &[f64],
    markers: Vec<UserMarker>,
) -> (MixerEngine, SimulatedBackend) {
    engine_with_tracks(backend, &["Click", "Guia", "Bass"], beats, markers)
}

fn engine_with_tracks(
    backend: SimulatedBackend,
    names: &[&str],
    beats: &[f64],
    markers: Vec<UserMarker>,
) -> (MixerEngine, SimulatedBackend) {
    let mut sources = Vec::new();
    for &name in names {
        let url = format!("{}.wav", name);
        backend.add_source(url.clone(), 60.0);
        sources.push((name.to_string(), AudioSource::new(url)));
    }

    let mut project = SavedProject::new("Domingo");
    project.click_beats = click_beats(beats, 60.0);
    project.user_markers = markers;
    let mut state = MixerState::default();
    state.projects.push(project);

    let mut engine = MixerEngine::new(MixerConfig::default(), Box::new(backend.clone()));
    engine.restore(state);
    let index = engine.add_project("Domingo", sources);
    engine.load_project(index).unwrap();
    engine.drain_notices();
    (engine, backend)
}

fn run(engine: &mut MixerEngine, frames: usize) {
    for _ in 0..frames {
        engine.advance(FRAME);
    }
}

fn has_notice(notices: &[Notice], level: NoticeLevel, text: &str) -> bool {
    notices
        .iter()
        .any(|n| n.level == level && n.message.contains(text))
}

// === Preconditions ===

#[test]
fn test_insufficient_lead_in_is_rejected() {
    let (mut engine, _) = engine(&[0.1, 0.6, 1.1, 1.6, 2.1], vec![marker(1.6, "Coro 1")]);
    engine.play();

    let err = engine.activate_marker(0).unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_LEAD_IN");
    assert_eq!(engine.jump_phase(), JumpPhase::Idle);
    assert!(engine.pending_jump().is_none());

    let notices = engine.drain_notices();
    assert_eq!(notices.len(), 1);
    assert!(has_notice(&notices, NoticeLevel::Warning, "Coro 1"));
}

#[test]
fn test_no_beats_is_rejected() {
    let (mut engine, _) = engine(&[], vec![marker(20.1, "Coro 1")]);
    engine.play();

    let err = engine.activate_marker(0).unwrap_err();
    assert_eq!(err.error_code(), "NO_BEATS_DETECTED");
    assert!(has_notice(&engine.drain_notices(), NoticeLevel::Warning, ""));
}

#[test]
fn test_unknown_marker_index() {
    let (mut engine, _) = engine(&regular_beats(100), Vec::new());
    engine.play();
    let err = engine.activate_marker(0).unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_MARKER");
}

#[test]
fn test_not_playing_moves_directly_to_marker() {
    let (mut engine, backend) = engine(&regular_beats(100), vec![marker(20.1, "Coro 1")]);

    let activation = engine.activate_marker(0).unwrap();
    assert_eq!(activation, JumpActivation::Positioned { time: 20.1 });
    assert_eq!(engine.jump_phase(), JumpPhase::Idle);
    assert_relative_eq!(engine.current_time(), 20.1);
    assert!(backend.probes().iter().all(|p| p.position == 20.1));
    assert!(has_notice(
        &engine.drain_notices(),
        NoticeLevel::Success,
        "Position: Coro 1"
    ));
}

// === Scheduling ===

#[test]
fn test_waits_1800_ms_for_next_strong_beat() {
    let (mut engine, _) = engine(&regular_beats(40), vec![marker(3.0, "Coro 1")]);
    // 0.5% of 60s
    engine.seek(0.5);
    engine.play();
    assert_relative_eq!(engine.current_time(), 0.3, epsilon = 1e-9);

    match engine.activate_marker(0).unwrap() {
        JumpActivation::Scheduled { wait, strong_beat } => {
            assert_eq!(wait, Duration::from_millis(1800));
            assert_relative_eq!(strong_beat, 2.1, epsilon = 1e-9);
        }
        other => panic!("expected a scheduled jump, got {:?}", other),
    }
    assert_eq!(engine.jump_phase(), JumpPhase::WaitingForStrongBeat);
    assert!(has_notice(
        &engine.drain_notices(),
        NoticeLevel::Info,
        "strong beat"
    ));

    run(&mut engine, 179);
    assert_eq!(engine.jump_phase(), JumpPhase::WaitingForStrongBeat);
    run(&mut engine, 2);
    assert_eq!(engine.jump_phase(), JumpPhase::CountdownMasking);
}

#[test]
fn test_full_jump_masks_guide_and_lands_on_marker() {
    let (mut engine, backend) = engine(&regular_beats(100), vec![marker(20.1, "Coro 1")]);
    engine.play();
    run(&mut engine, 100);

    let activation = engine.activate_marker(0).unwrap();
    assert!(matches!(activation, JumpActivation::Scheduled { .. }));
    let pending = engine.pending_jump().unwrap();
    assert_relative_eq!(pending.preview_start, 18.1, epsilon = 1e-9);
    assert_relative_eq!(pending.beat_ms, 500.0, epsilon = 1e-6);

    // 1.5s after activation the countdown has been running for 0.4s
    run(&mut engine, 150);
    assert_eq!(engine.jump_phase(), JumpPhase::CountdownMasking);
    assert_eq!(engine.countdown_value(), Some(4));
    assert_eq!(backend.probe(GUIDE).unwrap().gain, 0.0);
    assert_relative_eq!(backend.probe(CLICK).unwrap().gain, 0.5625);

    let preview = backend.probe(PREVIEW).unwrap();
    assert_eq!(preview.url, "Guia.wav");
    assert_relative_eq!(preview.gain, 0.9);
    assert!(!preview.paused);
    assert!(preview.position > 18.1 && preview.position < 18.6);

    run(&mut engine, 300);
    assert_eq!(engine.jump_phase(), JumpPhase::Idle);
    assert_eq!(engine.completed_jumps(), 1);
    assert_eq!(engine.countdown_value(), None);
    assert!(engine.pending_jump().is_none());

    assert_relative_eq!(backend.probe(GUIDE).unwrap().gain, 0.5625);
    assert!(backend.probe(PREVIEW).unwrap().paused);
    assert_eq!(backend.element_count(), 4);
    for index in 0..3 {
        assert_eq!(backend.probe(index).unwrap().last_seek, Some(20.1));
    }
    assert!(engine.current_time() > 21.0 && engine.current_time() < 22.0);

    let notices = engine.drain_notices();
    assert!(has_notice(&notices, NoticeLevel::Success, "Jumped to Coro 1"));
}

#[test]
fn test_slow_seeks_still_complete() {
    let backend = SimulatedBackend::new().with_seek_latency(Duration::from_millis(300));
    let (mut engine, backend) =
        engine_with_backend(backend, &regular_beats(100), vec![marker(20.1, "Coro 1")]);
    engine.play();
    run(&mut engine, 100);

    engine.activate_marker(0).unwrap();
    run(&mut engine, 600);

    assert_eq!(engine.jump_phase(), JumpPhase::Idle);
    assert_eq!(engine.completed_jumps(), 1);
    assert_eq!(backend.probe(GUIDE).unwrap().last_seek, Some(20.1));
}

#[test]
fn test_click_named_guide_is_still_masked() {
    let (mut engine, backend) = engine_with_tracks(
        SimulatedBackend::new(),
        &["Click Guia", "Bass"],
        &regular_beats(100),
        vec![marker(20.1, "Coro 1")],
    );
    engine.play();
    run(&mut engine, 100);

    let activation = engine.activate_marker(0).unwrap();
    assert!(matches!(activation, JumpActivation::Scheduled { .. }));
    run(&mut engine, 150);
    assert_eq!(backend.probe(0).unwrap().gain, 0.0);
    assert_eq!(backend.probe(2).unwrap().url, "Click Guia.wav");

    run(&mut engine, 300);
    assert_eq!(engine.completed_jumps(), 1);
    assert_relative_eq!(backend.probe(0).unwrap().gain, 0.5625);
}

// === Cancellation ===

#[test]
fn test_cancel_restores_guide_and_hides_countdown() {
    let (mut engine, backend) = engine(&regular_beats(100), vec![marker(20.1, "Coro 1")]);
    engine.play();
    run(&mut engine, 100);
    engine.activate_marker(0).unwrap();
    run(&mut engine, 150);
    assert_eq!(backend.probe(GUIDE).unwrap().gain, 0.0);

    assert!(engine.cancel_jump());
    assert_eq!(engine.jump_phase(), JumpPhase::Cancelled);
    assert_eq!(engine.countdown_value(), None);
    assert_relative_eq!(backend.probe(GUIDE).unwrap().gain, 0.5625);
    assert!(backend.probe(PREVIEW).unwrap().paused);
    assert!(has_notice(
        &engine.drain_notices(),
        NoticeLevel::Info,
        "Jump cancelled"
    ));

    run(&mut engine, 300);
    assert_eq!(engine.jump_phase(), JumpPhase::Idle);
    assert_eq!(engine.completed_jumps(), 0);
    assert_ne!(backend.probe(GUIDE).unwrap().last_seek, Some(20.1));
    assert!(engine.current_time() < 10.0);
}

#[test]
fn test_cancel_while_waiting_on_slow_seeks() {
    let backend = SimulatedBackend::new().with_seek_latency(Duration::from_millis(300));
    let (mut engine, backend) =
        engine_with_backend(backend, &regular_beats(100), vec![marker(20.1, "Coro 1")]);
    engine.play();
    run(&mut engine, 100);
    engine.activate_marker(0).unwrap();

    // Seek issued at +3.05s, tracks still seeking until +3.35s
    run(&mut engine, 320);
    assert_eq!(engine.jump_phase(), JumpPhase::Finalizing);
    assert!(backend.probe(GUIDE).unwrap().seeking);
    engine.drain_notices();

    assert!(engine.cancel_jump());
    assert_eq!(engine.jump_phase(), JumpPhase::Cancelled);
    assert_eq!(engine.countdown_value(), None);
    assert_relative_eq!(backend.probe(GUIDE).unwrap().gain, 0.5625);
    assert!(backend.probe(PREVIEW).unwrap().paused);

    // The barrier opening later must not resume the jump
    run(&mut engine, 400);
    assert_eq!(engine.jump_phase(), JumpPhase::Idle);
    assert_eq!(engine.completed_jumps(), 0);
    assert!(engine.pending_jump().is_none());
    assert_relative_eq!(backend.probe(GUIDE).unwrap().gain, 0.5625);
    assert!(backend.probe(PREVIEW).unwrap().paused);
    assert_eq!(backend.element_count(), 4);

    let notices = engine.drain_notices();
    assert!(has_notice(&notices, NoticeLevel::Info, "Jump cancelled"));
    assert!(!has_notice(&notices, NoticeLevel::Success, "Jumped to"));
}

#[test]
fn test_cancel_with_nothing_pending() {
    let (mut engine, _) = engine(&regular_beats(100), vec![marker(20.1, "Coro 1")]);
    assert!(!engine.cancel_jump());
    assert!(engine.drain_notices().is_empty());
}

#[test]
fn test_stop_cancels_silently() {
    let (mut engine, _) = engine(&regular_beats(100), vec![marker(20.1, "Coro 1")]);
    engine.play();
    run(&mut engine, 10);
    engine.activate_marker(0).unwrap();
    engine.drain_notices();

    engine.stop();
    assert!(!engine.jump_phase().is_in_flight());
    assert!(engine.pending_jump().is_none());
    assert!(!has_notice(
        &engine.drain_notices(),
        NoticeLevel::Info,
        "Jump cancelled"
    ));
}

#[test]
fn test_superseding_jump_never_cross_completes() {
    let (mut engine, backend) = engine(
        &regular_beats(100),
        vec![marker(20.1, "Coro 1"), marker(30.1, "Puente 1")],
    );
    engine.play();
    run(&mut engine, 100);

    engine.activate_marker(0).unwrap();
    run(&mut engine, 50);
    engine.activate_marker(1).unwrap();
    assert_eq!(engine.pending_jump().unwrap().marker.name, "Puente 1");

    run(&mut engine, 400);
    assert_eq!(engine.jump_phase(), JumpPhase::Idle);
    assert_eq!(engine.completed_jumps(), 1);
    assert_eq!(backend.probe(GUIDE).unwrap().last_seek, Some(30.1));

    let notices = engine.drain_notices();
    assert!(has_notice(&notices, NoticeLevel::Success, "Jumped to Puente 1"));
    assert!(!has_notice(&notices, NoticeLevel::Success, "Jumped to Coro 1"));
    assert!(!has_notice(&notices, NoticeLevel::Info, "Jump cancelled"));
}

#[test]
fn test_rejected_activation_keeps_pending_jump() {
    let (mut engine, _) = engine(
        &regular_beats(100),
        vec![marker(20.1, "Coro 1"), marker(1.0, "Intro 1")],
    );
    engine.play();
    run(&mut engine, 100);

    engine.activate_marker(0).unwrap();
    assert!(engine.activate_marker(1).is_err());
    assert_eq!(engine.pending_jump().unwrap().marker.name, "Coro 1");

    run(&mut engine, 400);
    assert_eq!(engine.completed_jumps(), 1);
}

// === Loops ===

#[test]
fn test_loop_seeks_back_once_per_crossing() {
    let backend = SimulatedBackend::new().with_seek_latency(Duration::from_millis(40));
    let (mut engine, backend) = engine_with_backend(
        backend,
        &regular_beats(100),
        vec![marker(2.0, "Verso 1"), marker(4.0, "Coro 1")],
    );
    let active = engine.set_loop(0, 1).unwrap();
    assert_eq!((active.start_time, active.end_time), (2.0, 4.0));

    engine.seek(6.5);
    engine.play();
    run(&mut engine, 30);

    assert_eq!(engine.loop_crossings(), 1);
    for probe in backend.probes() {
        assert_eq!(probe.seeks, 2);
        assert_eq!(probe.last_seek, Some(2.0));
        assert!(!probe.paused);
    }
    assert!(engine.current_time() < 3.0);
}

#[test]
fn test_loop_stays_out_of_a_jump() {
    let (mut engine, backend) = engine(
        &regular_beats(100),
        vec![
            marker(2.0, "Verso 1"),
            marker(4.0, "Coro 1"),
            marker(20.1, "Puente 1"),
        ],
    );
    engine.set_loop(0, 1).unwrap();
    engine.play();
    run(&mut engine, 100);

    // Countdown runs 2.1s - 4.1s, across the loop end at 4.0s
    engine.activate_marker(2).unwrap();
    run(&mut engine, 300);
    assert_eq!(engine.jump_phase(), JumpPhase::CountdownMasking);
    assert!(engine.current_time() > 3.95);
    assert_eq!(engine.loop_crossings(), 0);

    // Landing outside the loop sends the playhead back to its start
    run(&mut engine, 100);
    assert_eq!(engine.completed_jumps(), 1);
    assert_eq!(engine.loop_crossings(), 1);
    assert_eq!(backend.probe(GUIDE).unwrap().last_seek, Some(2.0));
}

#[test]
fn test_loop_current_section_and_clear() {
    let (mut engine, _) = engine(
        &regular_beats(100),
        vec![marker(2.0, "Verso 1"), marker(4.0, "Coro 1"), marker(6.0, "Puente 1")],
    );
    engine.seek(5.0); // 3.0s
    let active = engine.loop_current_section().unwrap();
    assert_eq!((active.start_time, active.end_time), (2.0, 4.0));

    assert_eq!(engine.set_loop(0, 2).unwrap_err().error_code(), "INVALID_LOOP");
    assert_eq!(engine.active_loop().unwrap().end_time, 4.0);

    engine.clear_loop();
    assert!(engine.active_loop().is_none());
}

#[test]
fn test_loop_waits_for_playback() {
    let (mut engine, backend) = engine(
        &regular_beats(100),
        vec![marker(2.0, "Verso 1"), marker(4.0, "Coro 1")],
    );
    engine.set_loop(0, 1).unwrap();

    // Scrubbing past the loop end while stopped
    engine.seek(10.0); // 6.0s
    run(&mut engine, 50);
    assert_eq!(engine.transport_state(), TransportState::Stopped);
    assert_eq!(engine.loop_crossings(), 0);
    assert_relative_eq!(engine.current_time(), 6.0, epsilon = 1e-9);
    assert!(backend.probes().iter().all(|p| p.paused));

    engine.play();
    run(&mut engine, 5);
    assert_eq!(engine.loop_crossings(), 1);
    assert!(engine.current_time() < 3.0);

    // Scrubbing past it while paused
    engine.pause();
    engine.seek(10.0);
    run(&mut engine, 50);
    assert_eq!(engine.transport_state(), TransportState::Paused);
    assert_eq!(engine.loop_crossings(), 1);
    assert!(backend.probes().iter().all(|p| p.paused));
}

#[test]
fn test_removing_a_loop_bound_clears_the_loop() {
    let (mut engine, _) = engine(
        &regular_beats(100),
        vec![marker(2.0, "Verso 1"), marker(4.0, "Coro 1"), marker(6.0, "Puente 1")],
    );
    engine.set_loop(0, 1).unwrap();

    engine.remove_marker(2).unwrap();
    assert_eq!(engine.active_loop().unwrap().end_time, 4.0);

    engine.remove_marker(1).unwrap();
    assert!(engine.active_loop().is_none());

    // Playing through the old loop end no longer seeks back
    engine.seek(6.5); // 3.9s
    engine.play();
    run(&mut engine, 30);
    assert_eq!(engine.loop_crossings(), 0);
    assert!(engine.current_time() > 4.0);
}

#[test]
fn test_marker_inside_the_loop_clears_it() {
    let (mut engine, _) = engine(
        &regular_beats(100),
        vec![marker(2.0, "Verso 1"), marker(4.0, "Coro 1")],
    );
    engine.set_loop(0, 1).unwrap();

    engine.add_marker(marker(5.0, "Puente 1"));
    engine.add_marker(marker(4.0, "Coro 2"));
    assert_eq!(engine.active_loop().unwrap().start_time, 2.0);

    engine.add_marker(marker(3.0, "Pre Coro 1"));
    assert!(engine.active_loop().is_none());
}
