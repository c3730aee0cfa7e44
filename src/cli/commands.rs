//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::analysis::{detect_beats_from_wav, BeatGrid, DetectorOptions};
use crate::config::MixerConfig;
use crate::engine::SimulatedBackend;
use crate::error::Result;
use crate::mixer::MixerEngine;
use crate::playback::{JumpActivation, JumpPhase};
use crate::state::{scan_project_folder, JsonFileStore, StateStore};

/// Frame length used when rehearsing (60 Hz)
const FRAME: Duration = Duration::from_micros(16_667);

/// Give up on a rehearsal jump after this long
const REHEARSAL_LIMIT: Duration = Duration::from_secs(30);

/// Detect and print the beats of a WAV click track.
pub fn detect(path: &Path, threshold: Option<f32>, json: bool) -> Result<()> {
    info!("Detecting beats: {}", path.display());

    let mut opts = DetectorOptions::default();
    if let Some(threshold) = threshold {
        opts.threshold = threshold;
    }

    let beats = detect_beats_from_wav(path, 0.0, &opts)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&beats)?);
        return Ok(());
    }

    let grid = BeatGrid::new(beats);
    println!("Beats: {}", grid.len());
    if let Some(bpm) = grid.estimated_bpm() {
        println!("Tempo: ~{:.1} BPM", bpm);
    }
    println!("{:-<40}", "");
    for beat in grid.beats() {
        println!(
            "{:>5}  {:>9.3}s  {:>6.2}%{}",
            beat.number,
            beat.time,
            beat.percentage,
            if beat.is_strong { "  *" } else { "" }
        );
    }

    Ok(())
}

/// Summarize a saved state file.
pub fn inspect(path: &Path) -> Result<()> {
    info!("Inspecting state: {}", path.display());

    let store = JsonFileStore::new(path);
    let Some(state) = store.load()? else {
        println!("No state at {}", path.display());
        return Ok(());
    };

    println!("Master volume: {}", state.master_volume);
    println!("Projects: {}", state.projects.len());
    for project in &state.projects {
        println!("{:-<60}", "");
        println!("{}", project.name);
        println!(
            "  beats: {}  markers: {}  count: {}  zoom: {}",
            project.click_beats.len(),
            project.user_markers.len(),
            project.count_beats,
            project.zoom_level
        );
        for track in &project.tracks {
            println!(
                "  {:<20} vol {:>5.1}  pan {:>6.1}{}",
                track.name,
                track.volume,
                track.pan,
                if track.muted { "  muted" } else { "" }
            );
        }
        for marker in &project.user_markers {
            println!("  @ {:>8.3}s  {}", marker.time, marker.name);
        }
    }
    if !state.custom_marker_types.is_empty() {
        println!("{:-<60}", "");
        println!("Custom marker types:");
        for (name, color) in &state.custom_marker_types {
            println!("  {:<20} {}", name, color);
        }
    }

    Ok(())
}

/// Settings of a rehearsal run
#[derive(Debug, Clone)]
pub struct RehearseOptions {
    pub folder: PathBuf,
    pub marker: String,
    pub beat: u32,
    pub start: f64,
    pub after: f64,
    pub count: u32,
    pub state: Option<PathBuf>,
}

/// Play the WAV stems of a folder on the simulated backend and jump to a
/// marker, printing what the operator would see.
pub fn rehearse(opts: &RehearseOptions) -> Result<()> {
    info!("Rehearsing jump to '{}' in {}", opts.marker, opts.folder.display());

    let backend = SimulatedBackend::new();
    let mut sources = Vec::new();
    for (name, source) in scan_project_folder(&opts.folder)? {
        match backend.add_wav_source(Path::new(&source.url)) {
            Ok(source) => sources.push((name, source)),
            Err(e) => warn!("Skipping '{}': {}", name, e),
        }
    }

    let mut engine = MixerEngine::new(MixerConfig::default(), Box::new(backend));
    if let Some(path) = &opts.state {
        engine = engine.with_store(Box::new(JsonFileStore::new(path)));
        engine.restore_from_store()?;
    }

    let project_name = opts
        .folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Rehearsal".to_string());
    let index = engine.add_project(&project_name, sources);
    let loaded = engine.load_project(index)?;
    println!("Loaded '{}' with {} tracks", project_name, loaded);

    engine.set_count_beats(opts.count)?;
    if engine.beats().is_empty() {
        engine.automate_mix()?;
    }

    let found = engine.markers().iter().position(|m| m.name == opts.marker);
    let marker_index = match found {
        Some(index) => index,
        None => {
            engine.add_marker_from_beat(opts.beat, &opts.marker)?;
            engine.markers().len() - 1
        }
    };

    if opts.start > 0.0 && engine.duration() > 0.0 {
        engine.seek(opts.start / engine.duration() * 100.0);
    }
    engine.play();

    let trigger = engine.now() + Duration::from_secs_f64(opts.after.max(0.0).min(3600.0));
    while engine.now() < trigger {
        engine.advance(FRAME);
    }
    print_notices(&mut engine);

    match engine.activate_marker(marker_index) {
        Ok(JumpActivation::Scheduled { wait, strong_beat }) => println!(
            "{:>8.3}s  jump scheduled, strong beat {:.3}s in {} ms",
            engine.current_time(),
            strong_beat,
            wait.as_millis()
        ),
        Ok(JumpActivation::Positioned { time }) => println!("Positioned at {:.3}s", time),
        Err(e) => {
            print_notices(&mut engine);
            engine.shutdown();
            return Err(e);
        }
    }

    let deadline = engine.now() + REHEARSAL_LIMIT;
    let mut shown = None;
    while engine.jump_phase().is_in_flight() && engine.now() < deadline {
        engine.advance(FRAME);
        let countdown = engine.countdown_value();
        if countdown != shown {
            if let Some(value) = countdown {
                println!("{:>8.3}s  {}", engine.current_time(), value);
            }
            shown = countdown;
        }
        print_notices(&mut engine);
    }

    if engine.jump_phase() != JumpPhase::Idle {
        warn!("Jump still {} after {:?}", engine.jump_phase(), REHEARSAL_LIMIT);
    }
    println!("Playhead: {:.3}s", engine.current_time());

    engine.shutdown();
    print_notices(&mut engine);
    Ok(())
}

fn print_notices(engine: &mut MixerEngine) {
    for notice in engine.drain_notices() {
        println!("          {}", notice);
    }
}
