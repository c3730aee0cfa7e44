//! CLI Module
//!
//! Command-line interface for offline work with stems: beat detection,
//! state inspection and a simulated marker-jump rehearsal.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stagemix - synchronized stem mixer
#[derive(Parser, Debug)]
#[command(name = "stagemix")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect the beats of a WAV click track
    #[command(name = "detect")]
    Detect {
        /// Click track (WAV)
        path: PathBuf,

        /// Peak threshold (absolute amplitude)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Print the beat list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a saved state file
    #[command(name = "inspect")]
    Inspect {
        /// State file written by autosave or export
        path: PathBuf,
    },

    /// Rehearse a marker jump over the WAV stems of a folder
    #[command(name = "rehearse")]
    Rehearse {
        /// Folder holding the stems
        folder: PathBuf,

        /// Marker type to jump to (e.g. "Coro 1")
        #[arg(short, long, default_value = "Coro 1")]
        marker: String,

        /// Beat the marker is placed on when the project has no such marker
        #[arg(short, long, default_value_t = 33)]
        beat: u32,

        /// Playback start (seconds)
        #[arg(long, default_value_t = 0.0)]
        start: f64,

        /// Seconds of playback before the jump is triggered
        #[arg(long, default_value_t = 1.0)]
        after: f64,

        /// Countdown beats
        #[arg(short, long, default_value_t = 4)]
        count: u32,

        /// State file to restore from and save to
        #[arg(short, long)]
        state: Option<PathBuf>,
    },
}
