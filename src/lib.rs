//! Stagemix - Synchronized Stem Mixer
//!
//! Plays the stems of a song (click, guide, vocals, band) as one unit and
//! lets the operator:
//! - Mix every stem with volume, pan, mute, exclusive solo and a master bus
//! - Detect the click track's beats and accents
//! - Annotate the timeline with section markers and loop between them
//! - Jump live to a marker on the next strong beat, behind a countdown and a
//!   preview of the guide track
//!
//! # Architecture
//!
//! Everything runs on one virtual clock driven by
//! [`MixerEngine::advance`]. Audio output sits behind the
//! [`engine::AudioBackend`] trait; [`engine::SimulatedBackend`] is a
//! deterministic implementation for tests and offline rehearsal.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod markers;
pub mod mixer;
pub mod notice;
pub mod playback;
pub mod state;

pub use config::MixerConfig;
pub use error::{MixerError, Result};
pub use mixer::MixerEngine;
