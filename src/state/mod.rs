//! State Management Module
//!
//! Provides the persisted state schema, the project library, storage and
//! debounced autosave.

pub mod autosave;
pub mod library;
pub mod snapshot;
pub mod storage;

pub use autosave::Autosave;
pub use library::{scan_project_folder, Project, ProjectLibrary};
pub use snapshot::{MixerState, SavedProject, SavedTrack, DEFAULT_BPM, DEFAULT_ZOOM};
pub use storage::{JsonFileStore, MemoryStore, StateStore, STATE_FILE};
