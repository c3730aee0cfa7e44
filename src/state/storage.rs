//! State storage
//!
//! Where the persisted [`MixerState`] lives. The engine only sees the
//! [`StateStore`] trait; the crate ships a JSON file store and an in-memory
//! store.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MixerError, Result};
use crate::state::snapshot::MixerState;

/// Default file name of the persisted state
pub const STATE_FILE: &str = "stagemix-state.json";

/// Load and save the persisted state
pub trait StateStore {
    /// Read the stored state; `None` when nothing was stored yet
    fn load(&self) -> Result<Option<MixerState>>;

    /// Replace the stored state
    fn save(&mut self, state: &MixerState) -> Result<()>;
}

/// Pretty-printed JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store [`STATE_FILE`] inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<MixerState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| MixerError::StateRead {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(Some(MixerState::from_json(&content)?))
    }

    fn save(&mut self, state: &MixerState) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| MixerError::StateWrite {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let content = state.to_json_pretty()?;

        fs::write(&self.path, content).map_err(|e| MixerError::StateWrite {
            path: self.path.clone(),
            source: e,
        })?;

        log::debug!("[STATE] Saved {} projects to {}", state.projects.len(), self.path.display());
        Ok(())
    }
}

/// Keeps the state in memory; counts writes
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Option<MixerState>,
    saves: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MixerState) -> Self {
        Self {
            state: Some(state),
            saves: 0,
        }
    }

    pub fn saves(&self) -> u32 {
        self.saves
    }

    pub fn state(&self) -> Option<&MixerState> {
        self.state.as_ref()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<MixerState>> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &MixerState) -> Result<()> {
        self.state = Some(state.clone());
        self.saves += 1;
        Ok(())
    }
}
