//! Project Library
//!
//! The ordered list of projects the operator switches between. A project is
//! its audio sources plus the [`SavedProject`] settings restored on load.
//! Projects restored from storage have no sources until the same name is
//! ingested again.

use std::fs;
use std::path::Path;

use crate::engine::{display_name, AudioSource};
use crate::error::{MixerError, Result};
use crate::state::snapshot::{MixerState, SavedProject};

/// One project: display-named sources and remembered settings
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    /// `(display name, source)` in track order
    pub sources: Vec<(String, AudioSource)>,
    pub saved: SavedProject,
}

impl Project {
    pub fn new(name: impl Into<String>, sources: Vec<(String, AudioSource)>) -> Self {
        let name = name.into();
        Self {
            saved: SavedProject::new(name.clone()),
            name,
            sources,
        }
    }

    fn restored(saved: SavedProject) -> Self {
        Self {
            name: saved.name.clone(),
            sources: Vec::new(),
            saved,
        }
    }
}

/// Ordered projects plus the currently loaded one
#[derive(Debug, Clone, Default)]
pub struct ProjectLibrary {
    projects: Vec<Project>,
    current: Option<usize>,
}

impl ProjectLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the library from persisted state; nothing is current
    pub fn from_state(state: &MixerState) -> Self {
        Self {
            projects: state
                .projects
                .iter()
                .cloned()
                .map(Project::restored)
                .collect(),
            current: None,
        }
    }

    /// Saved settings of every project, in order
    pub fn saved_projects(&self) -> Vec<SavedProject> {
        self.projects.iter().map(|p| p.saved.clone()).collect()
    }

    /// Add a project, or re-attach sources to the project with the same name
    ///
    /// Returns the project's index.
    pub fn add_project(&mut self, name: &str, sources: Vec<(String, AudioSource)>) -> usize {
        if let Some(index) = self.projects.iter().position(|p| p.name == name) {
            self.projects[index].sources = sources;
            log::info!("[PROJECTS] Re-attached {} sources to '{}'", self.projects[index].sources.len(), name);
            return index;
        }
        self.projects.push(Project::new(name, sources));
        log::info!("[PROJECTS] Added '{}'", name);
        self.projects.len() - 1
    }

    /// Remove a project
    ///
    /// Returns the index of the project that must be loaded next when the
    /// current project was the one deleted and others remain.
    ///
    /// # Errors
    /// * `UnknownProject` - If `index` is out of range
    pub fn delete_project(&mut self, index: usize) -> Result<Option<usize>> {
        if index >= self.projects.len() {
            return Err(MixerError::UnknownProject { index });
        }
        let removed = self.projects.remove(index);
        log::info!("[PROJECTS] Deleted '{}'", removed.name);

        match self.current {
            Some(current) if current == index => {
                if self.projects.is_empty() {
                    self.current = None;
                    Ok(None)
                } else {
                    let next = index.min(self.projects.len() - 1);
                    self.current = Some(next);
                    Ok(Some(next))
                }
            }
            Some(current) if current > index => {
                self.current = Some(current - 1);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    pub fn set_current(&mut self, index: usize) -> Result<&Project> {
        let project = self
            .projects
            .get(index)
            .ok_or(MixerError::UnknownProject { index })?;
        self.current = Some(index);
        Ok(project)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&Project> {
        self.projects.get(self.current?)
    }

    pub fn current_mut(&mut self) -> Option<&mut Project> {
        let index = self.current?;
        self.projects.get_mut(index)
    }

    pub fn get(&self, index: usize) -> Option<&Project> {
        self.projects.get(index)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter()
    }
}

/// List the `.mp3` / `.wav` files of a folder as project sources
///
/// Files are sorted by file name; display names have the extension stripped.
///
/// # Errors
/// * `Io` - If the folder cannot be read
pub fn scan_project_folder(dir: &Path) -> Result<Vec<(String, AudioSource)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_audio = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mp3") || e.eq_ignore_ascii_case("wav"));
        if is_audio {
            files.push(path);
        }
    }
    files.sort();

    Ok(files
        .iter()
        .filter_map(|path| {
            let file_name = path.file_name()?.to_string_lossy();
            Some((display_name(&file_name), AudioSource::from_path(path)))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sources(names: &[&str]) -> Vec<(String, AudioSource)> {
        names
            .iter()
            .map(|n| (n.to_string(), AudioSource::new(format!("{}.wav", n))))
            .collect()
    }

    fn library(names: &[&str]) -> ProjectLibrary {
        let mut lib = ProjectLibrary::new();
        for name in names {
            lib.add_project(name, sources(&["Click"]));
        }
        lib
    }

    #[test]
    fn test_add_merges_by_name() {
        let mut state = MixerState::default();
        let mut saved = SavedProject::new("Domingo");
        saved.count_beats = 8;
        state.projects.push(saved);

        let mut lib = ProjectLibrary::from_state(&state);
        assert!(lib.get(0).unwrap().sources.is_empty());

        let index = lib.add_project("Domingo", sources(&["Click", "Guia"]));
        assert_eq!(index, 0);
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.get(0).unwrap().sources.len(), 2);
        assert_eq!(lib.get(0).unwrap().saved.count_beats, 8);

        assert_eq!(lib.add_project("Ensayo", Vec::new()), 1);
    }

    #[test]
    fn test_delete_current_reloads_neighbour() {
        let mut lib = library(&["A", "B", "C"]);
        lib.set_current(2).unwrap();

        assert_eq!(lib.delete_project(2).unwrap(), Some(1));
        assert_eq!(lib.current().unwrap().name, "B");

        assert_eq!(lib.delete_project(0).unwrap(), None);
        assert_eq!(lib.current_index(), Some(0));
        assert_eq!(lib.current().unwrap().name, "B");

        assert_eq!(lib.delete_project(0).unwrap(), None);
        assert_eq!(lib.current_index(), None);
        assert!(lib.is_empty());
    }

    #[test]
    fn test_delete_middle_current_keeps_position() {
        let mut lib = library(&["A", "B", "C"]);
        lib.set_current(1).unwrap();
        assert_eq!(lib.delete_project(1).unwrap(), Some(1));
        assert_eq!(lib.current().unwrap().name, "C");
    }

    #[test]
    fn test_delete_out_of_range() {
        let mut lib = library(&["A"]);
        let err = lib.delete_project(3).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_PROJECT");
    }

    #[test]
    fn test_scan_project_folder() {
        let dir = TempDir::new().unwrap();
        for name in ["Guia.WAV", "Click.wav", "Bass.mp3", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("stems.wav")).unwrap();

        let found = scan_project_folder(dir.path()).unwrap();
        let names: Vec<&str> = found.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Bass", "Click", "Guia"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_scan_keeps_non_utf8_file_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"Voz \xff.wav")), b"").unwrap();
        std::fs::write(dir.path().join("Click.wav"), b"").unwrap();

        let found = scan_project_folder(dir.path()).unwrap();
        let names: Vec<&str> = found.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Click", "Voz \u{FFFD}"]);
    }
}
