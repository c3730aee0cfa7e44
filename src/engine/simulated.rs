//! Simulated audio backend
//!
//! A deterministic, clock-driven backend: element positions advance only in
//! [`PlaybackElement::on_frame`], and seeks complete after a configurable
//! latency. Used by the test suite and the CLI rehearsal mode.
//!
//! [`SimulatedBackend`] is a cheap handle; clones share state, so a caller can
//! hand one clone to the engine and keep another to inspect elements.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::analysis::{decode_wav_channel0, DecodedAudio};
use crate::engine::element::{AudioBackend, AudioSource, PlaybackElement};
use crate::error::{MixerError, Result};

#[derive(Debug, Clone)]
struct SimSource {
    duration: f64,
    decoded: Option<Rc<DecodedAudio>>,
}

#[derive(Debug, Clone, Default)]
struct ElementState {
    url: String,
    position: f64,
    duration: f64,
    paused: bool,
    gain: f32,
    pan: f32,
    seek_remaining: Option<Duration>,
    seek_latency: Duration,
    fast_seek: bool,
    stalled: bool,
    seeks: u32,
    last_seek: Option<f64>,
    decoded: Option<Rc<DecodedAudio>>,
    level: f32,
}

impl ElementState {
    /// Peak of the source between two positions; sources registered without
    /// samples play a full-scale signal
    fn peak_between(&self, from: f64, to: f64) -> f32 {
        match &self.decoded {
            Some(audio) if audio.sample_rate > 0 => {
                let rate = f64::from(audio.sample_rate);
                let len = audio.samples.len();
                let start = ((from * rate) as usize).min(len);
                let end = ((to * rate) as usize).clamp(start, len);
                audio.samples[start..end]
                    .iter()
                    .fold(0.0f32, |peak, s| peak.max(s.abs()))
            }
            _ => 1.0,
        }
    }
}

#[derive(Debug, Default)]
struct SimInner {
    sources: HashMap<String, SimSource>,
    elements: Vec<Rc<RefCell<ElementState>>>,
    seek_latency: Duration,
    no_fast_seek: bool,
    resumes: u32,
    closed: bool,
}

/// Observable state of one simulated element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementProbe {
    pub url: String,
    pub position: f64,
    pub paused: bool,
    pub seeking: bool,
    pub gain: f32,
    pub pan: f32,
    /// Number of seeks issued (fast or direct)
    pub seeks: u32,
    pub last_seek: Option<f64>,
    pub level: f32,
}

/// Clock-driven backend for tests and offline rehearsal
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    inner: Rc<RefCell<SimInner>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeks issued to elements opened afterwards take this long to complete
    pub fn with_seek_latency(self, latency: Duration) -> Self {
        self.inner.borrow_mut().seek_latency = latency;
        self
    }

    /// Elements opened afterwards have no low-latency seek primitive
    pub fn without_fast_seek(self) -> Self {
        self.inner.borrow_mut().no_fast_seek = true;
        self
    }

    /// Register a source of the given length
    pub fn add_source(&self, url: impl Into<String>, duration: f64) {
        self.inner.borrow_mut().sources.insert(
            url.into(),
            SimSource {
                duration,
                decoded: None,
            },
        );
    }

    /// Register a source together with the samples beat detection will see
    pub fn add_decoded_source(&self, url: impl Into<String>, decoded: DecodedAudio) {
        self.inner.borrow_mut().sources.insert(
            url.into(),
            SimSource {
                duration: decoded.duration_secs(),
                decoded: Some(Rc::new(decoded)),
            },
        );
    }

    /// Register a WAV file on disk; its length comes from the decoded header
    pub fn add_wav_source(&self, path: &Path) -> Result<AudioSource> {
        let decoded = decode_wav_channel0(path)?;
        let source = AudioSource::from_path(path);
        self.add_decoded_source(source.url.clone(), decoded);
        Ok(source)
    }

    /// Number of elements opened so far
    pub fn element_count(&self) -> usize {
        self.inner.borrow().elements.len()
    }

    /// Snapshot of the n-th opened element
    pub fn probe(&self, index: usize) -> Option<ElementProbe> {
        self.inner.borrow().elements.get(index).map(|e| {
            let e = e.borrow();
            ElementProbe {
                url: e.url.clone(),
                position: e.position,
                paused: e.paused,
                seeking: e.seek_remaining.is_some(),
                gain: e.gain,
                pan: e.pan,
                seeks: e.seeks,
                last_seek: e.last_seek,
                level: e.level,
            }
        })
    }

    /// Snapshot of every opened element
    pub fn probes(&self) -> Vec<ElementProbe> {
        (0..self.element_count())
            .filter_map(|i| self.probe(i))
            .collect()
    }

    /// Freeze the n-th element's clock even while it is playing
    pub fn set_stalled(&self, index: usize, stalled: bool) {
        if let Some(e) = self.inner.borrow().elements.get(index) {
            e.borrow_mut().stalled = stalled;
        }
    }

    pub fn resume_count(&self) -> u32 {
        self.inner.borrow().resumes
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }
}

impl AudioBackend for SimulatedBackend {
    fn open(&mut self, source: &AudioSource) -> Result<Box<dyn PlaybackElement>> {
        let mut inner = self.inner.borrow_mut();
        let (duration, decoded) = inner
            .sources
            .get(&source.url)
            .map(|s| (s.duration, s.decoded.clone()))
            .ok_or_else(|| MixerError::SourceUnavailable {
                url: source.url.clone(),
            })?;

        let state = Rc::new(RefCell::new(ElementState {
            url: source.url.clone(),
            duration,
            paused: true,
            gain: 1.0,
            seek_latency: inner.seek_latency,
            fast_seek: !inner.no_fast_seek,
            decoded,
            ..ElementState::default()
        }));
        inner.elements.push(Rc::clone(&state));
        inner.closed = false;

        Ok(Box::new(SimulatedElement { state }))
    }

    fn resume(&mut self) {
        self.inner.borrow_mut().resumes += 1;
    }

    fn close(&mut self) {
        self.inner.borrow_mut().closed = true;
    }

    fn decode(&mut self, source: &AudioSource) -> Result<DecodedAudio> {
        let decoded = self
            .inner
            .borrow()
            .sources
            .get(&source.url)
            .and_then(|s| s.decoded.as_deref().cloned());
        match decoded {
            Some(decoded) => Ok(decoded),
            None => decode_wav_channel0(Path::new(&source.url)),
        }
    }
}

/// Element handed out by [`SimulatedBackend`]
#[derive(Debug)]
pub struct SimulatedElement {
    state: Rc<RefCell<ElementState>>,
}

impl SimulatedElement {
    fn begin_seek(&mut self, secs: f64) {
        let mut s = self.state.borrow_mut();
        s.position = secs.clamp(0.0, s.duration.max(0.0));
        s.seeks += 1;
        s.last_seek = Some(s.position);
        s.seek_remaining = if s.seek_latency.is_zero() {
            None
        } else {
            Some(s.seek_latency)
        };
    }
}

impl PlaybackElement for SimulatedElement {
    fn play(&mut self) {
        self.state.borrow_mut().paused = false;
    }

    fn pause(&mut self) {
        self.state.borrow_mut().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn position(&self) -> f64 {
        self.state.borrow().position
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration
    }

    fn set_position(&mut self, secs: f64) {
        self.begin_seek(secs);
    }

    fn fast_seek(&mut self, secs: f64) -> bool {
        if !self.state.borrow().fast_seek {
            return false;
        }
        self.begin_seek(secs);
        true
    }

    fn is_seeking(&self) -> bool {
        self.state.borrow().seek_remaining.is_some()
    }

    fn gain(&self) -> f32 {
        self.state.borrow().gain
    }

    fn set_gain(&mut self, gain: f32) {
        self.state.borrow_mut().gain = gain;
    }

    fn pan(&self) -> f32 {
        self.state.borrow().pan
    }

    fn set_pan(&mut self, pan: f32) {
        self.state.borrow_mut().pan = pan;
    }

    fn meter(&self) -> f32 {
        self.state.borrow().level
    }

    fn on_frame(&mut self, elapsed: Duration) {
        let mut s = self.state.borrow_mut();

        if let Some(remaining) = s.seek_remaining {
            // A seek in flight holds the clock
            s.seek_remaining = remaining.checked_sub(elapsed).filter(|r| !r.is_zero());
            s.level = 0.0;
            return;
        }

        if s.paused || s.stalled {
            s.level = 0.0;
            return;
        }

        let from = s.position;
        s.position += elapsed.as_secs_f64();
        if s.duration > 0.0 && s.position >= s.duration {
            s.position = s.duration;
            s.paused = true;
        }
        s.level = s.peak_between(from, s.position) * s.gain;
    }
}
