//! Beat Detector
//!
//! Scans a mono sample buffer for amplitude peaks. A sample becomes a beat
//! when its absolute amplitude exceeds the threshold and it lies further
//! than the refractory window from the previous beat. Every fourth beat,
//! starting with the first, is an accent ("strong" beat).
//!
//! Detection is a pure function of its input, so identical buffers always
//! yield identical beat lists.

use serde::{Deserialize, Serialize};

/// Fallback beat duration when fewer than two beats exist (seconds)
pub const DEFAULT_BEAT_DURATION: f64 = 0.5;

/// Peak detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    /// Absolute amplitude a sample must exceed to count as a peak
    pub threshold: f32,
    /// Minimum distance between two peaks (seconds)
    pub refractory_secs: f64,
    /// Every `accent_period`-th beat is strong
    pub accent_period: u32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            refractory_secs: 0.3,
            accent_period: 4,
        }
    }
}

/// A beat detected on the click track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickBeat {
    /// Time in seconds
    pub time: f64,
    /// 1-based sequence number
    pub number: u32,
    /// Position as a percentage of the track duration
    pub percentage: f64,
    /// Accent beat, safe point to start a jump countdown
    pub is_strong: bool,
}

/// Accent-agnostic projection of a [`ClickBeat`], persisted alongside it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatMarker {
    pub time: f64,
    pub number: u32,
    pub percentage: f64,
}

impl From<&ClickBeat> for BeatMarker {
    fn from(beat: &ClickBeat) -> Self {
        Self {
            time: beat.time,
            number: beat.number,
            percentage: beat.percentage,
        }
    }
}

/// Detect beats in a mono buffer
///
/// # Arguments
/// * `samples` - Mono samples in [-1, 1]
/// * `sample_rate` - Sample rate in Hz
/// * `duration` - Track duration in seconds, used for percentages
/// * `opts` - Detection parameters
///
/// # Example
/// ```
/// use stagemix::analysis::{detect_beats, DetectorOptions};
///
/// let mut samples = vec![0.0f32; 100];
/// samples[10] = 0.8;
/// samples[20] = 0.8; // inside the 30-sample refractory window
/// samples[50] = -0.5;
///
/// let beats = detect_beats(&samples, 100, 1.0, &DetectorOptions::default());
/// assert_eq!(beats.len(), 2);
/// assert!(beats[0].is_strong);
/// ```
pub fn detect_beats(
    samples: &[f32],
    sample_rate: u32,
    duration: f64,
    opts: &DetectorOptions,
) -> Vec<ClickBeat> {
    if sample_rate == 0 {
        return Vec::new();
    }

    let rate = sample_rate as f64;
    let min_distance = rate * opts.refractory_secs;
    let accent_period = opts.accent_period.max(1);

    let mut beats = Vec::new();
    let mut last_peak = -min_distance;

    for (i, sample) in samples.iter().enumerate() {
        let index = i as f64;
        if sample.abs() > opts.threshold && index - last_peak > min_distance {
            let time = index / rate;
            let number = beats.len() as u32 + 1;
            beats.push(ClickBeat {
                time,
                number,
                percentage: if duration > 0.0 {
                    time / duration * 100.0
                } else {
                    0.0
                },
                is_strong: (number - 1) % accent_period == 0,
            });
            last_peak = index;
        }
    }

    log::debug!(
        "[BEATS] {} beats over {} samples @ {} Hz",
        beats.len(),
        samples.len(),
        sample_rate
    );

    beats
}

/// Ordered beat list with the queries the jump synchronizer needs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatGrid {
    beats: Vec<ClickBeat>,
}

impl BeatGrid {
    /// Wrap a beat list. Beats are sorted by time; entries with a time not
    /// strictly greater than the previous one are dropped.
    pub fn new(mut beats: Vec<ClickBeat>) -> Self {
        beats.sort_by(|a, b| a.time.total_cmp(&b.time));
        beats.dedup_by(|next, prev| next.time <= prev.time);
        Self { beats }
    }

    pub fn beats(&self) -> &[ClickBeat] {
        &self.beats
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Average spacing over all beats, weak ones included
    pub fn average_beat_duration(&self) -> f64 {
        match (self.beats.first(), self.beats.last()) {
            (Some(first), Some(last)) if self.beats.len() > 1 => {
                (last.time - first.time) / (self.beats.len() - 1) as f64
            }
            _ => DEFAULT_BEAT_DURATION,
        }
    }

    /// First strong beat strictly after `time`
    pub fn next_strong_after(&self, time: f64) -> Option<&ClickBeat> {
        self.beats.iter().find(|b| b.is_strong && b.time > time)
    }

    pub fn strong_beats(&self) -> impl Iterator<Item = &ClickBeat> {
        self.beats.iter().filter(|b| b.is_strong)
    }

    pub fn beat_markers(&self) -> Vec<BeatMarker> {
        self.beats.iter().map(BeatMarker::from).collect()
    }

    /// Tempo implied by the average beat duration
    pub fn estimated_bpm(&self) -> Option<f64> {
        if self.beats.len() < 2 {
            return None;
        }
        let avg = self.average_beat_duration();
        if avg > 0.0 {
            Some(60.0 / avg)
        } else {
            None
        }
    }
}
