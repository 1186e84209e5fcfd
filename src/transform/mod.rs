//! Note extraction and key resolution.
//!
//! A run turns a [`ParsedFile`] plus per-track settings into an ordered list
//! of [`ResolvedNote`]s:
//!
//! 1. [`pipeline`] converts each enabled track's note-ons to shifted, gated
//!    [`NoteEvent`]s (optionally reduced by [`chord`])
//! 2. [`merge`] concatenates the tracks, folds out-of-range pitches and
//!    applies the global time window
//! 3. [`resolve`] attaches the physical key to each surviving note
//!
//! Runs are synchronous; [`crate::worker`] moves them onto a thread.

pub mod chord;
pub mod merge;
pub mod pipeline;
pub mod resolve;

use crate::keymap::{KeyMap, Modifier};
use crate::midi::ParsedFile;
use crate::worker::CancelToken;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub use chord::reduce_chords_to_root;
pub use merge::{auto_map_pitch, merge_tracks};
pub use pipeline::{ticks_to_seconds, TrackPass, DEFAULT_TEMPO};
pub use resolve::resolve_notes;

/// Default chord tolerance in milliseconds.
pub const DEFAULT_CHORD_TOLERANCE_MS: u32 = 30;

/// Default end of the global time window, in seconds.
pub const DEFAULT_END_TIME: f64 = 999.0;

/// Inclusive time range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Returns true if `seconds` lies within the window (both ends included).
    pub fn contains(&self, seconds: f64) -> bool {
        self.start <= seconds && seconds <= self.end
    }
}

/// Per-track transform settings, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSettings {
    pub enabled: bool,
    /// Octaves to shift, in [-4, 4].
    pub octave_shift: i32,
    /// Semitones to shift, in [-11, 11].
    pub semitone_shift: i32,
    /// Collapse chords to their lowest note.
    pub reduce_to_root: bool,
    /// Seconds added to every note of the track.
    pub time_shift_seconds: f64,
    /// If non-empty, only notes inside at least one window are kept.
    pub time_windows: Vec<TimeWindow>,
}

impl TrackSettings {
    /// Total pitch offset in semitones.
    pub fn pitch_offset(&self) -> i32 {
        self.octave_shift * 12 + self.semitone_shift
    }

    /// Returns true if the track's own windows admit `seconds`.
    /// A track without windows admits everything.
    pub fn admits(&self, seconds: f64) -> bool {
        self.time_windows.is_empty() || self.time_windows.iter().any(|w| w.contains(seconds))
    }
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            octave_shift: 0,
            semitone_shift: 0,
            reduce_to_root: false,
            time_shift_seconds: 0.0,
            time_windows: Vec::new(),
        }
    }
}

/// Everything a single run needs besides the file and the key map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformRequest {
    /// Settings keyed by track index. Tracks without an entry are not processed.
    pub track_settings: BTreeMap<usize, TrackSettings>,
    /// Global window start in seconds.
    pub start_time: f64,
    /// Global window end in seconds.
    pub end_time: f64,
    pub chord_tolerance_ms: u32,
    /// Fold pitches outside the mappable range back into it by octaves.
    pub auto_map: bool,
}

impl TransformRequest {
    /// A request enabling `track_count` tracks with neutral settings.
    pub fn all_tracks(track_count: usize) -> Self {
        Self {
            track_settings: (0..track_count).map(|i| (i, TrackSettings::default())).collect(),
            ..Self::default()
        }
    }

    /// Enabled tracks in ascending index order.
    pub fn enabled_tracks(&self) -> impl Iterator<Item = (usize, &TrackSettings)> {
        self.track_settings
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .map(|(index, settings)| (*index, settings))
    }
}

impl Default for TransformRequest {
    fn default() -> Self {
        Self {
            track_settings: BTreeMap::new(),
            start_time: 0.0,
            end_time: DEFAULT_END_TIME,
            chord_tolerance_ms: DEFAULT_CHORD_TOLERANCE_MS,
            auto_map: false,
        }
    }
}

/// A note after per-track transformation, before key resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub time_seconds: f64,
    /// May lie outside 0..=127 until resolved.
    pub pitch: i32,
    pub track_index: usize,
}

impl NoteEvent {
    pub fn new(time_seconds: f64, pitch: i32, track_index: usize) -> Self {
        Self {
            time_seconds,
            pitch,
            track_index,
        }
    }
}

/// A note annotated with the key that plays it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNote {
    pub time_seconds: f64,
    pub pitch: i32,
    pub key: Option<char>,
    pub modifier: Option<Modifier>,
    pub in_mappable_range: bool,
    pub track_index: usize,
}

/// Converts processed/total message counts into percentage reports.
///
/// Only increases are reported, so at most 101 values are ever emitted.
pub struct ProgressCounter<'a> {
    processed: usize,
    total: usize,
    last: Option<u8>,
    report: &'a mut dyn FnMut(u8),
}

impl<'a> ProgressCounter<'a> {
    pub fn new(total: usize, report: &'a mut dyn FnMut(u8)) -> Self {
        Self {
            processed: 0,
            total,
            last: None,
            report,
        }
    }

    /// Counts one processed message.
    pub fn tick(&mut self) {
        self.processed += 1;
        if self.total == 0 {
            return;
        }
        let percent = (self.processed.min(self.total) * 100 / self.total) as u8;
        self.emit(percent);
    }

    /// Reports completion.
    pub fn finish(&mut self) {
        self.emit(100);
    }

    fn emit(&mut self, percent: u8) {
        if self.last.is_none_or(|last| percent > last) {
            self.last = Some(percent);
            (self.report)(percent);
        }
    }
}

/// Runs the whole transform synchronously.
///
/// `progress` receives non-decreasing percentages. Returns `None` as soon
/// as `cancel` is observed; nothing is reported after that point.
pub fn run_transform(
    file: &ParsedFile,
    keymap: &KeyMap,
    request: &TransformRequest,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(u8),
) -> Option<Vec<ResolvedNote>> {
    let enabled: Vec<(usize, &TrackSettings)> = request
        .enabled_tracks()
        .filter(|(index, _)| {
            let known = *index < file.track_count();
            if !known {
                warn!(track = index, "settings for a track the file does not have, skipping");
            }
            known
        })
        .collect();

    let total: usize = enabled.iter().map(|(index, _)| file.track(*index).len()).sum();
    let mut counter = ProgressCounter::new(total, progress);

    let pass = TrackPass {
        file,
        keymap,
        cancel,
        chord_tolerance_ms: request.chord_tolerance_ms,
    };

    // Tempo carries over from one enabled track to the next
    let mut tempo = DEFAULT_TEMPO;
    let mut per_track = Vec::with_capacity(enabled.len());
    for (index, settings) in enabled {
        if cancel.is_cancelled() {
            return None;
        }
        per_track.push(pass.run(index, settings, &mut tempo, &mut counter)?);
    }

    let merged = merge_tracks(per_track, request, keymap);
    if cancel.is_cancelled() {
        return None;
    }

    let resolved = resolve_notes(&merged, keymap);
    debug!(notes = resolved.len(), "transform finished");
    counter.finish();
    Some(resolved)
}
