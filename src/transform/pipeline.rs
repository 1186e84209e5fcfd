//! Per-track note extraction.
//!
//! Walks one track in file order, keeping a running tick counter and the
//! most recently seen tempo. A note's time is `ticks * tempo / (1e6 * tpb)`
//! with whatever tempo was current when the note was reached; earlier tempo
//! regions are not integrated.

use super::{reduce_chords_to_root, NoteEvent, ProgressCounter, TrackSettings};
use crate::keymap::KeyMap;
use crate::midi::{MessageKind, ParsedFile};
use crate::worker::CancelToken;
use tracing::debug;

/// Tempo in effect before any tempo event, in µs per quarter note (120 BPM).
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Converts an absolute tick count to seconds at a single tempo.
pub fn ticks_to_seconds(ticks: u64, tempo: u32, ticks_per_beat: u16) -> f64 {
    ticks as f64 * tempo as f64 / (1_000_000.0 * ticks_per_beat as f64)
}

/// Shared inputs for processing the tracks of one run.
pub struct TrackPass<'a> {
    pub file: &'a ParsedFile,
    pub keymap: &'a KeyMap,
    pub cancel: &'a CancelToken,
    pub chord_tolerance_ms: u32,
}

impl TrackPass<'_> {
    /// Extracts the notes of one track.
    ///
    /// `tempo` is read and updated in place so later tracks see changes made
    /// here. Returns `None` if cancellation was observed.
    pub fn run(
        &self,
        track_index: usize,
        settings: &TrackSettings,
        tempo: &mut u32,
        progress: &mut ProgressCounter<'_>,
    ) -> Option<Vec<NoteEvent>> {
        debug!(
            track = track_index,
            octave_shift = settings.octave_shift,
            semitone_shift = settings.semitone_shift,
            reduce_to_root = settings.reduce_to_root,
            time_shift = settings.time_shift_seconds,
            windows = settings.time_windows.len(),
            "processing track"
        );

        let ticks_per_beat = self.file.ticks_per_beat;
        let offset = settings.pitch_offset();
        let mut abs_ticks: u64 = 0;
        let mut notes = Vec::new();

        for message in self.file.track(track_index) {
            if self.cancel.is_cancelled() {
                return None;
            }
            progress.tick();
            abs_ticks += u64::from(message.delta);

            match message.kind {
                MessageKind::Tempo(value) => *tempo = value,
                MessageKind::NoteOn { key, velocity } if velocity > 0 => {
                    let pitch = i32::from(key) + offset;
                    if !self.keymap.is_named(pitch) {
                        continue;
                    }

                    let seconds =
                        ticks_to_seconds(abs_ticks, *tempo, ticks_per_beat) + settings.time_shift_seconds;
                    if seconds < 0.0 || !settings.admits(seconds) {
                        continue;
                    }

                    notes.push(NoteEvent::new(seconds, pitch, track_index));
                }
                _ => {}
            }
        }

        if settings.reduce_to_root {
            notes.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
            let before = notes.len();
            notes = reduce_chords_to_root(&notes, self.chord_tolerance_ms);
            debug!(track = track_index, before, after = notes.len(), "reduced chords to root");
        }

        Some(notes)
    }
}
