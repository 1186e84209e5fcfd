//! Cross-track merge, octave folding and the global time window.

use super::{NoteEvent, TransformRequest};
use crate::keymap::KeyMap;
use tracing::debug;

/// Moves a pitch outside `[min, max]` towards the range by whole octaves.
///
/// The fold is applied once: `floor(distance / 12) + 1` octaves. With a
/// range narrower than an octave the result can still fall outside it.
pub fn auto_map_pitch(pitch: i32, min: i32, max: i32) -> i32 {
    if pitch < min {
        let shifts = (min - pitch) / 12 + 1;
        pitch + 12 * shifts
    } else if pitch > max {
        let shifts = (pitch - max) / 12 + 1;
        pitch - 12 * shifts
    } else {
        pitch
    }
}

/// Concatenates per-track notes and produces the time-ordered global list.
///
/// Tracks are concatenated in the given order. The final sort is stable, so
/// notes with equal timestamps keep that order.
pub fn merge_tracks(
    per_track: Vec<Vec<NoteEvent>>,
    request: &TransformRequest,
    keymap: &KeyMap,
) -> Vec<NoteEvent> {
    let mut merged: Vec<NoteEvent> = per_track.into_iter().flatten().collect();
    debug!(notes = merged.len(), "merged tracks");

    if request.auto_map {
        let (min, max) = (keymap.min_mapped(), keymap.max_mapped());
        let mut moved = 0;
        for note in &mut merged {
            let mapped = auto_map_pitch(note.pitch, min, max);
            if mapped != note.pitch {
                moved += 1;
                note.pitch = mapped;
            }
        }
        debug!(moved, min, max, "auto-mapped out-of-range notes");
    }

    merged.retain(|n| request.start_time <= n.time_seconds && n.time_seconds <= request.end_time);
    debug!(
        notes = merged.len(),
        start = request.start_time,
        end = request.end_time,
        "applied global time window"
    );

    merged.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
    merged
}
