//! Pitch to physical key resolution.

use super::{NoteEvent, ResolvedNote};
use crate::keymap::KeyMap;

/// Attaches the key binding to every note.
///
/// Notes outside the mappable range are kept with no key so they can still
/// be drawn. Notes inside the range whose name has no binding are marked in
/// range but also get no key.
pub fn resolve_notes(notes: &[NoteEvent], keymap: &KeyMap) -> Vec<ResolvedNote> {
    notes
        .iter()
        .map(|note| {
            let in_mappable_range = keymap.in_mapped_range(note.pitch);
            let binding = if in_mappable_range {
                keymap.binding_for(note.pitch)
            } else {
                None
            };

            ResolvedNote {
                time_seconds: note.time_seconds,
                pitch: note.pitch,
                key: binding.map(|b| b.key),
                modifier: binding.map(|b| b.modifier),
                in_mappable_range,
                track_index: note.track_index,
            }
        })
        .collect()
}
