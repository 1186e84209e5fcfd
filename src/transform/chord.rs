//! Chord reduction.
//!
//! Notes are grouped by their distance to the first note of the group (the
//! anchor), not to their predecessor: with a 30 ms tolerance, notes at 0, 20
//! and 40 ms form two groups `{0, 20}` and `{40}`. Each group with more than
//! one member is replaced by its lowest pitch.

use super::NoteEvent;

/// Collapses near-simultaneous notes to their lowest pitch.
///
/// `notes` must be sorted by time. Ties on the lowest pitch keep the first
/// note in iteration order. Output stays in chronological order.
pub fn reduce_chords_to_root(notes: &[NoteEvent], tolerance_ms: u32) -> Vec<NoteEvent> {
    let tolerance = f64::from(tolerance_ms) / 1000.0;
    let mut reduced = Vec::with_capacity(notes.len());
    let mut i = 0;

    while i < notes.len() {
        let anchor = notes[i].time_seconds;
        let group_len = notes[i..]
            .iter()
            .take_while(|n| n.time_seconds - anchor <= tolerance)
            .count();
        let group = &notes[i..i + group_len];

        // min_by_key keeps the first of equal minima
        if let Some(root) = group.iter().min_by_key(|n| n.pitch) {
            reduced.push(*root);
        }
        i += group_len;
    }

    reduced
}
