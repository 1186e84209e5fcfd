//! Per-track metadata shown to the user before any transform runs.

use super::midi_import::{MessageKind, ParsedFile};
use serde::{Deserialize, Serialize};

/// Name and note count of one track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Position of the track in the file (0-based).
    pub index: usize,
    /// First track-name meta event, or `Track N` (1-based) when there is none.
    pub name: String,
    /// Number of note-on messages with a non-zero velocity.
    pub note_count: usize,
}

/// Scans every track of a parsed file once.
pub fn scan_tracks(file: &ParsedFile) -> Vec<TrackInfo> {
    file.tracks
        .iter()
        .enumerate()
        .map(|(index, messages)| {
            let mut name: Option<&str> = None;
            let mut note_count = 0;

            for message in messages {
                match &message.kind {
                    MessageKind::TrackName(track_name) if name.is_none() => {
                        name = Some(track_name);
                    }
                    MessageKind::NoteOn { velocity, .. } if *velocity > 0 => note_count += 1,
                    _ => {}
                }
            }

            TrackInfo {
                index,
                name: name
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Track {}", index + 1)),
                note_count,
            }
        })
        .collect()
}
