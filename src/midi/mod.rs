//! Standard MIDI File ingestion.
//!
//! This module repairs raw SMF bytes, parses them with `midly` into an owned
//! model and extracts per-track metadata. Repairs never fail; the only error
//! that leaves this module for an in-memory buffer is a corrupt file.

mod midi_import;
pub mod sanitize;
mod track_info;
pub mod vlq;

#[cfg(test)]
pub(crate) mod test_support;

pub use midi_import::{
    load_midi, load_midi_file, MessageKind, ParsedFile, TimedMessage, DEFAULT_TICKS_PER_BEAT,
};
pub use sanitize::{sanitize, RepairStats, Sanitized};
pub use track_info::{scan_tracks, TrackInfo};
