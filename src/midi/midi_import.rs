//! Standard MIDI File (SMF) loading.
//!
//! Raw bytes are first rebuilt by the sanitizer and then handed to `midly`.
//! The parse result is copied into an owned [`ParsedFile`] that keeps only
//! what the transform needs, so it can be shared with worker threads.
//!
//! # Fallbacks
//!
//! - Buffers without an `MThd` header are parsed untouched; a failure there is final
//! - If the rebuilt stream still fails to parse, the untouched bytes get one more try
//! - SMPTE timecode timing (or a zero division) is read as 480 ticks per beat

use super::sanitize::sanitize;
use crate::error::MidiLoadError;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Resolution assumed when the file does not use metrical timing.
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

/// The subset of track events the transform cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Note on. Velocity 0 is kept as-is; callers treat it as a note off.
    NoteOn { key: u8, velocity: u8 },
    /// Set tempo, in microseconds per quarter note.
    Tempo(u32),
    /// Track name meta event.
    TrackName(String),
    /// Any other event. Still counted for progress and still advances time.
    Other,
}

/// A track event with its delta time in ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedMessage {
    pub delta: u32,
    pub kind: MessageKind,
}

/// A loaded MIDI file: resolution plus the ordered messages of every track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFile {
    /// Ticks per quarter note.
    pub ticks_per_beat: u16,
    /// Tracks in file order.
    pub tracks: Vec<Vec<TimedMessage>>,
}

impl ParsedFile {
    /// Returns the number of tracks in the file.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Returns the messages of a track, or an empty slice for unknown indices.
    pub fn track(&self, index: usize) -> &[TimedMessage] {
        self.tracks.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Loads a MIDI file from disk.
///
/// # Errors
///
/// Returns [`MidiLoadError::Io`] if the file cannot be read and
/// [`MidiLoadError::FileCorrupt`] if no usable stream can be produced.
pub fn load_midi_file<P: AsRef<Path>>(path: P) -> Result<ParsedFile, MidiLoadError> {
    let data = fs::read(path.as_ref())?;
    load_midi(&data)
}

/// Repairs and parses a raw MIDI buffer.
///
/// # Errors
///
/// Returns [`MidiLoadError::FileCorrupt`] when neither the repaired stream
/// nor the untouched bytes parse.
pub fn load_midi(raw: &[u8]) -> Result<ParsedFile, MidiLoadError> {
    let Some(sanitized) = sanitize(raw) else {
        debug!(len = raw.len(), "no MThd header, parsing untouched bytes");
        return parse_smf(raw).map_err(|e| MidiLoadError::FileCorrupt(e.to_string()));
    };

    match parse_smf(&sanitized.bytes) {
        Ok(parsed) => Ok(parsed),
        Err(repaired_err) => {
            warn!(error = %repaired_err, "repaired stream did not parse, retrying untouched bytes");
            parse_smf(raw).map_err(|raw_err| {
                MidiLoadError::FileCorrupt(format!("{}; untouched bytes: {}", repaired_err, raw_err))
            })
        }
    }
}

/// Parses an SMF buffer with `midly` and copies out the relevant events.
fn parse_smf(bytes: &[u8]) -> Result<ParsedFile, midly::Error> {
    let smf = Smf::parse(bytes)?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) if tpb.as_int() > 0 => tpb.as_int(),
        Timing::Metrical(_) => {
            warn!("zero ticks per beat, assuming {}", DEFAULT_TICKS_PER_BEAT);
            DEFAULT_TICKS_PER_BEAT
        }
        Timing::Timecode(fps, subframe) => {
            warn!(
                fps = fps.as_int(),
                subframe,
                "SMPTE timecode timing, assuming {} ticks per beat",
                DEFAULT_TICKS_PER_BEAT
            );
            DEFAULT_TICKS_PER_BEAT
        }
    };

    let tracks = smf
        .tracks
        .iter()
        .map(|track| {
            track
                .iter()
                .map(|event| TimedMessage {
                    delta: event.delta.as_int(),
                    kind: classify(&event.kind),
                })
                .collect()
        })
        .collect();

    Ok(ParsedFile {
        ticks_per_beat,
        tracks,
    })
}

fn classify(kind: &TrackEventKind<'_>) -> MessageKind {
    match kind {
        TrackEventKind::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        } => MessageKind::NoteOn {
            key: key.as_int(),
            velocity: vel.as_int(),
        },
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => MessageKind::Tempo(tempo.as_int()),
        TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
            MessageKind::TrackName(String::from_utf8_lossy(name).into_owned())
        }
        _ => MessageKind::Other,
    }
}
