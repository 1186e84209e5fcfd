//! Error types shared across the engine.

use thiserror::Error;

/// Errors that can occur while loading a MIDI file.
///
/// Repairs performed by the sanitizer are never reported; the only failure
/// that can come out of an in-memory buffer is [`MidiLoadError::FileCorrupt`].
#[derive(Debug, Error)]
pub enum MidiLoadError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Neither the repaired stream nor the untouched bytes could be parsed
    #[error("MIDI file is corrupt: {0}")]
    FileCorrupt(String),
}

/// Errors raised while reading or validating a session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("track {track}: octave shift {value} outside [-4, 4]")]
    OctaveShift { track: usize, value: i32 },
    #[error("track {track}: semitone shift {value} outside [-11, 11]")]
    SemitoneShift { track: usize, value: i32 },
    #[error("track {track}: time window [{start}, {end}] must have start < end")]
    TimeWindow { track: usize, start: f64, end: f64 },
    #[error("playback speed must be positive, got {0}")]
    PlaybackSpeed(f64),
}

/// Errors raised by the action-script exporter.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("playback speed must be positive, got {0}")]
    InvalidSpeed(f64),
}
