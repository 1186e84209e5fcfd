//! qinmap - maps MIDI files onto a guqin-style computer keyboard layout.
//!
//! This library provides the loading, repair, transform and export engine
//! behind the `qinmap` command-line tool.

pub mod analyze;
pub mod color;
pub mod config;
pub mod error;
pub mod keymap;
pub mod midi;
pub mod script;
pub mod transform;
pub mod worker;

// Re-export commonly used types
pub use config::SessionConfig;
pub use error::{ConfigError, MidiLoadError, ScriptError};
pub use keymap::{KeyBinding, KeyMap, Modifier};
pub use midi::{load_midi, load_midi_file, ParsedFile, TrackInfo};
pub use transform::{ResolvedNote, TimeWindow, TrackSettings, TransformRequest};
pub use worker::{CancelToken, TransformOutput, TransformSession};
