//! Session configuration.
//!
//! A JSON file holding the global controls and per-track settings for a
//! render. Every field is optional:
//!
//! ```json
//! {
//!   "midi_path": "songs/flowing_water.mid",
//!   "playback_speed": 1.25,
//!   "chord_tolerance_ms": 40,
//!   "start_time": 0.0,
//!   "end_time": 120.0,
//!   "automap_enabled": true,
//!   "track_settings": {
//!     "1": { "octave_shift": -1, "reduce_to_root": true,
//!            "time_windows": [{ "start": 10.0, "end": 30.0 }] }
//!   }
//! }
//! ```

use crate::error::ConfigError;
use crate::keymap::{KeyMap, DEFAULT_OCTAVE_BASE};
use crate::transform::{
    TrackSettings, TransformRequest, DEFAULT_CHORD_TOLERANCE_MS, DEFAULT_END_TIME,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Allowed per-track octave shifts.
pub const OCTAVE_SHIFT_RANGE: RangeInclusive<i32> = -4..=4;
/// Allowed per-track semitone shifts.
pub const SEMITONE_SHIFT_RANGE: RangeInclusive<i32> = -11..=11;

/// Global controls plus per-track settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// MIDI file the session was built for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi_path: Option<PathBuf>,
    /// Script playback speed multiplier.
    pub playback_speed: f64,
    pub chord_tolerance_ms: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub automap_enabled: bool,
    /// Octave number of MIDI pitch 0 in the naming table.
    pub octave_base: i32,
    /// Settings keyed by track index. Empty means every track, neutral settings.
    pub track_settings: BTreeMap<usize, TrackSettings>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            midi_path: None,
            playback_speed: 1.0,
            chord_tolerance_ms: DEFAULT_CHORD_TOLERANCE_MS,
            start_time: 0.0,
            end_time: DEFAULT_END_TIME,
            automap_enabled: false,
            octave_base: DEFAULT_OCTAVE_BASE,
            track_settings: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Parses and validates a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or out-of-range values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serializes the configuration as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Checks shift ranges, time windows and playback speed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.playback_speed.is_finite() && self.playback_speed > 0.0) {
            return Err(ConfigError::PlaybackSpeed(self.playback_speed));
        }

        for (&track, settings) in &self.track_settings {
            if !OCTAVE_SHIFT_RANGE.contains(&settings.octave_shift) {
                return Err(ConfigError::OctaveShift {
                    track,
                    value: settings.octave_shift,
                });
            }
            if !SEMITONE_SHIFT_RANGE.contains(&settings.semitone_shift) {
                return Err(ConfigError::SemitoneShift {
                    track,
                    value: settings.semitone_shift,
                });
            }
            if let Some(window) = settings.time_windows.iter().find(|w| !(w.start < w.end)) {
                return Err(ConfigError::TimeWindow {
                    track,
                    start: window.start,
                    end: window.end,
                });
            }
        }

        Ok(())
    }

    /// The key map this configuration names pitches with.
    pub fn keymap(&self) -> KeyMap {
        KeyMap::guqin_with_octave_base(self.octave_base)
    }

    /// Builds the transform request for a file with `track_count` tracks.
    pub fn request(&self, track_count: usize) -> TransformRequest {
        let track_settings = if self.track_settings.is_empty() {
            TransformRequest::all_tracks(track_count).track_settings
        } else {
            self.track_settings.clone()
        };

        TransformRequest {
            track_settings,
            start_time: self.start_time,
            end_time: self.end_time,
            chord_tolerance_ms: self.chord_tolerance_ms,
            auto_map: self.automap_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TimeWindow;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = SessionConfig::from_json("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.request(3).track_settings.len(), 3);
        assert_eq!(config.keymap().mapped_range(), 12..=47);
    }

    #[test]
    fn test_parse_track_settings() {
        let json = r#"{
            "automap_enabled": true,
            "end_time": 20.0,
            "track_settings": {
                "1": { "octave_shift": -1, "time_windows": [{ "start": 6.0, "end": 10.0 }] }
            }
        }"#;
        let config = SessionConfig::from_json(json).unwrap();
        assert_eq!(config.midi_path, None);
        let request = config.request(4);
        assert!(request.auto_map);
        assert_eq!(request.end_time, 20.0);
        assert_eq!(request.track_settings.len(), 1);
        let settings = &request.track_settings[&1];
        assert_eq!(settings.octave_shift, -1);
        assert!(settings.enabled);
        assert_eq!(settings.time_windows, vec![TimeWindow::new(6.0, 10.0)]);
    }

    #[test]
    fn test_midi_path_and_octave_base() {
        let json = r#"{ "midi_path": "songs/a.mid", "octave_base": -1 }"#;
        let config = SessionConfig::from_json(json).unwrap();
        assert_eq!(config.midi_path, Some(PathBuf::from("songs/a.mid")));
        assert_eq!(config.keymap().mapped_range(), 36..=71);
    }

    #[test]
    fn test_round_trip_json() {
        let mut config = SessionConfig {
            midi_path: Some(PathBuf::from("b.mid")),
            ..SessionConfig::default()
        };
        config.track_settings.insert(
            2,
            TrackSettings {
                semitone_shift: 3,
                ..TrackSettings::default()
            },
        );
        let json = config.to_json().unwrap();
        assert_eq!(SessionConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_validation_errors() {
        let err = SessionConfig::from_json(r#"{"track_settings": {"0": {"octave_shift": 5}}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::OctaveShift { track: 0, value: 5 }));

        let err = SessionConfig::from_json(r#"{"track_settings": {"2": {"semitone_shift": -12}}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::SemitoneShift { track: 2, .. }));

        let err = SessionConfig::from_json(
            r#"{"track_settings": {"0": {"time_windows": [{"start": 3.0, "end": 3.0}]}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::TimeWindow { .. }));

        let err = SessionConfig::from_json(r#"{"playback_speed": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::PlaybackSpeed(_)));

        assert!(matches!(
            SessionConfig::from_json("not json").unwrap_err(),
            ConfigError::Json(_)
        ));
    }
}
