//! Pitch naming and the guqin keyboard layout.
//!
//! The controller has 21 keys in three rows. Each row covers the naturals of
//! one octave; sharps are played with Shift and flats with Ctrl:
//!
//! ```text
//! q w e r t y u    octave 4
//! a s d f g h j    octave 3
//! z x c v b n m    octave 2
//! ```
//!
//! A [`KeyMap`] is built once and shared (behind an `Arc`) with every run.
//! Nothing in it changes after construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Pitch classes in the order used by the naming table. Accidentals are
/// spelled with sharps only.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Number of octaves in the naming table.
pub const NAMED_OCTAVES: usize = 9;

/// Octave number given to MIDI pitch 0 by default (pitch 0 is `C1`).
pub const DEFAULT_OCTAVE_BASE: i32 = 1;

/// Range used when none of the bindings can be named.
const FALLBACK_RANGE: RangeInclusive<i32> = 36..=83;

/// Chord key held together with the mapped key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Normal,
    Shift,
    Ctrl,
}

impl std::fmt::Display for Modifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modifier::Normal => write!(f, "normal"),
            Modifier::Shift => write!(f, "shift"),
            Modifier::Ctrl => write!(f, "ctrl"),
        }
    }
}

/// The physical action that plays a pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyBinding {
    pub key: char,
    pub modifier: Modifier,
}

/// The guqin layout as (pitch name, key, modifier).
///
/// The flat entries are spelled `Eb`/`Bb` while the naming table only has
/// sharps, so they never match and `D#`/`A#` stay unbound.
pub const GUQIN_LAYOUT: &[(&str, char, Modifier)] = &[
    ("C4", 'q', Modifier::Normal),
    ("D4", 'w', Modifier::Normal),
    ("E4", 'e', Modifier::Normal),
    ("F4", 'r', Modifier::Normal),
    ("G4", 't', Modifier::Normal),
    ("A4", 'y', Modifier::Normal),
    ("B4", 'u', Modifier::Normal),
    ("C3", 'a', Modifier::Normal),
    ("D3", 's', Modifier::Normal),
    ("E3", 'd', Modifier::Normal),
    ("F3", 'f', Modifier::Normal),
    ("G3", 'g', Modifier::Normal),
    ("A3", 'h', Modifier::Normal),
    ("B3", 'j', Modifier::Normal),
    ("C2", 'z', Modifier::Normal),
    ("D2", 'x', Modifier::Normal),
    ("E2", 'c', Modifier::Normal),
    ("F2", 'v', Modifier::Normal),
    ("G2", 'b', Modifier::Normal),
    ("A2", 'n', Modifier::Normal),
    ("B2", 'm', Modifier::Normal),
    ("C#4", 'q', Modifier::Shift),
    ("F#4", 'r', Modifier::Shift),
    ("G#4", 't', Modifier::Shift),
    ("C#3", 'a', Modifier::Shift),
    ("F#3", 'f', Modifier::Shift),
    ("G#3", 'g', Modifier::Shift),
    ("C#2", 'z', Modifier::Shift),
    ("F#2", 'v', Modifier::Shift),
    ("G#2", 'b', Modifier::Shift),
    ("Eb4", 'e', Modifier::Ctrl),
    ("Bb4", 'u', Modifier::Ctrl),
    ("Eb3", 'd', Modifier::Ctrl),
    ("Bb3", 'j', Modifier::Ctrl),
    ("Eb2", 'c', Modifier::Ctrl),
    ("Bb2", 'm', Modifier::Ctrl),
];

/// Pitch-name table plus pitch-name to key bindings.
#[derive(Debug, Clone)]
pub struct KeyMap {
    /// Name of each MIDI number, index = pitch.
    names: Vec<String>,
    bindings: HashMap<String, KeyBinding>,
    min_mapped: i32,
    max_mapped: i32,
}

impl KeyMap {
    /// The guqin layout with the default naming (pitch 0 is `C1`).
    pub fn guqin() -> Self {
        Self::guqin_with_octave_base(DEFAULT_OCTAVE_BASE)
    }

    /// The guqin layout, naming MIDI pitch 0 as `C{octave_base}`.
    ///
    /// With `octave_base = -1` the usual convention applies and 60 is `C4`.
    pub fn guqin_with_octave_base(octave_base: i32) -> Self {
        Self::new(
            octave_base,
            GUQIN_LAYOUT.iter().map(|&(name, key, modifier)| {
                (name.to_string(), KeyBinding { key, modifier })
            }),
        )
    }

    /// Builds a key map from arbitrary bindings.
    ///
    /// The mappable range spans the lowest to the highest pitch whose bound
    /// name exists in the naming table.
    pub fn new(octave_base: i32, bindings: impl IntoIterator<Item = (String, KeyBinding)>) -> Self {
        let names: Vec<String> = (0..NAMED_OCTAVES as i32)
            .flat_map(|octave| {
                PITCH_CLASSES
                    .iter()
                    .map(move |class| format!("{}{}", class, octave + octave_base))
            })
            .collect();
        let bindings: HashMap<String, KeyBinding> = bindings.into_iter().collect();

        let mut named = names
            .iter()
            .enumerate()
            .filter(|(_, name)| bindings.contains_key(*name))
            .map(|(pitch, _)| pitch as i32);
        let (min_mapped, max_mapped) = match named.next() {
            Some(first) => named.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))),
            None => (*FALLBACK_RANGE.start(), *FALLBACK_RANGE.end()),
        };

        Self {
            names,
            bindings,
            min_mapped,
            max_mapped,
        }
    }

    /// Number of pitches the naming table covers; valid pitches are `0..len`.
    pub fn named_len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the pitch has a name.
    pub fn is_named(&self, pitch: i32) -> bool {
        pitch >= 0 && (pitch as usize) < self.names.len()
    }

    /// Returns the name of a MIDI pitch, e.g. `C3`.
    pub fn name_of(&self, pitch: i32) -> Option<&str> {
        if !self.is_named(pitch) {
            return None;
        }
        self.names.get(pitch as usize).map(String::as_str)
    }

    /// Returns the key binding for a pitch, if its name is bound.
    pub fn binding_for(&self, pitch: i32) -> Option<KeyBinding> {
        self.name_of(pitch)
            .and_then(|name| self.bindings.get(name))
            .copied()
    }

    /// Lowest pitch whose name is bound.
    pub fn min_mapped(&self) -> i32 {
        self.min_mapped
    }

    /// Highest pitch whose name is bound.
    pub fn max_mapped(&self) -> i32 {
        self.max_mapped
    }

    /// The inclusive mappable range.
    pub fn mapped_range(&self) -> RangeInclusive<i32> {
        self.min_mapped..=self.max_mapped
    }

    /// Returns true if the pitch lies within the mappable range.
    pub fn in_mapped_range(&self, pitch: i32) -> bool {
        self.mapped_range().contains(&pitch)
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::guqin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_naming() {
        let map = KeyMap::guqin();
        assert_eq!(map.named_len(), 108);
        assert_eq!(map.name_of(0), Some("C1"));
        assert_eq!(map.name_of(13), Some("C#2"));
        assert_eq!(map.name_of(107), Some("B9"));
        assert_eq!(map.name_of(108), None);
        assert_eq!(map.name_of(-1), None);
    }

    #[test]
    fn test_default_range() {
        let map = KeyMap::guqin();
        // C2 and B4 with pitch 0 = C1
        assert_eq!(map.mapped_range(), 12..=47);
    }

    #[test]
    fn test_standard_octave_base() {
        let map = KeyMap::guqin_with_octave_base(-1);
        assert_eq!(map.name_of(60), Some("C4"));
        assert_eq!(map.mapped_range(), 36..=71);
        assert_eq!(
            map.binding_for(60),
            Some(KeyBinding {
                key: 'q',
                modifier: Modifier::Normal
            })
        );
        assert_eq!(
            map.binding_for(54),
            Some(KeyBinding {
                key: 'f',
                modifier: Modifier::Shift
            })
        );
    }

    #[test]
    fn test_flat_spellings_never_bind() {
        let map = KeyMap::guqin_with_octave_base(-1);
        // D#3 (Eb3) and A#3 (Bb3) are in range but unbound
        assert!(map.in_mapped_range(51));
        assert_eq!(map.binding_for(51), None);
        assert_eq!(map.binding_for(58), None);
    }

    #[test]
    fn test_fallback_range_when_nothing_names() {
        let map = KeyMap::new(
            1,
            vec![(
                "H9".to_string(),
                KeyBinding {
                    key: 'x',
                    modifier: Modifier::Normal,
                },
            )],
        );
        assert_eq!(map.mapped_range(), 36..=83);
    }

    #[test]
    fn test_modifier_serde() {
        assert_eq!(serde_json::to_string(&Modifier::Shift).unwrap(), "\"shift\"");
        assert_eq!(Modifier::Ctrl.to_string(), "ctrl");
    }
}
