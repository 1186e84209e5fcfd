//! Per-track display colors.
//!
//! Hues are spread evenly around the wheel at a fixed saturation and value,
//! so neighbouring tracks stay distinguishable.

use palette::{Hsv, IntoColor, Srgb};
use serde::{Deserialize, Serialize};

/// HSV saturation of track colors on a 0-255 scale.
pub const TRACK_SATURATION: u8 = 200;
/// HSV value of track colors on a 0-255 scale.
pub const TRACK_VALUE: u8 = 200;

// ---------------------------------------------------------------------------
// Track palette
// ---------------------------------------------------------------------------

/// Display color of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackColor {
    /// Hue in whole degrees.
    pub hue: u16,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TrackColor {
    /// `#rrggbb` form.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Generates one color per track with evenly spaced hues.
///
/// Track `i` of `n` gets hue `floor(i / n * 360)`.
pub fn track_palette(n: usize) -> Vec<TrackColor> {
    (0..n)
        .map(|i| {
            let hue = ((i as f64 / n as f64) * 360.0).floor() as u16;
            let hsv = Hsv::new(
                f32::from(hue),
                f32::from(TRACK_SATURATION) / 255.0,
                f32::from(TRACK_VALUE) / 255.0,
            );
            let rgb: Srgb = hsv.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            TrackColor {
                hue,
                r: rgb.red,
                g: rgb.green,
                b: rgb.blue,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_hues() {
        let hues: Vec<u16> = track_palette(7).iter().map(|c| c.hue).collect();
        assert_eq!(hues, vec![0, 51, 102, 154, 205, 257, 308]);
        assert!(track_palette(0).is_empty());
    }

    #[test]
    fn test_palette_first_color_is_red() {
        let red = track_palette(3)[0];
        assert_eq!(red.r, TRACK_VALUE);
        assert_eq!(red.g, red.b);
        assert!(red.g < 50);
        assert_eq!(red.hex().len(), 7);
    }
}
