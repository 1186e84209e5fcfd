//! Key-press script export.
//!
//! Writes the mapped notes as an AutoHotkey-style script: a fixed preamble
//! followed by one `Sleep`/`Send` pair per note. Notes without a key are
//! skipped.

use crate::error::ScriptError;
use crate::keymap::Modifier;
use crate::transform::ResolvedNote;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Pause before the first note, in milliseconds.
pub const INITIAL_PAUSE_MS: u32 = 2000;

/// Renders the script for `notes` played at `speed` (1.0 = original tempo).
///
/// Each delay is `round((t_i - t_{i-1}) * 1000 / speed)` milliseconds, with
/// the first note measured from zero.
///
/// # Errors
///
/// Returns [`ScriptError::InvalidSpeed`] unless `speed` is positive and finite.
pub fn render_script(notes: &[ResolvedNote], speed: f64) -> Result<String, ScriptError> {
    if !(speed.is_finite() && speed > 0.0) {
        return Err(ScriptError::InvalidSpeed(speed));
    }

    let mut out = String::new();
    out.push_str("SendMode, Input\n");
    out.push_str("SetKeyDelay, 0, 0\n");
    let _ = writeln!(out, "Sleep, {}", INITIAL_PAUSE_MS);

    let mut last = 0.0;
    for note in notes {
        let (Some(key), Some(modifier)) = (note.key, note.modifier) else {
            continue;
        };

        let delay = ((note.time_seconds - last) * 1000.0 / speed).round() as i64;
        let _ = writeln!(out, "Sleep, {}", delay);
        let _ = match modifier {
            Modifier::Normal => writeln!(out, "Send, {}", key),
            Modifier::Shift => writeln!(out, "Send, {{Shift down}}{}{{Shift up}}", key),
            Modifier::Ctrl => writeln!(out, "Send, {{Ctrl down}}{}{{Ctrl up}}", key),
        };
        last = note.time_seconds;
    }

    Ok(out)
}

/// Renders the script and writes it to `path`.
///
/// # Errors
///
/// Returns an error if the speed is invalid or the file cannot be written.
pub fn write_script<P: AsRef<Path>>(
    notes: &[ResolvedNote],
    speed: f64,
    path: P,
) -> anyhow::Result<()> {
    let script = render_script(notes, speed)?;
    fs::write(path.as_ref(), script)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(time: f64, key: char, modifier: Modifier) -> ResolvedNote {
        ResolvedNote {
            time_seconds: time,
            pitch: 0,
            key: Some(key),
            modifier: Some(modifier),
            in_mappable_range: true,
            track_index: 0,
        }
    }

    #[test]
    fn test_script_layout() {
        let notes = vec![
            mapped(0.5, 'q', Modifier::Normal),
            ResolvedNote {
                key: None,
                modifier: None,
                in_mappable_range: false,
                ..mapped(0.7, 'x', Modifier::Normal)
            },
            mapped(1.0, 'a', Modifier::Shift),
            mapped(1.25, 'd', Modifier::Ctrl),
        ];
        let script = render_script(&notes, 1.0).unwrap();
        assert_eq!(
            script,
            "SendMode, Input\n\
             SetKeyDelay, 0, 0\n\
             Sleep, 2000\n\
             Sleep, 500\n\
             Send, q\n\
             Sleep, 500\n\
             Send, {Shift down}a{Shift up}\n\
             Sleep, 250\n\
             Send, {Ctrl down}d{Ctrl up}\n"
        );
    }

    #[test]
    fn test_script_speed_scales_and_rounds() {
        let notes = vec![mapped(0.0015, 'q', Modifier::Normal), mapped(1.0015, 'w', Modifier::Normal)];
        let script = render_script(&notes, 2.0).unwrap();
        let sleeps: Vec<&str> = script.lines().filter(|l| l.starts_with("Sleep")).collect();
        assert_eq!(sleeps, vec!["Sleep, 2000", "Sleep, 1", "Sleep, 500"]);
    }

    #[test]
    fn test_script_rejects_bad_speed() {
        assert!(render_script(&[], 0.0).is_err());
        assert!(render_script(&[], -1.0).is_err());
        assert!(render_script(&[], f64::NAN).is_err());
    }

    #[test]
    fn test_script_empty_has_preamble_only() {
        assert_eq!(render_script(&[], 1.0).unwrap().lines().count(), 3);
    }
}
