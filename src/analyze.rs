//! Batch range analysis.
//!
//! Scores how much of each MIDI file in a directory tree the key map can
//! play as written, before any shifting or auto-mapping.

use crate::keymap::KeyMap;
use crate::midi::{load_midi_file, MessageKind, ParsedFile};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Range statistics for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEntry {
    pub path: PathBuf,
    /// Sounding note-ons across all tracks.
    pub total_notes: usize,
    /// Note-ons whose pitch lies in the mappable range.
    pub in_range: usize,
    /// `in_range / total_notes` as a percentage, 0 for files without notes.
    pub percentage: f64,
}

/// Counts the file's sounding notes and how many of them are in range.
pub fn analyze_file(file: &ParsedFile, keymap: &KeyMap) -> (usize, usize) {
    file.tracks
        .iter()
        .flatten()
        .filter_map(|message| match message.kind {
            MessageKind::NoteOn { key, velocity } if velocity > 0 => Some(i32::from(key)),
            _ => None,
        })
        .fold((0, 0), |(total, in_range), pitch| {
            (total + 1, in_range + usize::from(keymap.in_mapped_range(pitch)))
        })
}

/// Recursively collects `.mid`/`.midi` files under `dir`, sorted by path.
///
/// # Errors
///
/// Returns an error if `dir` itself cannot be read. Unreadable
/// subdirectories are skipped.
pub fn find_midi_files<P: AsRef<Path>>(dir: P) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.as_ref().to_path_buf()];
    let mut is_root = true;

    while let Some(current) = pending.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) if !is_root => {
                warn!(path = %current.display(), error = %e, "skipping unreadable directory");
                continue;
            }
            Err(e) => return Err(e),
        };
        is_root = false;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_midi_path(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

fn is_midi_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
}

/// Analyzes every MIDI file under `dir` in parallel.
///
/// Entries are ordered by percentage, highest first. Files that fail to
/// load are logged and left out.
///
/// # Errors
///
/// Returns an error if `dir` cannot be read.
pub fn analyze_directory<P: AsRef<Path>>(
    dir: P,
    keymap: &KeyMap,
) -> io::Result<Vec<AnalysisEntry>> {
    let files = find_midi_files(dir)?;
    info!(files = files.len(), "analyzing MIDI files");

    let mut entries: Vec<AnalysisEntry> = files
        .par_iter()
        .filter_map(|path| match load_midi_file(path) {
            Ok(file) => {
                let (total_notes, in_range) = analyze_file(&file, keymap);
                let percentage = if total_notes == 0 {
                    0.0
                } else {
                    in_range as f64 / total_notes as f64 * 100.0
                };
                Some(AnalysisEntry {
                    path: path.clone(),
                    total_notes,
                    in_range,
                    percentage,
                })
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file");
                None
            }
        })
        .collect();

    entries.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    Ok(entries)
}
