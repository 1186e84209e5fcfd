//! Background transform runs.
//!
//! A [`TransformSession`] owns one loaded file and at most one running
//! transform. Submitting new settings cancels the running transform, waits
//! for its thread to exit, then starts a fresh one. Results come back over
//! two bounded channels:
//!
//! - progress: percentages 0-100, non-decreasing, at most 101 values
//! - result: exactly one [`TransformOutput`] for a run that completes, none
//!   for a run that was cancelled

use crate::color::{track_palette, TrackColor};
use crate::error::MidiLoadError;
use crate::keymap::KeyMap;
use crate::midi::{load_midi, scan_tracks, ParsedFile, TrackInfo};
use crate::transform::{run_transform, ResolvedNote, TransformRequest};
use crossbeam_channel::{bounded, Receiver};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Progress channel capacity: one slot per distinct percentage.
const PROGRESS_CAPACITY: usize = 101;

/// Cooperative cancellation flag shared between a run and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The run stops at its next check.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The terminal delivery of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformOutput {
    /// Resolved notes in time order.
    pub notes: Vec<ResolvedNote>,
    /// One color per track of the file.
    pub palette: Vec<TrackColor>,
}

/// Receiving ends handed to the caller for one run.
#[derive(Debug, Clone)]
pub struct RunReceivers {
    /// Run number within the session, starting at 1.
    pub run_id: u64,
    pub progress: Receiver<u8>,
    pub result: Receiver<TransformOutput>,
}

impl RunReceivers {
    /// Blocks until the run delivers its result.
    ///
    /// Returns `None` if the run was cancelled.
    pub fn wait(&self) -> Option<TransformOutput> {
        self.result.recv().ok()
    }
}

/// The session's handle on its running transform.
struct ActiveRun {
    id: u64,
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

impl ActiveRun {
    fn stop(self) {
        self.cancel.cancel();
        if self.thread.join().is_err() {
            warn!(run = self.id, "transform thread panicked");
        }
        debug!(run = self.id, "transform run stopped");
    }
}

/// One loaded file plus its (at most one) running transform.
pub struct TransformSession {
    file: Option<Arc<ParsedFile>>,
    load_error: Option<MidiLoadError>,
    tracks: Vec<TrackInfo>,
    keymap: Arc<KeyMap>,
    active: Option<ActiveRun>,
    last_run: u64,
}

impl TransformSession {
    /// Creates a session over an already loaded file.
    pub fn new(file: ParsedFile, keymap: Arc<KeyMap>) -> Self {
        let tracks = scan_tracks(&file);
        Self {
            file: Some(Arc::new(file)),
            load_error: None,
            tracks,
            keymap,
            active: None,
            last_run: 0,
        }
    }

    /// Loads raw MIDI bytes into a session.
    ///
    /// A file that cannot be loaded still yields a session; its runs each
    /// deliver an empty [`TransformOutput`] and [`Self::load_error`] holds
    /// the reason.
    pub fn open(raw: &[u8], keymap: Arc<KeyMap>) -> Self {
        match load_midi(raw) {
            Ok(file) => {
                let session = Self::new(file, keymap);
                info!(tracks = session.tracks.len(), "loaded MIDI file");
                session
            }
            Err(err) => {
                warn!(error = %err, "could not load MIDI file");
                Self {
                    file: None,
                    load_error: Some(err),
                    tracks: Vec::new(),
                    keymap,
                    active: None,
                    last_run: 0,
                }
            }
        }
    }

    /// The reason the file could not be loaded, if it could not.
    pub fn load_error(&self) -> Option<&MidiLoadError> {
        self.load_error.as_ref()
    }

    /// Track names and note counts, scanned once at load.
    pub fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    pub fn keymap(&self) -> &Arc<KeyMap> {
        &self.keymap
    }

    /// Returns true while a run's thread is still executing.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| !run.thread.is_finished())
    }

    /// Starts a run with new settings, superseding any run in progress.
    ///
    /// Blocks until the previous run's thread has exited.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn submit(&mut self, request: TransformRequest) -> std::io::Result<RunReceivers> {
        self.cancel();

        self.last_run += 1;
        let run_id = self.last_run;
        let (progress_tx, progress_rx) = bounded(PROGRESS_CAPACITY);
        let (result_tx, result_rx) = bounded(1);

        let receivers = RunReceivers {
            run_id,
            progress: progress_rx,
            result: result_rx,
        };

        let Some(file) = self.file.clone() else {
            debug!(run = run_id, "no file loaded, delivering empty result");
            let _ = result_tx.send(TransformOutput::default());
            return Ok(receivers);
        };

        let keymap = Arc::clone(&self.keymap);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();

        let thread = thread::Builder::new()
            .name(format!("transform-{}", run_id))
            .spawn(move || {
                let mut report = |percent: u8| {
                    // Capacity covers every distinct percentage, so this never fills
                    let _ = progress_tx.try_send(percent);
                };

                let Some(notes) = run_transform(&file, &keymap, &request, &worker_cancel, &mut report)
                else {
                    debug!(run = run_id, "transform cancelled");
                    return;
                };

                let output = TransformOutput {
                    notes,
                    palette: track_palette(file.track_count()),
                };
                let _ = result_tx.send(output);
            })?;

        debug!(run = run_id, "transform run started");
        self.active = Some(ActiveRun {
            id: run_id,
            cancel,
            thread,
        });
        Ok(receivers)
    }

    /// Cancels the running transform, if any, and waits for it to stop.
    pub fn cancel(&mut self) {
        if let Some(run) = self.active.take() {
            run.stop();
        }
    }
}

impl Drop for TransformSession {
    fn drop(&mut self) {
        self.cancel();
    }
}
