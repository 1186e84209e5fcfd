//! Byte-level repair of Standard MIDI Files.
//!
//! Rebuilds a raw SMF buffer chunk by chunk so that a strict parser accepts
//! it: malformed delta times are replaced, truncated meta payloads get
//! defaults, running status is expanded and every track chunk gets a length
//! prefix that matches its actual content.
//!
//! Nothing in here fails. Buffers without a header are passed back as `None`
//! so the caller can try the untouched bytes instead.

use super::vlq::{read_vlq, write_vlq, MAX_VLQ_VALUE};
use tracing::{debug, trace};

/// Length of the `MThd` chunk including its 8-byte chunk header.
pub const HEADER_LEN: usize = 14;

const HEADER_MAGIC: &[u8; 4] = b"MThd";
const TRACK_MAGIC: &[u8; 4] = b"MTrk";

/// Status used when a data byte appears before any explicit status.
const DEFAULT_RUNNING_STATUS: u8 = 0x90;

const META: u8 = 0xFF;
const SYSEX: u8 = 0xF0;
const ESCAPE: u8 = 0xF7;

const META_TEMPO: u8 = 0x51;
const META_SMPTE_OFFSET: u8 = 0x54;
const META_TIME_SIGNATURE: u8 = 0x58;
const META_KEY_SIGNATURE: u8 = 0x59;

/// 4/4, 24 MIDI clocks per click, 8 32nds per quarter.
const DEFAULT_TIME_SIGNATURE: [u8; 4] = [4, 2, 24, 8];
/// C major.
const DEFAULT_KEY_SIGNATURE: [u8; 2] = [0, 0];
/// 500000 µs per quarter note (120 BPM).
const DEFAULT_TEMPO: [u8; 3] = [0x07, 0xA1, 0x20];
const DEFAULT_SMPTE_OFFSET: [u8; 5] = [0; 5];

/// Counters describing what the sanitizer had to fix.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairStats {
    /// Track chunks emitted.
    pub tracks: usize,
    /// Delta times or lengths that did not terminate within 4 bytes.
    pub malformed_vlqs: usize,
    /// Fixed-length meta events whose payload was truncated or replaced.
    pub meta_repairs: usize,
    /// Meta/sysex lengths that ran past the end of the buffer.
    pub clamped_lengths: usize,
    /// Events that relied on running status.
    pub running_status: usize,
    /// Tracks cut short because a message ran past the end of the buffer.
    pub truncated_tracks: usize,
    /// System common/realtime events and channel messages cut short by a
    /// status byte, skipped.
    pub dropped_events: usize,
}

/// A rebuilt byte stream plus what was repaired along the way.
#[derive(Debug, Clone)]
pub struct Sanitized {
    pub bytes: Vec<u8>,
    pub stats: RepairStats,
}

/// Rebuilds `raw` into a stream with consistent chunk lengths and repaired events.
///
/// Returns `None` if the buffer is shorter than a header chunk or does not
/// start with `MThd`; there is nothing to anchor a repair on in that case.
///
/// Chunks after the header must be `MTrk`; the first chunk that is missing
/// its signature (or is truncated) ends the file and everything before it is
/// kept.
pub fn sanitize(raw: &[u8]) -> Option<Sanitized> {
    if raw.len() < HEADER_LEN || &raw[0..4] != HEADER_MAGIC {
        return None;
    }

    let mut sanitizer = Sanitizer {
        raw,
        stats: RepairStats::default(),
    };
    let bytes = sanitizer.run();
    debug!(stats = ?sanitizer.stats, len = bytes.len(), "sanitized MIDI stream");

    Some(Sanitized {
        bytes,
        stats: sanitizer.stats,
    })
}

/// Repairs the payload of the four fixed-length meta events.
///
/// Longer payloads are truncated; shorter ones are replaced by the default
/// as a whole (not padded). Other meta types pass through.
pub fn repair_meta(meta_type: u8, payload: &[u8]) -> &[u8] {
    let (expected, default): (usize, &'static [u8]) = match meta_type {
        META_TIME_SIGNATURE => (4, &DEFAULT_TIME_SIGNATURE),
        META_KEY_SIGNATURE => (2, &DEFAULT_KEY_SIGNATURE),
        META_TEMPO => (3, &DEFAULT_TEMPO),
        META_SMPTE_OFFSET => (5, &DEFAULT_SMPTE_OFFSET),
        _ => return payload,
    };

    if payload.len() < expected {
        default
    } else {
        &payload[..expected]
    }
}

/// Number of data bytes following a channel status byte.
fn channel_arg_count(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        _ => 2,
    }
}

struct Sanitizer<'a> {
    raw: &'a [u8],
    stats: RepairStats,
}

impl<'a> Sanitizer<'a> {
    fn run(&mut self) -> Vec<u8> {
        let raw = self.raw;
        let total = raw.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&raw[..HEADER_LEN]);

        let mut pos = HEADER_LEN;
        while pos < total {
            if pos + 8 > total || &raw[pos..pos + 4] != TRACK_MAGIC {
                debug!(offset = pos, "no further track chunk, keeping what was read");
                break;
            }

            let declared = u32::from_be_bytes([raw[pos + 4], raw[pos + 5], raw[pos + 6], raw[pos + 7]]);
            pos += 8;
            let track_end = pos.saturating_add(declared as usize).min(total);

            let (track, next) = self.repair_track(pos, track_end);
            pos = next;

            out.extend_from_slice(TRACK_MAGIC);
            out.extend_from_slice(&(track.len() as u32).to_be_bytes());
            out.extend_from_slice(&track);
            self.stats.tracks += 1;
        }

        out
    }

    /// Re-encodes one track's events. Returns the repaired bytes and the
    /// position where reading stopped.
    ///
    /// Meta/sysex payloads and channel arguments are bounded by the end of
    /// the buffer rather than the declared chunk end, so a chunk that lies
    /// about its length does not cut an event in half.
    fn repair_track(&mut self, start: usize, track_end: usize) -> (Vec<u8>, usize) {
        let raw = self.raw;
        let total = raw.len();
        let mut out = Vec::with_capacity(track_end.saturating_sub(start));
        let mut running_status: Option<u8> = None;
        // Delta of events that were skipped is folded into the next emitted event
        let mut pending_delta: u32 = 0;
        // Set when a status byte interrupted a message and starts the next event
        let mut at_status = false;
        let mut pos = start;

        while pos < track_end {
            if !std::mem::take(&mut at_status) {
                let delta = self.read_length(&mut pos);
                pending_delta = pending_delta.saturating_add(delta).min(MAX_VLQ_VALUE);
            }

            if pos >= track_end {
                break;
            }

            let byte = raw[pos];
            let status = if byte & 0x80 != 0 {
                pos += 1;
                running_status = Some(byte);
                byte
            } else {
                self.stats.running_status += 1;
                running_status.unwrap_or(DEFAULT_RUNNING_STATUS)
            };

            match status {
                META => {
                    if pos >= track_end {
                        break;
                    }
                    let meta_type = raw[pos];
                    pos += 1;
                    let payload = self.read_payload(&mut pos);
                    let fixed = repair_meta(meta_type, payload);
                    if fixed.len() != payload.len() {
                        self.stats.meta_repairs += 1;
                        trace!(meta_type, from = payload.len(), to = fixed.len(), "repaired meta payload");
                    }

                    write_vlq(pending_delta, &mut out);
                    out.push(META);
                    out.push(meta_type);
                    write_vlq(fixed.len() as u32, &mut out);
                    out.extend_from_slice(fixed);
                    pending_delta = 0;
                }
                SYSEX | ESCAPE => {
                    let payload = self.read_payload(&mut pos);

                    write_vlq(pending_delta, &mut out);
                    out.push(status);
                    write_vlq(payload.len() as u32, &mut out);
                    out.extend_from_slice(payload);
                    pending_delta = 0;
                }
                _ => {
                    let args = channel_arg_count(status);
                    if pos + args > total {
                        self.stats.truncated_tracks += 1;
                        debug!(offset = pos, "channel message runs past end of file, ending track");
                        break;
                    }

                    let data = &raw[pos..pos + args];
                    if let Some(offset) = data.iter().position(|b| b & 0x80 != 0) {
                        self.stats.dropped_events += 1;
                        debug!(offset = pos + offset, status, "status byte inside message, dropping it");
                        pos += offset;
                        at_status = true;
                        continue;
                    }

                    if status >= 0xF0 {
                        // System common/realtime status has no place in a file
                        self.stats.dropped_events += 1;
                        pos += args;
                        continue;
                    }

                    write_vlq(pending_delta, &mut out);
                    out.push(status);
                    out.extend_from_slice(data);
                    pos += args;
                    pending_delta = 0;
                }
            }
        }

        (out, pos)
    }

    /// Reads a VLQ at `pos`, substituting zero and skipping one byte when malformed.
    fn read_length(&mut self, pos: &mut usize) -> u32 {
        match read_vlq(self.raw, *pos) {
            Some((value, next)) => {
                *pos = next;
                value
            }
            None => {
                self.stats.malformed_vlqs += 1;
                *pos = (*pos + 1).min(self.raw.len());
                0
            }
        }
    }

    /// Reads a VLQ length followed by that many bytes, clamped to the buffer.
    fn read_payload(&mut self, pos: &mut usize) -> &'a [u8] {
        let raw = self.raw;
        let declared = self.read_length(pos) as usize;
        let available = raw.len().saturating_sub(*pos);
        let len = if declared > available {
            self.stats.clamped_lengths += 1;
            available
        } else {
            declared
        };

        let start = *pos;
        *pos += len;
        &raw[start..start + len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::test_support::{smf, track};

    /// Returns the track chunk bodies of a sanitized buffer.
    fn track_bodies(bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut bodies = Vec::new();
        let mut pos = HEADER_LEN;
        while pos + 8 <= bytes.len() {
            assert_eq!(&bytes[pos..pos + 4], TRACK_MAGIC);
            let len = u32::from_be_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]])
                as usize;
            bodies.push(bytes[pos + 8..pos + 8 + len].to_vec());
            pos += 8 + len;
        }
        bodies
    }

    #[test]
    fn test_no_header_is_left_alone() {
        assert!(sanitize(b"MThd").is_none());
        assert!(sanitize(b"RIFF0000000000000000").is_none());
    }

    #[test]
    fn test_well_formed_file_is_idempotent() {
        let file = smf(
            1,
            480,
            &[
                track(&[
                    &[0x00, 0xFF, 0x03, 0x04, b'L', b'e', b'a', b'd'],
                    &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20],
                    &[0x00, 0x90, 60, 100],
                    &[0x83, 0x60, 0x80, 60, 0],
                    &[0x00, 0xFF, 0x2F, 0x00],
                ]),
                track(&[&[0x00, 0xC0, 5], &[0x00, 0x91, 64, 90], &[0x00, 0xFF, 0x2F, 0x00]]),
            ],
        );

        let once = sanitize(&file).unwrap();
        let twice = sanitize(&once.bytes).unwrap();
        assert_eq!(once.bytes, twice.bytes);
        assert_eq!(once.bytes, file);
        assert_eq!(once.stats.tracks, 2);
    }

    #[test]
    fn test_running_status_is_expanded() {
        let file = smf(0, 96, &[track(&[&[0x00, 0x90, 60, 100], &[0x10, 62, 100], &[0x10, 64, 0]])]);
        let out = sanitize(&file).unwrap();
        let bodies = track_bodies(&out.bytes);
        assert_eq!(
            bodies[0],
            vec![0x00, 0x90, 60, 100, 0x10, 0x90, 62, 100, 0x10, 0x90, 64, 0]
        );
        assert_eq!(out.stats.running_status, 2);
    }

    #[test]
    fn test_missing_running_status_defaults_to_note_on() {
        let file = smf(0, 96, &[track(&[&[0x00, 60, 100]])]);
        let bodies = track_bodies(&sanitize(&file).unwrap().bytes);
        assert_eq!(bodies[0], vec![0x00, 0x90, 60, 100]);
    }

    #[test]
    fn test_truncated_tempo_gets_default() {
        let file = smf(0, 96, &[track(&[&[0x00, 0xFF, 0x51, 0x02, 0x01, 0x02], &[0x00, 0xFF, 0x2F, 0x00]])]);
        let out = sanitize(&file).unwrap();
        let bodies = track_bodies(&out.bytes);
        assert_eq!(
            bodies[0],
            vec![0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, 0x00, 0xFF, 0x2F, 0x00]
        );
        assert_eq!(out.stats.meta_repairs, 1);
    }

    #[test]
    fn test_short_fixed_meta_defaults() {
        assert_eq!(&*repair_meta(0x58, &[3, 3]), &[4, 2, 24, 8]);
        assert_eq!(&*repair_meta(0x59, &[1]), &[0, 0]);
        assert_eq!(&*repair_meta(0x54, &[1, 2, 3, 4]), &[0, 0, 0, 0, 0]);
        assert_eq!(&*repair_meta(0x51, &[]), &[0x07, 0xA1, 0x20]);
    }

    #[test]
    fn test_long_fixed_meta_is_truncated() {
        assert_eq!(&*repair_meta(0x58, &[6, 3, 24, 8, 99, 99]), &[6, 3, 24, 8]);
        assert_eq!(&*repair_meta(0x51, &[0x0F, 0x42, 0x40, 0x00]), &[0x0F, 0x42, 0x40]);
        // Text events are untouched
        assert_eq!(&*repair_meta(0x01, b"hello"), b"hello");
    }

    #[test]
    fn test_meta_length_clamped_to_buffer() {
        // Track-name claims 100 bytes but only 3 remain
        let file = smf(0, 96, &[track(&[&[0x00, 0xFF, 0x03, 0x64, b'a', b'b', b'c']])]);
        let out = sanitize(&file).unwrap();
        assert_eq!(track_bodies(&out.bytes)[0], vec![0x00, 0xFF, 0x03, 0x03, b'a', b'b', b'c']);
        assert_eq!(out.stats.clamped_lengths, 1);
    }

    #[test]
    fn test_sysex_payload_passes_through() {
        let file = smf(0, 96, &[track(&[&[0x00, 0xF0, 0x03, 0x7E, 0x09, 0xF7]])]);
        let out = sanitize(&file).unwrap();
        assert_eq!(track_bodies(&out.bytes)[0], vec![0x00, 0xF0, 0x03, 0x7E, 0x09, 0xF7]);
    }

    #[test]
    fn test_malformed_delta_becomes_zero() {
        // Five continuation bytes: decode fails, resumes one byte later each time
        let file = smf(0, 96, &[track(&[&[0x80, 0x80, 0x80, 0x80, 0x00, 0x90, 60, 100]])]);
        let out = sanitize(&file).unwrap();
        assert!(out.stats.malformed_vlqs >= 1);
        let body = &track_bodies(&out.bytes)[0];
        assert!(body.ends_with(&[0x90, 60, 100]));
    }

    #[test]
    fn test_truncated_channel_message_ends_track() {
        let mut file = smf(0, 96, &[track(&[&[0x00, 0x90, 60, 100], &[0x00, 0x90, 62]])]);
        // Drop the final data byte so the second note-on is incomplete
        file.pop();
        let out = sanitize(&file).unwrap();
        assert_eq!(track_bodies(&out.bytes)[0], vec![0x00, 0x90, 60, 100]);
        assert_eq!(out.stats.truncated_tracks, 1);
    }

    #[test]
    fn test_length_field_is_recomputed() {
        let mut file = smf(0, 96, &[track(&[&[0x00, 0x90, 60, 100], &[0x00, 0xFF, 0x2F, 0x00]])]);
        // Declare a much longer chunk than present
        file[HEADER_LEN + 7] = 0xFF;
        let out = sanitize(&file).unwrap();
        let bodies = track_bodies(&out.bytes);
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0], vec![0x00, 0x90, 60, 100, 0x00, 0xFF, 0x2F, 0x00]);
    }

    #[test]
    fn test_garbage_after_tracks_is_ignored() {
        let mut file = smf(0, 96, &[track(&[&[0x00, 0x90, 60, 100]])]);
        file.extend_from_slice(b"JUNKJUNK");
        let out = sanitize(&file).unwrap();
        assert_eq!(track_bodies(&out.bytes).len(), 1);
    }

    #[test]
    fn test_running_status_after_meta_reads_meta() {
        let file = smf(
            0,
            96,
            &[track(&[
                &[0x00, 0x90, 0x3C, 0x64],
                &[0x00, 0xFF, 0x01, 0x01, b'a'],
                &[0x00, 0x03, 0x01, b'b'],
                &[0x00, 0xFF, 0x2F, 0x00],
            ])],
        );
        let out = sanitize(&file).unwrap();
        assert_eq!(
            track_bodies(&out.bytes)[0],
            vec![
                0x00, 0x90, 0x3C, 0x64, 0x00, 0xFF, 0x01, 0x01, b'a', 0x00, 0xFF, 0x03, 0x01, b'b',
                0x00, 0xFF, 0x2F, 0x00,
            ]
        );
        assert_eq!(out.stats.running_status, 1);
    }

    #[test]
    fn test_running_status_after_sysex_reads_sysex() {
        let file = smf(0, 96, &[track(&[&[0x00, 0xF0, 0x01, 0xF7], &[0x05, 0x02, 0x7E, 0xF7]])]);
        let out = sanitize(&file).unwrap();
        assert_eq!(
            track_bodies(&out.bytes)[0],
            vec![0x00, 0xF0, 0x01, 0xF7, 0x05, 0xF0, 0x02, 0x7E, 0xF7]
        );
    }

    #[test]
    fn test_status_byte_in_data_position_starts_next_event() {
        // Second note-on loses its velocity to the end-of-track status
        let file = smf(
            0,
            96,
            &[track(&[&[0x00, 0x90, 60, 100], &[0x10, 0x90, 62], &[0xFF, 0x2F, 0x00]])],
        );
        let out = sanitize(&file).unwrap();
        assert_eq!(
            track_bodies(&out.bytes)[0],
            vec![0x00, 0x90, 60, 100, 0x10, 0xFF, 0x2F, 0x00]
        );
        assert_eq!(out.stats.dropped_events, 1);
    }

    #[test]
    fn test_system_common_dropped_and_delta_kept() {
        let file = smf(0, 96, &[track(&[&[0x10, 0xF2, 0x01, 0x02], &[0x20, 0x90, 60, 100]])]);
        let out = sanitize(&file).unwrap();
        assert_eq!(track_bodies(&out.bytes)[0], vec![0x30, 0x90, 60, 100]);
        assert_eq!(out.stats.dropped_events, 1);
    }
}
