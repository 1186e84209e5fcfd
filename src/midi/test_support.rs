//! Hand-assembled SMF buffers for unit tests.

/// Concatenates raw `(delta, event)` byte groups into a track body.
pub fn track(events: &[&[u8]]) -> Vec<u8> {
    events.iter().flat_map(|e| e.iter().copied()).collect()
}

/// Builds a complete file from a format, division and track bodies.
pub fn smf(format: u16, ticks_per_beat: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&format.to_be_bytes());
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&ticks_per_beat.to_be_bytes());
    for body in tracks {
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
    }
    out
}

/// Note-on at `delta` ticks after the previous event, channel 0.
pub fn note_on(delta: u8, key: u8, velocity: u8) -> Vec<u8> {
    vec![delta, 0x90, key, velocity]
}

/// Tempo meta event in µs per quarter note.
pub fn tempo(delta: u8, micros: u32) -> Vec<u8> {
    vec![
        delta,
        0xFF,
        0x51,
        0x03,
        (micros >> 16) as u8,
        (micros >> 8) as u8,
        micros as u8,
    ]
}

/// End-of-track meta event.
pub fn end_of_track() -> Vec<u8> {
    vec![0x00, 0xFF, 0x2F, 0x00]
}

/// Builds a track body from owned event byte groups, appending end-of-track.
pub fn track_of(events: Vec<Vec<u8>>) -> Vec<u8> {
    let mut body: Vec<u8> = events.into_iter().flatten().collect();
    body.extend(end_of_track());
    body
}
