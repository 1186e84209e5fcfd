//! Variable-length quantities (VLQ) as used for delta times and
//! meta/sysex lengths in Standard MIDI Files.
//!
//! VLQ encodes values using 7 bits per byte, big-endian, with the MSB
//! indicating whether more bytes follow (1 = more bytes, 0 = last byte).

/// Maximum number of bytes a VLQ may span in a MIDI file.
pub const MAX_VLQ_BYTES: usize = 4;

/// Largest value representable in [`MAX_VLQ_BYTES`] bytes.
pub const MAX_VLQ_VALUE: u32 = 0x0FFF_FFFF;

/// Writes a variable-length quantity to the end of `buffer`.
///
/// Values above [`MAX_VLQ_VALUE`] still encode (as 5 bytes), but no value
/// produced by [`read_vlq`] ever needs that.
pub fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    if value == 0 {
        buffer.push(0);
        return;
    }

    let mut temp = value;
    let mut bytes = [0u8; 5];
    let mut len = 0;

    while temp > 0 {
        bytes[len] = (temp & 0x7F) as u8;
        temp >>= 7;
        len += 1;
    }

    // Most significant group first, continuation bit on all but the last
    for i in (0..len).rev() {
        if i > 0 {
            buffer.push(bytes[i] | 0x80);
        } else {
            buffer.push(bytes[i]);
        }
    }
}

/// Reads a variable-length quantity starting at `pos`.
///
/// Returns the decoded value and the position just past its last byte.
/// Returns `None` when no terminating byte (high bit clear) is found within
/// [`MAX_VLQ_BYTES`] bytes or before the end of `data`; callers recover by
/// substituting zero and resuming one byte past `pos`.
pub fn read_vlq(data: &[u8], pos: usize) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    let end = data.len().min(pos.saturating_add(MAX_VLQ_BYTES));
    let mut cursor = pos;

    while cursor < end {
        let byte = data[cursor];
        cursor += 1;
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Some((value, cursor));
        }
    }

    None
}
