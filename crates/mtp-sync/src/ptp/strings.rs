//! String conversion between host UTF-8 and the device's UTF-16LE representation.
//!
//! A PTP string is a `u8` count of UTF-16 code units (including the NUL terminator),
//! followed by the units. The empty string is a single zero byte.

use bytes::{Buf, BufMut};
use log::debug;

use super::container::CodecError;

/// Longest string a PTP length byte can describe, not counting the terminator.
pub const MAX_STRING_UNITS: usize = 254;

/// Converts device UTF-16 to a host string. Stops at the first NUL and replaces unpaired surrogates.
pub fn to_host_string(units: &[u16]) -> String {
    let end = units.iter().position(|u| *u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

/// Converts a host string to device UTF-16 code units, without a terminator.
pub fn to_wire_string(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// True if `s` can be written as a PTP string without truncation.
pub fn fits_ptp_string(s: &str) -> bool {
    s.encode_utf16().count() <= MAX_STRING_UNITS
}

/// Appends `s` as a PTP string. Longer strings are cut at [`MAX_STRING_UNITS`] without
/// splitting a surrogate pair.
pub fn write_ptp_string(buf: &mut impl BufMut, s: &str) {
    let mut units = to_wire_string(s);
    if units.is_empty() {
        buf.put_u8(0);
        return;
    }
    if units.len() > MAX_STRING_UNITS {
        debug!(
            "PTP string of {} UTF-16 units truncated to {}: {:?}",
            units.len(),
            MAX_STRING_UNITS,
            s
        );
        units.truncate(MAX_STRING_UNITS);
        if let Some(last) = units.last()
            && (0xD800..=0xDBFF).contains(last)
        {
            units.pop();
        }
    }
    // At most 254 units plus the terminator, so this fits a u8
    buf.put_u8((units.len() + 1) as u8);
    for unit in units {
        buf.put_u16_le(unit);
    }
    buf.put_u16_le(0);
}

/// Reads a PTP string from `buf`, advancing past it.
pub fn read_ptp_string(buf: &mut impl Buf) -> Result<String, CodecError> {
    if !buf.has_remaining() {
        return Err(CodecError::new("string length byte missing"));
    }
    let count = buf.get_u8() as usize;
    if count == 0 {
        return Ok(String::new());
    }
    if buf.remaining() < count * 2 {
        return Err(CodecError::new(format!(
            "string needs {} bytes, {} remaining",
            count * 2,
            buf.remaining()
        )));
    }
    let units: Vec<u16> = (0..count).map(|_| buf.get_u16_le()).collect();
    Ok(to_host_string(&units))
}
