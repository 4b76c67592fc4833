//! Fixed-length serial number shared by the system task, the G-code layer and
//! the persistence policy.

/// Number of bytes reserved for the serial number in non-volatile storage.
pub const SERIAL_NUMBER_LENGTH: usize = 24;

/// Serial number bytes, zero padded on the right.
pub type SerialNumber = [u8; SERIAL_NUMBER_LENGTH];

/// Reported when no serial number has ever been written.
pub const EMPTY_SERIAL_NUMBER: SerialNumber = padded(b"EMPTYSN");

const fn padded(text: &[u8]) -> SerialNumber {
    let mut out = [0u8; SERIAL_NUMBER_LENGTH];
    let mut i = 0;
    while i < text.len() && i < SERIAL_NUMBER_LENGTH {
        out[i] = text[i];
        i += 1;
    }
    out
}

/// Build a serial number from raw bytes.
///
/// Accepts 1 to [`SERIAL_NUMBER_LENGTH`] printable, non-space ASCII bytes.
pub fn serial_number_from_bytes(bytes: &[u8]) -> Option<SerialNumber> {
    if bytes.is_empty() || bytes.len() > SERIAL_NUMBER_LENGTH {
        return None;
    }
    if !bytes.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    Some(padded(bytes))
}

/// View the meaningful part of a serial number (everything before the padding).
pub fn serial_number_str(serial: &SerialNumber) -> &str {
    let len = serial
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(SERIAL_NUMBER_LENGTH);
    core::str::from_utf8(&serial[..len]).unwrap_or("")
}
