//! G-codes owned by the system task.

use super::scan::{at_token_boundary, prefix_matches, write_fmt_into, write_str_into};
use crate::serial_number::{SerialNumber, serial_number_from_bytes, serial_number_str};

/// `M115`: report firmware version, hardware version and serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetSystemInfo;

impl GetSystemInfo {
    pub const PREFIX: &'static [u8] = b"M115";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        match prefix_matches(input, Self::PREFIX) {
            Some(rest) if at_token_boundary(rest) => (Some(Self), rest),
            _ => (None, input),
        }
    }

    pub fn write_response_into(
        buf: &mut [u8],
        firmware_version: &str,
        hardware_version: &str,
        serial_number: &SerialNumber,
    ) -> usize {
        let serial = serial_number_str(serial_number);
        write_fmt_into(
            buf,
            format_args!("M115 FW:{firmware_version} HW:{hardware_version} SerialNo:{serial} OK\n"),
        )
    }
}

/// `M996 <serial>`: persist a new serial number.
///
/// The serial is the run of non-whitespace bytes after the prefix. An empty
/// run does not parse. A run that is too long or not printable ASCII parses
/// with `serial_number: None` so the write can be refused with
/// [`SerialNumberInvalid`](crate::ErrorCode::SerialNumberInvalid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSerialNumber {
    pub serial_number: Option<SerialNumber>,
}

impl SetSerialNumber {
    pub const PREFIX: &'static [u8] = b"M996 ";
    pub const RESPONSE: &'static str = "M996 OK\n";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let Some(working) = prefix_matches(input, Self::PREFIX) else {
            return (None, input);
        };
        let end = working
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(working.len());
        if end == 0 {
            return (None, input);
        }
        let serial_number = serial_number_from_bytes(&working[..end]);
        (Some(Self { serial_number }), &working[end..])
    }

    pub fn write_response_into(buf: &mut [u8]) -> usize {
        write_str_into(buf, Self::RESPONSE)
    }
}
