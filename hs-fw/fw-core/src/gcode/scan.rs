//! Byte-level scanning and writing helpers shared by every G-code descriptor.
//!
//! Nothing here allocates. Parsers work on a `&[u8]` window whose start is the
//! cursor and whose end is the limit. A helper that fails hands back the
//! window it was given so the caller can try the next candidate.

use core::fmt;
use core::str::FromStr;

/// A numeric type that can appear as a G-code parameter.
pub trait GcodeValue: FromStr + Copy {
    /// Whether a single `.` may appear inside the token.
    const FRACTIONAL: bool;
}

impl GcodeValue for u8 {
    const FRACTIONAL: bool = false;
}

impl GcodeValue for i16 {
    const FRACTIONAL: bool = false;
}

impl GcodeValue for i32 {
    const FRACTIONAL: bool = false;
}

impl GcodeValue for f32 {
    const FRACTIONAL: bool = true;
}

impl GcodeValue for f64 {
    const FRACTIONAL: bool = true;
}

/// Match a literal prefix at the start of the window.
///
/// Returns the bytes after the prefix, or `None` when the window is shorter
/// than the prefix or differs from it anywhere.
pub fn prefix_matches<'a>(input: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    input.strip_prefix(prefix)
}

/// Scan one numeric token from the start of the window.
///
/// Accepts an optional sign, decimal digits and (for fractional types) a
/// single decimal point. Scanning stops at the first byte that cannot be part
/// of the token. The token must contain at least one digit and must fit `T`.
///
/// # Returns
///
/// * `(Some(value), rest)` where `rest` starts right after the token
/// * `(None, input)` on failure, with the window untouched
pub fn parse_value<T: GcodeValue>(input: &[u8]) -> (Option<T>, &[u8]) {
    let mut end = 0;
    if matches!(input.first(), Some(b'-' | b'+')) {
        end = 1;
    }

    let mut digits = 0usize;
    let mut seen_point = false;
    while let Some(&byte) = input.get(end) {
        match byte {
            b'0'..=b'9' => digits += 1,
            b'.' if T::FRACTIONAL && !seen_point => seen_point = true,
            _ => break,
        }
        end += 1;
    }

    if digits == 0 {
        return (None, input);
    }

    let Ok(token) = core::str::from_utf8(&input[..end]) else {
        return (None, input);
    };
    match token.parse::<T>() {
        Ok(value) => (Some(value), &input[end..]),
        Err(_) => (None, input),
    }
}

/// True when the window is exhausted or the next byte is ASCII whitespace.
pub fn at_token_boundary(input: &[u8]) -> bool {
    match input.first() {
        None => true,
        Some(byte) => byte.is_ascii_whitespace(),
    }
}

/// Drop leading spaces and tabs. Line terminators are kept.
pub fn skip_blanks(input: &[u8]) -> &[u8] {
    let start = input
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .unwrap_or(input.len());
    &input[start..]
}

/// True when the window holds nothing but an optional line terminator.
pub fn at_line_end(input: &[u8]) -> bool {
    matches!(input.first(), None | Some(b'\r' | b'\n'))
}

/// Copy as much of `text` as fits into `buf`.
///
/// Returns the number of bytes written; a value smaller than `text.len()`
/// means the buffer was too small.
pub fn write_str_into(buf: &mut [u8], text: &str) -> usize {
    let count = text.len().min(buf.len());
    buf[..count].copy_from_slice(&text.as_bytes()[..count]);
    count
}

/// Format into `buf`, truncating at the buffer end.
///
/// Returns the number of bytes actually written.
pub fn write_fmt_into(buf: &mut [u8], args: fmt::Arguments<'_>) -> usize {
    let mut writer = SliceWriter { buf, written: 0 };
    // A truncated write surfaces as a short count, not as an error.
    let _ = fmt::Write::write_fmt(&mut writer, args);
    writer.written
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let count = write_str_into(&mut self.buf[self.written..], s);
        self.written += count;
        if count < s.len() {
            Err(fmt::Error)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matches() {
        assert_eq!(prefix_matches(b"M104 S25", b"M104 S"), Some(&b"25"[..]));
        assert_eq!(prefix_matches(b"M10", b"M104 S"), None);
        assert_eq!(prefix_matches(b"m104 S25", b"M104 S"), None);
    }

    #[test]
    fn test_parse_value_integer() {
        let (value, rest) = parse_value::<i16>(b"-500 rest");
        assert_eq!(value, Some(-500));
        assert_eq!(rest, b" rest");

        let (value, rest) = parse_value::<i32>(b"+10000\n");
        assert_eq!(value, Some(10000));
        assert_eq!(rest, b"\n");
    }

    #[test]
    fn test_parse_value_stops_at_point_for_integers() {
        let (value, rest) = parse_value::<i16>(b"12.5");
        assert_eq!(value, Some(12));
        assert_eq!(rest, b".5");
    }

    #[test]
    fn test_parse_value_float() {
        let (value, rest) = parse_value::<f64>(b"1.02 I2.1");
        assert_eq!(value, Some(1.02));
        assert_eq!(rest, b" I2.1");

        let (value, _) = parse_value::<f64>(b".5");
        assert_eq!(value, Some(0.5));
    }

    #[test]
    fn test_parse_value_requires_digits() {
        let input = b"-.\n";
        let (value, rest) = parse_value::<f64>(input);
        assert_eq!(value, None);
        assert!(core::ptr::eq(rest, &input[..]));

        let input = b"abc";
        let (value, rest) = parse_value::<i32>(input);
        assert_eq!(value, None);
        assert!(core::ptr::eq(rest, &input[..]));
    }

    #[test]
    fn test_parse_value_out_of_range() {
        let input = b"40000";
        let (value, rest) = parse_value::<i16>(input);
        assert_eq!(value, None);
        assert_eq!(rest.len(), input.len());
    }

    #[test]
    fn test_write_str_into_truncates() {
        let mut buf = [0u8; 4];
        assert_eq!(write_str_into(&mut buf, "M3 OK\n"), 4);
        assert_eq!(&buf, b"M3 O");
    }

    #[test]
    fn test_write_fmt_into() {
        let mut buf = [0u8; 32];
        let written = write_fmt_into(&mut buf, format_args!("C{:.2} T{}", 24.306, 7));
        assert_eq!(&buf[..written], b"C24.31 T7");

        let mut small = [0u8; 5];
        let written = write_fmt_into(&mut small, format_args!("C{:.2} T{}", 24.306, 7));
        assert_eq!(written, 5);
        assert_eq!(&small, b"C24.3");
    }

    #[test]
    fn test_blanks_and_line_end() {
        assert_eq!(skip_blanks(b" \t M3"), b"M3");
        assert!(at_line_end(b"\r\n"));
        assert!(at_line_end(b""));
        assert!(!at_line_end(b"M3"));
        assert!(at_token_boundary(b" M123"));
        assert!(!at_token_boundary(b".D"));
    }
}
