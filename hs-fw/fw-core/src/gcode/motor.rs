//! G-codes owned by the motor task.

use super::scan::{parse_value, prefix_matches, write_fmt_into, write_str_into};

/// `M3 S<rpm>`: set the spindle target speed (standard spindle-speed code).
///
/// Example: `M3 S500`. Speed limits are enforced by the motor policy, not the
/// parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetRpm {
    pub rpm: i16,
}

impl SetRpm {
    pub const PREFIX: &'static [u8] = b"M3 S";
    pub const RESPONSE: &'static str = "M3 OK\n";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let Some(working) = prefix_matches(input, Self::PREFIX) else {
            return (None, input);
        };
        match parse_value::<i16>(working) {
            (Some(rpm), rest) => (Some(Self { rpm }), rest),
            (None, _) => (None, input),
        }
    }

    pub fn write_response_into(buf: &mut [u8]) -> usize {
        write_str_into(buf, Self::RESPONSE)
    }
}

/// `M123`: report current and target spindle speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetRpm;

impl GetRpm {
    pub const PREFIX: &'static [u8] = b"M123";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        match prefix_matches(input, Self::PREFIX) {
            Some(rest) => (Some(Self), rest),
            None => (None, input),
        }
    }

    pub fn write_response_into(buf: &mut [u8], current_rpm: i16, setpoint_rpm: i16) -> usize {
        write_fmt_into(
            buf,
            format_args!("M123 C{current_rpm} T{setpoint_rpm} OK\n"),
        )
    }
}

/// `M204 S<rpm/s>`: set the ramp rate used while changing speed.
///
/// The spindle follows this rate for most of a speed change; blending into
/// constant-speed control may deviate from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetAcceleration {
    pub rpm_per_s: i32,
}

impl SetAcceleration {
    pub const PREFIX: &'static [u8] = b"M204 S";
    pub const RESPONSE: &'static str = "M204 OK\n";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let Some(working) = prefix_matches(input, Self::PREFIX) else {
            return (None, input);
        };
        match parse_value::<i32>(working) {
            (Some(rpm_per_s), rest) => (Some(Self { rpm_per_s }), rest),
            (None, _) => (None, input),
        }
    }

    pub fn write_response_into(buf: &mut [u8]) -> usize {
        write_str_into(buf, Self::RESPONSE)
    }
}

/// `M240.D S<0|1>`: engage (1) or release (0) the lid-lock solenoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuateSolenoid {
    pub engage: bool,
}

impl ActuateSolenoid {
    pub const PREFIX: &'static [u8] = b"M240.D S";
    pub const RESPONSE: &'static str = "M240.D OK\n";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let Some(working) = prefix_matches(input, Self::PREFIX) else {
            return (None, input);
        };
        match parse_value::<u8>(working) {
            (Some(0), rest) => (Some(Self { engage: false }), rest),
            (Some(1), rest) => (Some(Self { engage: true }), rest),
            _ => (None, input),
        }
    }

    pub fn write_response_into(buf: &mut [u8]) -> usize {
        write_str_into(buf, Self::RESPONSE)
    }
}
