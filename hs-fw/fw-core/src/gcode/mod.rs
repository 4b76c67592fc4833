//! G-code command grammar and dispatch.
//!
//! Every supported command has its own descriptor type with a literal
//! `PREFIX`, a `parse` routine over a byte window and a `write_response_into`
//! routine over a bounded output buffer. [`parse_gcode`] tries the
//! descriptors in a fixed priority order and wraps the winner in [`Gcode`].
//!
//! Parsing never allocates and never consumes input on failure, so trying the
//! next candidate after a miss is always safe.

pub mod heater;
pub mod motor;
pub mod scan;
pub mod system;

pub use heater::{
    GetTemperature, GetTemperatureDebug, SetHeaterPidConstants, SetHeaterPowerTest,
    SetTemperature, TemperatureDebugReport,
};
pub use motor::{ActuateSolenoid, GetRpm, SetAcceleration, SetRpm};
pub use system::{GetSystemInfo, SetSerialNumber};

/// One parsed command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gcode {
    SetRpm(SetRpm),
    SetTemperature(SetTemperature),
    GetTemperature(GetTemperature),
    GetRpm(GetRpm),
    SetAcceleration(SetAcceleration),
    GetTemperatureDebug(GetTemperatureDebug),
    SetHeaterPidConstants(SetHeaterPidConstants),
    SetHeaterPowerTest(SetHeaterPowerTest),
    ActuateSolenoid(ActuateSolenoid),
    GetSystemInfo(GetSystemInfo),
    SetSerialNumber(SetSerialNumber),
}

/// Result of [`parse_gcode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParseOutcome<'a> {
    /// A command matched; the slice holds the unconsumed remainder.
    Parsed(Gcode, &'a [u8]),
    /// The window is empty or is the beginning of a known prefix.
    Incomplete,
    /// Nothing matched and more bytes cannot help.
    Unrecognized,
}

/// Literal prefixes in dispatch order.
///
/// A prefix that is a textual prefix of another must come after it
/// (`M105.D` before `M105`, `M104.D` before `M104`).
pub const DISPATCH_ORDER: [&[u8]; 11] = [
    GetTemperatureDebug::PREFIX,
    SetHeaterPowerTest::PREFIX,
    ActuateSolenoid::PREFIX,
    SetHeaterPidConstants::PREFIX,
    SetSerialNumber::PREFIX,
    GetSystemInfo::PREFIX,
    SetTemperature::PREFIX,
    GetTemperature::PREFIX,
    GetRpm::PREFIX,
    SetAcceleration::PREFIX,
    SetRpm::PREFIX,
];

fn lift<'a, T>(
    parsed: (Option<T>, &'a [u8]),
    wrap: impl FnOnce(T) -> Gcode,
) -> Option<(Gcode, &'a [u8])> {
    let (value, rest) = parsed;
    value.map(|value| (wrap(value), rest))
}

/// Parse the command at the start of `input`.
///
/// Candidates are tried in [`DISPATCH_ORDER`]; the first success wins.
pub fn parse_gcode(input: &[u8]) -> ParseOutcome<'_> {
    let parsed = lift(GetTemperatureDebug::parse(input), Gcode::GetTemperatureDebug)
        .or_else(|| lift(SetHeaterPowerTest::parse(input), Gcode::SetHeaterPowerTest))
        .or_else(|| lift(ActuateSolenoid::parse(input), Gcode::ActuateSolenoid))
        .or_else(|| lift(SetHeaterPidConstants::parse(input), Gcode::SetHeaterPidConstants))
        .or_else(|| lift(SetSerialNumber::parse(input), Gcode::SetSerialNumber))
        .or_else(|| lift(GetSystemInfo::parse(input), Gcode::GetSystemInfo))
        .or_else(|| lift(SetTemperature::parse(input), Gcode::SetTemperature))
        .or_else(|| lift(GetTemperature::parse(input), Gcode::GetTemperature))
        .or_else(|| lift(GetRpm::parse(input), Gcode::GetRpm))
        .or_else(|| lift(SetAcceleration::parse(input), Gcode::SetAcceleration))
        .or_else(|| lift(SetRpm::parse(input), Gcode::SetRpm));

    match parsed {
        Some((gcode, rest)) => ParseOutcome::Parsed(gcode, rest),
        None if could_complete(input) => ParseOutcome::Incomplete,
        None => ParseOutcome::Unrecognized,
    }
}

/// True when appending bytes to `input` could still produce a known prefix.
fn could_complete(input: &[u8]) -> bool {
    input.is_empty()
        || DISPATCH_ORDER
            .iter()
            .any(|prefix| input.len() < prefix.len() && prefix.starts_with(input))
}

impl Gcode {
    /// Write the fixed acknowledgement reply for commands that have one.
    ///
    /// Query commands reply with data carried by a response message and
    /// return `None` here.
    pub fn write_ack_into(&self, buf: &mut [u8]) -> Option<usize> {
        let written = match self {
            Gcode::SetRpm(_) => SetRpm::write_response_into(buf),
            Gcode::SetTemperature(_) => SetTemperature::write_response_into(buf),
            Gcode::SetAcceleration(_) => SetAcceleration::write_response_into(buf),
            Gcode::SetHeaterPidConstants(_) => SetHeaterPidConstants::write_response_into(buf),
            Gcode::SetHeaterPowerTest(_) => SetHeaterPowerTest::write_response_into(buf),
            Gcode::ActuateSolenoid(_) => ActuateSolenoid::write_response_into(buf),
            Gcode::SetSerialNumber(_) => SetSerialNumber::write_response_into(buf),
            Gcode::GetTemperature(_)
            | Gcode::GetRpm(_)
            | Gcode::GetTemperatureDebug(_)
            | Gcode::GetSystemInfo(_) => return None,
        };
        Some(written)
    }
}
