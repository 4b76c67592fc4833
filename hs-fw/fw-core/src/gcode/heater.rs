//! G-codes owned by the heater task.

use super::scan::{
    at_token_boundary, parse_value, prefix_matches, write_fmt_into, write_str_into,
};

/// `M104 S<temp>`: set the heater target temperature in °C.
///
/// Example: `M104 S25` sets the target to 25 °C. Negative targets are
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetTemperature {
    pub temperature: f64,
}

impl SetTemperature {
    pub const PREFIX: &'static [u8] = b"M104 S";
    pub const RESPONSE: &'static str = "M104 OK\n";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let Some(working) = prefix_matches(input, Self::PREFIX) else {
            return (None, input);
        };
        match parse_value::<f64>(working) {
            (Some(temperature), rest) if temperature >= 0.0 => (Some(Self { temperature }), rest),
            _ => (None, input),
        }
    }

    pub fn write_response_into(buf: &mut [u8]) -> usize {
        write_str_into(buf, Self::RESPONSE)
    }
}

/// `M105`: report current and target temperature.
///
/// Must be followed by whitespace or the end of input so that `M105.D` and
/// friends never parse as this command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GetTemperature;

impl GetTemperature {
    pub const PREFIX: &'static [u8] = b"M105";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        match prefix_matches(input, Self::PREFIX) {
            Some(rest) if at_token_boundary(rest) => (Some(Self), rest),
            _ => (None, input),
        }
    }

    /// Write `M105 C<current> T<setpoint> OK\n` with two decimals per field.
    pub fn write_response_into(buf: &mut [u8], current: f64, setpoint: f64) -> usize {
        write_fmt_into(buf, format_args!("M105 C{current:.2} T{setpoint:.2} OK\n"))
    }
}

/// `M105.D`: debug dump of every temperature channel and its raw ADC value.
///
/// Fields in the reply:
/// - `AT`/`BT`: pad A and pad B temperature
/// - `OT`: board temperature
/// - `AD`/`BD`/`OD`: last ADC readings for the same channels
/// - `PG`: heater power-good line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GetTemperatureDebug;

/// Values rendered by [`GetTemperatureDebug::write_response_into`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureDebugReport {
    pub pad_a_temperature: f64,
    pub pad_b_temperature: f64,
    pub board_temperature: f64,
    pub pad_a_adc: u16,
    pub pad_b_adc: u16,
    pub board_adc: u16,
    pub power_good: bool,
}

impl GetTemperatureDebug {
    pub const PREFIX: &'static [u8] = b"M105.D";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        match prefix_matches(input, Self::PREFIX) {
            Some(rest) => (Some(Self), rest),
            None => (None, input),
        }
    }

    pub fn write_response_into(buf: &mut [u8], report: &TemperatureDebugReport) -> usize {
        let TemperatureDebugReport {
            pad_a_temperature,
            pad_b_temperature,
            board_temperature,
            pad_a_adc,
            pad_b_adc,
            board_adc,
            power_good,
        } = *report;
        let power_good = u8::from(power_good);
        write_fmt_into(
            buf,
            format_args!(
                "M105.D AT{pad_a_temperature:.2} BT{pad_b_temperature:.2} OT{board_temperature:.2} \
                 AD{pad_a_adc} BD{pad_b_adc} OD{board_adc} PG{power_good} OK\n"
            ),
        )
    }
}

/// `M301 P<kp> I<ki> D<kd>`: replace the heater PID gains.
///
/// All three gains are required, in that order. Example:
/// `M301 P1.02 I2.1 D1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetHeaterPidConstants {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl SetHeaterPidConstants {
    pub const PREFIX: &'static [u8] = b"M301 P";
    pub const RESPONSE: &'static str = "M301 OK\n";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        match Self::parse_gains(input) {
            Some((gains, rest)) => (Some(gains), rest),
            None => (None, input),
        }
    }

    fn parse_gains(input: &[u8]) -> Option<(Self, &[u8])> {
        let working = prefix_matches(input, Self::PREFIX)?;
        let (kp, working) = parse_value::<f64>(working);
        let working = prefix_matches(working, b" I")?;
        let (ki, working) = parse_value::<f64>(working);
        let working = prefix_matches(working, b" D")?;
        let (kd, rest) = parse_value::<f64>(working);
        Some((
            Self {
                kp: kp?,
                ki: ki?,
                kd: kd?,
            },
            rest,
        ))
    }

    pub fn write_response_into(buf: &mut [u8]) -> usize {
        write_str_into(buf, Self::RESPONSE)
    }
}

/// `M104.D S<power>`: drive the heater at a fixed power fraction.
///
/// The power must lie in `[0, 1]`. It is held until a fault, an `M104` or
/// another `M104.D`. Exactly 0 turns the heater off. While a power test is
/// active, `M105` reports the power fraction as its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetHeaterPowerTest {
    pub power: f64,
}

impl SetHeaterPowerTest {
    pub const PREFIX: &'static [u8] = b"M104.D S";
    pub const RESPONSE: &'static str = "M104.D OK\n";

    pub fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let Some(working) = prefix_matches(input, Self::PREFIX) else {
            return (None, input);
        };
        match parse_value::<f64>(working) {
            (Some(power), rest) if (0.0..=1.0).contains(&power) => (Some(Self { power }), rest),
            _ => (None, input),
        }
    }

    pub fn write_response_into(buf: &mut [u8]) -> usize {
        write_str_into(buf, Self::RESPONSE)
    }
}
