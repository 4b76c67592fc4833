//! Error codes reported to the host

use core::fmt;

use crate::gcode::scan::write_fmt_into;

/// Error reported over the wire as `ERR<code>:<description> OK\n`.
///
/// Codes below 100 belong to the communications layer, 1xx to the motor,
/// 2xx to the heater and 3xx to the system task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Input did not parse as any known G-code
    UnhandledGcode,
    /// Too many commands waiting for a reply
    GcodeCacheFull,
    /// The destination task's queue was full
    InternalQueueFull,
    /// An acknowledgement did not match any pending command
    BadMessageAcknowledgement,
    MotorIllegalSpeed,
    MotorIllegalRampRate,
    HeaterPadSensorFault,
    HeaterPadOvertemp,
    HeaterBoardSensorFault,
    HeaterPowerNotGood,
    HeaterHardwareError,
    SerialNumberInvalid,
    SerialNumberHalError,
}

impl ErrorCode {
    pub const fn code(self) -> u16 {
        match self {
            ErrorCode::UnhandledGcode => 1,
            ErrorCode::GcodeCacheFull => 2,
            ErrorCode::InternalQueueFull => 3,
            ErrorCode::BadMessageAcknowledgement => 4,
            ErrorCode::MotorIllegalSpeed => 101,
            ErrorCode::MotorIllegalRampRate => 102,
            ErrorCode::HeaterPadSensorFault => 201,
            ErrorCode::HeaterPadOvertemp => 202,
            ErrorCode::HeaterBoardSensorFault => 203,
            ErrorCode::HeaterPowerNotGood => 204,
            ErrorCode::HeaterHardwareError => 205,
            ErrorCode::SerialNumberInvalid => 301,
            ErrorCode::SerialNumberHalError => 302,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            ErrorCode::UnhandledGcode => "unhandled gcode",
            ErrorCode::GcodeCacheFull => "gcode response cache full",
            ErrorCode::InternalQueueFull => "internal queue full",
            ErrorCode::BadMessageAcknowledgement => "bad message acknowledgement",
            ErrorCode::MotorIllegalSpeed => "motor speed out of range",
            ErrorCode::MotorIllegalRampRate => "motor ramp rate out of range",
            ErrorCode::HeaterPadSensorFault => "heater pad thermistor fault",
            ErrorCode::HeaterPadOvertemp => "heater pad overtemperature",
            ErrorCode::HeaterBoardSensorFault => "heater board thermistor fault",
            ErrorCode::HeaterPowerNotGood => "heater power not good",
            ErrorCode::HeaterHardwareError => "heater hardware error",
            ErrorCode::SerialNumberInvalid => "serial number invalid",
            ErrorCode::SerialNumberHalError => "serial number write failed",
        }
    }

    /// Write the host-facing error line into `buf`.
    ///
    /// Returns the number of bytes written; short when `buf` is too small.
    pub fn write_into(self, buf: &mut [u8]) -> usize {
        write_fmt_into(buf, format_args!("{self} OK\n"))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERR{:03}:{}", self.code(), self.description())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ErrorCode {}
