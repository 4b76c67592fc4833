//! Messages exchanged between tasks.
//!
//! Every task has its own inbound enum. Requests carry the correlation `id`
//! assigned by the communications task; the handling task answers with
//! exactly one [`HostCommsMessage`] referencing it.

use crate::error::ErrorCode;
use crate::gcode::TemperatureDebugReport;
use crate::serial_number::SerialNumber;

/// Maximum length of one line received from the host.
pub const RX_LINE_LENGTH: usize = 128;

/// One line of host input, owned by the message that carries it.
pub type HostLine = heapless::Vec<u8, RX_LINE_LENGTH>;

/// Copy `bytes` into a [`HostLine`], or `None` if it does not fit.
pub fn host_line(bytes: &[u8]) -> Option<HostLine> {
    HostLine::from_slice(bytes).ok()
}

/// Inbound messages of the communications task.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommsMessage {
    IncomingMessageFromHost(HostLine),
    /// Completion of a command that replies with a fixed acknowledgement.
    AcknowledgePrevious {
        responding_to_id: u32,
        with_error: Option<ErrorCode>,
    },
    /// Unsolicited error, not tied to any pending command.
    ErrorMessage { code: ErrorCode },
    GetTemperatureResponse {
        responding_to_id: u32,
        current: f64,
        setpoint: f64,
    },
    GetTemperatureDebugResponse {
        responding_to_id: u32,
        report: TemperatureDebugReport,
    },
    GetRpmResponse {
        responding_to_id: u32,
        current_rpm: i16,
        setpoint_rpm: i16,
    },
    GetSystemInfoResponse {
        responding_to_id: u32,
        serial_number: SerialNumber,
        firmware_version: &'static str,
        hardware_version: &'static str,
    },
}

impl HostCommsMessage {
    /// A successful acknowledgement for `id`.
    pub fn ack(id: u32) -> Self {
        Self::AcknowledgePrevious {
            responding_to_id: id,
            with_error: None,
        }
    }

    /// An acknowledgement for `id` carrying the outcome of a fallible effect.
    pub fn ack_result(id: u32, result: Result<(), ErrorCode>) -> Self {
        Self::AcknowledgePrevious {
            responding_to_id: id,
            with_error: result.err(),
        }
    }

    /// The correlation id this message answers, if it answers one.
    pub fn responding_to_id(&self) -> Option<u32> {
        match self {
            Self::IncomingMessageFromHost(_) | Self::ErrorMessage { .. } => None,
            Self::AcknowledgePrevious {
                responding_to_id, ..
            }
            | Self::GetTemperatureResponse {
                responding_to_id, ..
            }
            | Self::GetTemperatureDebugResponse {
                responding_to_id, ..
            }
            | Self::GetRpmResponse {
                responding_to_id, ..
            }
            | Self::GetSystemInfoResponse {
                responding_to_id, ..
            } => Some(*responding_to_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaterMessage {
    SetTemperature { id: u32, target: f64 },
    GetTemperature { id: u32 },
    GetTemperatureDebug { id: u32 },
    SetPidConstants { id: u32, kp: f64, ki: f64, kd: f64 },
    SetPowerTest { id: u32, power: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorMessage {
    SetRpm { id: u32, rpm: i16 },
    GetRpm { id: u32 },
    SetAcceleration { id: u32, rpm_per_s: i32 },
    ActuateSolenoid { id: u32, engage: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMessage {
    /// `None` when the host sent a value that is not a valid serial number.
    SetSerialNumber {
        id: u32,
        serial_number: Option<SerialNumber>,
    },
    GetSystemInfo { id: u32 },
}
