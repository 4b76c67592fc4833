//! Host communications task.
//!
//! Parses lines from the host into G-codes, forwards each one to the task
//! that owns it, and turns the eventual acknowledgements back into reply
//! text. Every forwarded command is remembered in a small cache keyed by its
//! correlation id until the matching reply arrives.

use log::{debug, trace, warn};

use super::{COMMS_QUEUE_DEPTH, CommsQueue, RegistrySlot, Tasks};
use crate::ACK_CACHE_SIZE;
use crate::error::ErrorCode;
use crate::gcode::scan::{at_line_end, skip_blanks};
use crate::gcode::{
    GetRpm, GetSystemInfo, GetTemperature, GetTemperatureDebug, Gcode, ParseOutcome, parse_gcode,
};
use crate::messages::{HeaterMessage, HostCommsMessage, HostLine, MotorMessage, SystemMessage};
use crate::queue::{QueueFull, Stopped};

/// Comms queue slots host input may never take: one per cacheable reply,
/// plus room for unsolicited error reports.
pub const REPLY_HEADROOM: usize = ACK_CACHE_SIZE + 2;
const _: () = assert!(REPLY_HEADROOM < COMMS_QUEUE_DEPTH);

/// Queue one line of host input for the comms task.
///
/// Host input is refused while fewer than [`REPLY_HEADROOM`] slots would
/// stay free, so replies to commands already in flight always fit. The
/// serial receive path is the only caller.
///
/// # Returns
///
/// * `Ok(())` - The line was queued
/// * `Err(QueueFull)` - The line was not queued; the host should retry later
pub fn submit_host_line(queue: &CommsQueue, line: HostLine) -> Result<(), QueueFull> {
    queue.try_send_with_headroom(HostCommsMessage::IncomingMessageFromHost(line), REPLY_HEADROOM)
}

/// Commands waiting for their reply, keyed by correlation id.
pub struct AckCache<const N: usize> {
    entries: heapless::Vec<(u32, Gcode), N>,
}

impl<const N: usize> AckCache<N> {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Remember `gcode` under `id`. Fails when the cache is full.
    pub fn insert(&mut self, id: u32, gcode: Gcode) -> Result<(), Gcode> {
        self.entries.push((id, gcode)).map_err(|(_, gcode)| gcode)
    }

    /// Remove and return the entry for `id`.
    pub fn take(&mut self, id: u32) -> Option<Gcode> {
        let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
        Some(self.entries.swap_remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<const N: usize> Default for AckCache<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HostCommsTask<'a> {
    queue: &'a CommsQueue,
    registry: RegistrySlot<'a>,
    ack_cache: AckCache<ACK_CACHE_SIZE>,
    next_id: u32,
}

impl<'a> HostCommsTask<'a> {
    pub fn new(queue: &'a CommsQueue) -> Self {
        Self {
            queue,
            registry: RegistrySlot::new("comms"),
            ack_cache: AckCache::new(),
            next_id: 0,
        }
    }

    pub fn provide_tasks(&mut self, tasks: &'a Tasks<'a>) {
        self.registry.provide(tasks);
    }

    /// Number of commands still waiting for a reply.
    pub fn pending_replies(&self) -> usize {
        self.ack_cache.len()
    }

    /// Handle one inbound message and write any reply text into `tx`.
    ///
    /// Returns the number of bytes written, which is zero when the message
    /// produced no host-visible output or the tick period elapsed.
    pub async fn run_once(&mut self, tx: &mut [u8]) -> Result<usize, Stopped> {
        let Some(message) = self.queue.recv().await? else {
            return Ok(0);
        };
        let written = self.handle(message, tx);
        if written > 0 && written == tx.len() {
            warn!("comms: reply filled the {written}-byte buffer and may be truncated");
        }
        Ok(written)
    }

    fn handle(&mut self, message: HostCommsMessage, tx: &mut [u8]) -> usize {
        match message {
            HostCommsMessage::IncomingMessageFromHost(line) => self.handle_line(&line, tx),
            HostCommsMessage::AcknowledgePrevious {
                responding_to_id,
                with_error,
            } => self.handle_ack(responding_to_id, with_error, tx),
            HostCommsMessage::ErrorMessage { code } => {
                debug!("comms: unsolicited {code}");
                code.write_into(tx)
            }
            HostCommsMessage::GetTemperatureResponse {
                responding_to_id,
                current,
                setpoint,
            } => match self.ack_cache.take(responding_to_id) {
                Some(Gcode::GetTemperature(_)) => {
                    GetTemperature::write_response_into(tx, current, setpoint)
                }
                other => Self::bad_ack(responding_to_id, other, tx),
            },
            HostCommsMessage::GetTemperatureDebugResponse {
                responding_to_id,
                report,
            } => match self.ack_cache.take(responding_to_id) {
                Some(Gcode::GetTemperatureDebug(_)) => {
                    GetTemperatureDebug::write_response_into(tx, &report)
                }
                other => Self::bad_ack(responding_to_id, other, tx),
            },
            HostCommsMessage::GetRpmResponse {
                responding_to_id,
                current_rpm,
                setpoint_rpm,
            } => match self.ack_cache.take(responding_to_id) {
                Some(Gcode::GetRpm(_)) => GetRpm::write_response_into(tx, current_rpm, setpoint_rpm),
                other => Self::bad_ack(responding_to_id, other, tx),
            },
            HostCommsMessage::GetSystemInfoResponse {
                responding_to_id,
                serial_number,
                firmware_version,
                hardware_version,
            } => match self.ack_cache.take(responding_to_id) {
                Some(Gcode::GetSystemInfo(_)) => GetSystemInfo::write_response_into(
                    tx,
                    firmware_version,
                    hardware_version,
                    &serial_number,
                ),
                other => Self::bad_ack(responding_to_id, other, tx),
            },
        }
    }

    fn handle_line(&mut self, line: &[u8], tx: &mut [u8]) -> usize {
        let mut input = line;
        let mut written = 0;
        loop {
            input = skip_blanks(input);
            if at_line_end(input) {
                break;
            }
            match parse_gcode(input) {
                ParseOutcome::Parsed(gcode, rest) => {
                    trace!("comms: parsed {gcode:?}");
                    if let Err(code) = self.dispatch(gcode) {
                        written += code.write_into(&mut tx[written..]);
                    }
                    input = rest;
                }
                ParseOutcome::Incomplete | ParseOutcome::Unrecognized => {
                    debug!("comms: unhandled input {:?}", core::str::from_utf8(input));
                    written += ErrorCode::UnhandledGcode.write_into(&mut tx[written..]);
                    break;
                }
            }
        }
        written
    }

    /// Cache `gcode` and forward it to its owning task.
    fn dispatch(&mut self, gcode: Gcode) -> Result<(), ErrorCode> {
        let id = self.next_id;
        if self.ack_cache.insert(id, gcode).is_err() {
            warn!("comms: reply cache full, rejecting {gcode:?}");
            return Err(ErrorCode::GcodeCacheFull);
        }
        self.next_id = self.next_id.wrapping_add(1);

        if self.route(id, gcode).is_err() {
            warn!("comms: could not deliver {gcode:?}");
            self.ack_cache.take(id);
            return Err(ErrorCode::InternalQueueFull);
        }
        Ok(())
    }

    fn route(&self, id: u32, gcode: Gcode) -> Result<(), QueueFull> {
        let Some(tasks) = self.registry.get() else {
            warn!("comms: no task registry");
            return Err(QueueFull);
        };
        match gcode {
            Gcode::SetTemperature(cmd) => tasks.heater.try_send(HeaterMessage::SetTemperature {
                id,
                target: cmd.temperature,
            }),
            Gcode::GetTemperature(_) => tasks.heater.try_send(HeaterMessage::GetTemperature { id }),
            Gcode::GetTemperatureDebug(_) => {
                tasks.heater.try_send(HeaterMessage::GetTemperatureDebug { id })
            }
            Gcode::SetHeaterPidConstants(cmd) => {
                tasks.heater.try_send(HeaterMessage::SetPidConstants {
                    id,
                    kp: cmd.kp,
                    ki: cmd.ki,
                    kd: cmd.kd,
                })
            }
            Gcode::SetHeaterPowerTest(cmd) => tasks.heater.try_send(HeaterMessage::SetPowerTest {
                id,
                power: cmd.power,
            }),
            Gcode::SetRpm(cmd) => tasks.motor.try_send(MotorMessage::SetRpm { id, rpm: cmd.rpm }),
            Gcode::GetRpm(_) => tasks.motor.try_send(MotorMessage::GetRpm { id }),
            Gcode::SetAcceleration(cmd) => tasks.motor.try_send(MotorMessage::SetAcceleration {
                id,
                rpm_per_s: cmd.rpm_per_s,
            }),
            Gcode::ActuateSolenoid(cmd) => tasks.motor.try_send(MotorMessage::ActuateSolenoid {
                id,
                engage: cmd.engage,
            }),
            Gcode::SetSerialNumber(cmd) => tasks.system.try_send(SystemMessage::SetSerialNumber {
                id,
                serial_number: cmd.serial_number,
            }),
            Gcode::GetSystemInfo(_) => tasks.system.try_send(SystemMessage::GetSystemInfo { id }),
        }
    }

    fn handle_ack(&mut self, id: u32, with_error: Option<ErrorCode>, tx: &mut [u8]) -> usize {
        let Some(gcode) = self.ack_cache.take(id) else {
            return Self::bad_ack(id, None, tx);
        };
        if let Some(code) = with_error {
            debug!("comms: {gcode:?} failed with {code}");
            return code.write_into(tx);
        }
        match gcode.write_ack_into(tx) {
            Some(written) => written,
            None => Self::bad_ack(id, Some(gcode), tx),
        }
    }

    fn bad_ack(id: u32, pending: Option<Gcode>, tx: &mut [u8]) -> usize {
        warn!("comms: acknowledgement {id} does not match pending {pending:?}");
        ErrorCode::BadMessageAcknowledgement.write_into(tx)
    }
}
