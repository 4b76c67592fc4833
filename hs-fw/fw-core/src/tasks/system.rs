//! System task: serial number storage and version reporting.

use log::{debug, warn};

use super::{RegistrySlot, SystemQueue, Tasks};
use crate::error::ErrorCode;
use crate::messages::{HostCommsMessage, SystemMessage};
use crate::queue::Stopped;
use crate::serial_number::{EMPTY_SERIAL_NUMBER, SerialNumber};

/// Version of this firmware build.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hardware access needed by the system task.
pub trait SystemPolicy {
    /// Persist `serial_number`. On failure the previous value stays readable.
    fn set_serial_number(&mut self, serial_number: SerialNumber) -> Result<(), ErrorCode>;
    /// The stored serial number, if one was ever written.
    fn serial_number(&self) -> Option<SerialNumber>;
    /// Board revision reported by `M115`.
    fn hardware_version(&self) -> &'static str;
}

/// Owns serial number storage and answers version queries.
pub struct SystemTask<'a, P: SystemPolicy> {
    queue: &'a SystemQueue,
    registry: RegistrySlot<'a>,
    policy: P,
}

impl<'a, P: SystemPolicy> SystemTask<'a, P> {
    /// Create a system task over the given storage.
    ///
    /// # Arguments
    ///
    /// * `queue` - The queue this task receives on
    /// * `policy` - Access to serial number storage and board identity
    pub fn new(queue: &'a SystemQueue, policy: P) -> Self {
        Self {
            queue,
            registry: RegistrySlot::new("system"),
            policy,
        }
    }

    /// Wire the task registry used for replies. Only the first call takes effect.
    pub fn provide_tasks(&mut self, tasks: &'a Tasks<'a>) {
        self.registry.provide(tasks);
    }

    /// The storage policy, for inspection.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Handle at most one message, waiting up to one idle tick for it.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - A message was handled or the tick elapsed
    /// * `Err(Stopped)` - The task was asked to stop
    pub async fn run_once(&mut self) -> Result<(), Stopped> {
        if let Some(message) = self.queue.recv().await? {
            self.handle(message);
        }
        Ok(())
    }

    fn handle(&mut self, message: SystemMessage) {
        debug!("system: {message:?}");
        let reply = match message {
            SystemMessage::SetSerialNumber { id, serial_number } => {
                let result = match serial_number {
                    Some(serial_number) => self.policy.set_serial_number(serial_number),
                    None => Err(ErrorCode::SerialNumberInvalid),
                };
                if let Err(code) = result {
                    warn!("system: serial number not written: {code}");
                }
                HostCommsMessage::ack_result(id, result)
            }
            SystemMessage::GetSystemInfo { id } => HostCommsMessage::GetSystemInfoResponse {
                responding_to_id: id,
                serial_number: self.policy.serial_number().unwrap_or(EMPTY_SERIAL_NUMBER),
                firmware_version: FIRMWARE_VERSION,
                hardware_version: self.policy.hardware_version(),
            },
        };
        self.registry.reply(reply);
    }
}
