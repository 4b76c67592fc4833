//! Firmware tasks and the registry that connects them.
//!
//! Startup is two-phase: every queue is created first, then the [`Tasks`]
//! registry is built over them, then each task is handed the registry with
//! `provide_tasks`. A task only ever receives from its own queue and sends to
//! the others through the registry.

pub mod comms;
pub mod heater;
pub mod motor;
pub mod system;

use embassy_time::Duration;
use log::warn;

use crate::messages::{HeaterMessage, HostCommsMessage, MotorMessage, SystemMessage};
use crate::queue::TaskQueue;

pub use comms::HostCommsTask;
pub use heater::{HeaterPolicy, HeaterTask, TemperatureReading, TemperatureReadings};
pub use motor::{MotorPolicy, MotorTask};
pub use system::{SystemPolicy, SystemTask};

pub const COMMS_QUEUE_DEPTH: usize = 16;
pub const HEATER_QUEUE_DEPTH: usize = 8;
pub const MOTOR_QUEUE_DEPTH: usize = 8;
pub const SYSTEM_QUEUE_DEPTH: usize = 4;

/// Heater control loop period.
pub const CONTROL_PERIOD: Duration = Duration::from_millis(100);
/// Wake-up period of tasks without periodic work.
pub const IDLE_TICK: Duration = Duration::from_secs(1);

pub type CommsQueue = TaskQueue<HostCommsMessage, COMMS_QUEUE_DEPTH>;
pub type HeaterQueue = TaskQueue<HeaterMessage, HEATER_QUEUE_DEPTH>;
pub type MotorQueue = TaskQueue<MotorMessage, MOTOR_QUEUE_DEPTH>;
pub type SystemQueue = TaskQueue<SystemMessage, SYSTEM_QUEUE_DEPTH>;

/// Storage for every task queue, suitable for a `static`.
pub struct Queues {
    pub comms: CommsQueue,
    pub heater: HeaterQueue,
    pub motor: MotorQueue,
    pub system: SystemQueue,
}

impl Queues {
    pub const fn new() -> Self {
        Self {
            comms: CommsQueue::new(IDLE_TICK),
            heater: HeaterQueue::new(CONTROL_PERIOD),
            motor: MotorQueue::new(IDLE_TICK),
            system: SystemQueue::new(IDLE_TICK),
        }
    }

    pub fn tasks(&self) -> Tasks<'_> {
        Tasks::new(&self.comms, &self.heater, &self.motor, &self.system)
    }
}

impl Default for Queues {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only directory of every task's inbound queue.
#[derive(Clone, Copy)]
pub struct Tasks<'a> {
    pub comms: &'a CommsQueue,
    pub heater: &'a HeaterQueue,
    pub motor: &'a MotorQueue,
    pub system: &'a SystemQueue,
}

impl<'a> Tasks<'a> {
    pub fn new(
        comms: &'a CommsQueue,
        heater: &'a HeaterQueue,
        motor: &'a MotorQueue,
        system: &'a SystemQueue,
    ) -> Self {
        Self {
            comms,
            heater,
            motor,
            system,
        }
    }

    /// Ask every task to leave its `run_once` loop.
    pub fn request_stop_all(&self) {
        self.comms.request_stop();
        self.heater.request_stop();
        self.motor.request_stop();
        self.system.request_stop();
    }
}

/// A task's handle on the registry. Set once; later attempts are ignored.
pub(crate) struct RegistrySlot<'a> {
    owner: &'static str,
    tasks: Option<&'a Tasks<'a>>,
}

impl<'a> RegistrySlot<'a> {
    pub(crate) const fn new(owner: &'static str) -> Self {
        Self { owner, tasks: None }
    }

    pub(crate) fn provide(&mut self, tasks: &'a Tasks<'a>) {
        if self.tasks.is_some() {
            warn!("{}: task registry already provided, ignoring", self.owner);
            return;
        }
        self.tasks = Some(tasks);
    }

    pub(crate) fn get(&self) -> Option<&'a Tasks<'a>> {
        self.tasks
    }

    /// Send a reply to the communications task.
    ///
    /// Undeliverable replies are logged and dropped; the sender never blocks
    /// and never retries.
    pub(crate) fn reply(&self, message: HostCommsMessage) {
        let owner = self.owner;
        let Some(tasks) = self.tasks else {
            warn!("{owner}: no task registry, dropping {message:?}");
            return;
        };
        if tasks.comms.try_send(message).is_err() {
            warn!("{owner}: comms queue full, dropping reply");
        }
    }
}
