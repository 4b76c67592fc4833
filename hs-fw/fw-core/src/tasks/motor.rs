//! Motor task: spindle speed, ramp rate and the lid-lock solenoid.

use log::debug;

use super::{MotorQueue, RegistrySlot, Tasks};
use crate::error::ErrorCode;
use crate::messages::{HostCommsMessage, MotorMessage};
use crate::queue::Stopped;

/// Ticks to wait after moving the solenoid before reporting completion.
pub const SOLENOID_SETTLE_TICKS: u16 = 10;

/// Hardware access needed by the motor task.
pub trait MotorPolicy {
    /// Start ramping toward `rpm`. Out-of-range speeds are rejected.
    fn set_rpm(&mut self, rpm: i16) -> Result<(), ErrorCode>;
    /// Measured spindle speed.
    fn current_rpm(&self) -> i16;
    /// Speed the spindle is ramping toward.
    fn target_rpm(&self) -> i16;
    /// Set the ramp rate in RPM per second.
    fn set_ramp_rate(&mut self, rpm_per_s: i32) -> Result<(), ErrorCode>;
    /// Energize the lid-lock solenoid.
    fn lid_solenoid_engage(&mut self);
    /// Release the lid-lock solenoid.
    fn lid_solenoid_disengage(&mut self);
    /// Block the task for `ticks` scheduler ticks.
    fn delay_ticks(&mut self, ticks: u16);
}

/// Owns the spindle motor and the lid-lock solenoid.
///
/// Every request is answered with exactly one reply to the comms task.
pub struct MotorTask<'a, P: MotorPolicy> {
    queue: &'a MotorQueue,
    registry: RegistrySlot<'a>,
    policy: P,
}

impl<'a, P: MotorPolicy> MotorTask<'a, P> {
    /// Create a motor task with the solenoid state left to the policy.
    ///
    /// # Arguments
    ///
    /// * `queue` - The queue this task receives on
    /// * `policy` - Hardware access for the motor and solenoid
    pub fn new(queue: &'a MotorQueue, policy: P) -> Self {
        Self {
            queue,
            registry: RegistrySlot::new("motor"),
            policy,
        }
    }

    /// Wire the task registry used for replies. Only the first call takes effect.
    pub fn provide_tasks(&mut self, tasks: &'a Tasks<'a>) {
        self.registry.provide(tasks);
    }

    /// The hardware policy, for inspection.
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

    fn handle(&mut self, message: MotorMessage) {
        debug!("motor: {message:?}");
        let reply = match message {
            MotorMessage::SetRpm { id, rpm } => {
                HostCommsMessage::ack_result(id, self.policy.set_rpm(rpm))
            }
            MotorMessage::SetAcceleration { id, rpm_per_s } => {
                HostCommsMessage::ack_result(id, self.policy.set_ramp_rate(rpm_per_s))
            }
            MotorMessage::GetRpm { id } => HostCommsMessage::GetRpmResponse {
                responding_to_id: id,
                current_rpm: self.policy.current_rpm(),
                setpoint_rpm: self.policy.target_rpm(),
            },
            MotorMessage::ActuateSolenoid { id, engage } => {
                if engage {
                    self.policy.lid_solenoid_engage();
                } else {
                    self.policy.lid_solenoid_disengage();
                }
                self.policy.delay_ticks(SOLENOID_SETTLE_TICKS);
                HostCommsMessage::ack(id)
            }
        };
        self.registry.reply(reply);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::tasks::Queues;
    use futures::executor::block_on;
    use std::vec::Vec;

    #[derive(Debug, PartialEq)]
    enum Call {
        SetRpm(i16),
        SetRampRate(i32),
        Engage,
        Disengage,
        Delay(u16),
    }

    #[derive(Default)]
    struct MockMotor {
        calls: Vec<Call>,
        current: i16,
        target: i16,
    }

    impl MotorPolicy for MockMotor {
        fn set_rpm(&mut self, rpm: i16) -> Result<(), ErrorCode> {
            self.calls.push(Call::SetRpm(rpm));
            if !(0..=3000).contains(&rpm) {
                return Err(ErrorCode::MotorIllegalSpeed);
            }
            self.target = rpm;
            Ok(())
        }

        fn current_rpm(&self) -> i16 {
            self.current
        }

        fn target_rpm(&self) -> i16 {
            self.target
        }

        fn set_ramp_rate(&mut self, rpm_per_s: i32) -> Result<(), ErrorCode> {
            self.calls.push(Call::SetRampRate(rpm_per_s));
            if rpm_per_s <= 0 {
                return Err(ErrorCode::MotorIllegalRampRate);
            }
            Ok(())
        }

        fn lid_solenoid_engage(&mut self) {
            self.calls.push(Call::Engage);
        }

        fn lid_solenoid_disengage(&mut self) {
            self.calls.push(Call::Disengage);
        }

        fn delay_ticks(&mut self, ticks: u16) {
            self.calls.push(Call::Delay(ticks));
        }
    }

    #[test]
    fn test_solenoid_acknowledged_once() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = MotorTask::new(&queues.motor, MockMotor::default());
        task.provide_tasks(&tasks);

        queues
            .motor
            .try_send(MotorMessage::ActuateSolenoid { id: 7, engage: true })
            .unwrap();
        queues.motor.try_send(MotorMessage::GetRpm { id: 8 }).unwrap();

        block_on(task.run_once()).unwrap();

        assert_eq!(queues.comms.len(), 1);
        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(7)));
        assert_eq!(
            task.policy().calls,
            [Call::Engage, Call::Delay(SOLENOID_SETTLE_TICKS)]
        );
        assert_eq!(queues.motor.len(), 1);
    }

    #[test]
    fn test_solenoid_behind_queued_request_acknowledged_once() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = MotorTask::new(&queues.motor, MockMotor::default());
        task.provide_tasks(&tasks);

        queues.motor.try_send(MotorMessage::GetRpm { id: 6 }).unwrap();
        queues
            .motor
            .try_send(MotorMessage::ActuateSolenoid { id: 7, engage: true })
            .unwrap();
        block_on(task.run_once()).unwrap();
        block_on(task.run_once()).unwrap();

        let mut replies = Vec::new();
        while let Some(reply) = queues.comms.try_recv() {
            replies.push(reply);
        }
        let solenoid: Vec<_> = replies
            .iter()
            .filter(|reply| reply.responding_to_id() == Some(7))
            .collect();
        assert_eq!(solenoid, [&HostCommsMessage::ack(7)]);
        assert_eq!(replies.len(), 2);
        assert_eq!(
            task.policy().calls,
            [Call::Engage, Call::Delay(SOLENOID_SETTLE_TICKS)]
        );
        assert!(queues.motor.is_empty());
    }

    #[test]
    fn test_solenoid_disengage() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = MotorTask::new(&queues.motor, MockMotor::default());
        task.provide_tasks(&tasks);

        queues
            .motor
            .try_send(MotorMessage::ActuateSolenoid { id: 1, engage: false })
            .unwrap();
        block_on(task.run_once()).unwrap();
        assert_eq!(
            task.policy().calls,
            [Call::Disengage, Call::Delay(SOLENOID_SETTLE_TICKS)]
        );
        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(1)));
    }

    #[test]
    fn test_set_rpm_and_query() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = MotorTask::new(&queues.motor, MockMotor::default());
        task.provide_tasks(&tasks);

        queues.motor.try_send(MotorMessage::SetRpm { id: 1, rpm: 1500 }).unwrap();
        queues.motor.try_send(MotorMessage::GetRpm { id: 2 }).unwrap();
        block_on(task.run_once()).unwrap();
        block_on(task.run_once()).unwrap();

        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(1)));
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::GetRpmResponse {
                responding_to_id: 2,
                current_rpm: 0,
                setpoint_rpm: 1500,
            })
        );
    }

    #[test]
    fn test_policy_errors_are_acknowledged() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = MotorTask::new(&queues.motor, MockMotor::default());
        task.provide_tasks(&tasks);

        queues.motor.try_send(MotorMessage::SetRpm { id: 3, rpm: 9000 }).unwrap();
        queues
            .motor
            .try_send(MotorMessage::SetAcceleration { id: 4, rpm_per_s: 0 })
            .unwrap();
        block_on(task.run_once()).unwrap();
        block_on(task.run_once()).unwrap();

        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::ack_result(3, Err(ErrorCode::MotorIllegalSpeed)))
        );
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::ack_result(4, Err(ErrorCode::MotorIllegalRampRate)))
        );
        assert!(queues.comms.is_empty());
    }

    #[test]
    fn test_stop() {
        let queues = Queues::new();
        let mut task = MotorTask::new(&queues.motor, MockMotor::default());
        queues.motor.request_stop();
        assert_eq!(block_on(task.run_once()), Err(Stopped));
        assert!(task.policy().calls.is_empty());
    }
}
