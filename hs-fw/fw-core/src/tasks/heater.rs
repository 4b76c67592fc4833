//! Heater task: temperature control loop, fault detection and power test.
//!
//! The task runs in one of three modes. `ClosedLoop` drives the pads toward
//! a setpoint with a [`Pid`]; `PowerTest` holds a fixed output fraction;
//! `Idle` keeps the output off. Sensors are sampled on every control tick.
//! A detected fault turns the output off, drops to `Idle` and stays latched
//! (rejecting new heating requests) until a tick reads healthy values again.

use embassy_time::Instant;
use log::{debug, info, warn};

use super::{HeaterQueue, RegistrySlot, Tasks};
use crate::error::ErrorCode;
use crate::gcode::TemperatureDebugReport;
use crate::messages::{HeaterMessage, HostCommsMessage};
use crate::pid::{Pid, clamp};
use crate::queue::Stopped;

/// Pad readings below this are treated as a disconnected thermistor.
pub const PAD_MIN_TEMPERATURE: f64 = -20.0;
/// Pad readings above this are an overtemperature fault.
pub const PAD_MAX_TEMPERATURE: f64 = 105.0;
/// Board readings below this are a sensor fault.
pub const BOARD_MIN_TEMPERATURE: f64 = -20.0;
/// Board readings above this are a sensor fault.
pub const BOARD_MAX_TEMPERATURE: f64 = 120.0;

/// Proportional gain used until the host sends `M301`.
pub const DEFAULT_KP: f64 = 0.355;
/// Integral gain used until the host sends `M301`.
pub const DEFAULT_KI: f64 = 0.0052;
/// Derivative gain used until the host sends `M301`.
pub const DEFAULT_KD: f64 = 0.0;
const WINDUP_LIMIT: f64 = 100.0;

/// One thermistor sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemperatureReading {
    /// Converted temperature in °C.
    pub temperature: f64,
    /// Raw ADC count the temperature was converted from.
    pub adc: u16,
}

/// All three thermistors, sampled together once per control tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemperatureReadings {
    /// First heater pad.
    pub pad_a: TemperatureReading,
    /// Second heater pad.
    pub pad_b: TemperatureReading,
    /// Board thermistor near the power stage.
    pub board: TemperatureReading,
}

impl TemperatureReadings {
    /// Temperature reported to the host: the mean of both pads.
    pub fn pad_average(&self) -> f64 {
        (self.pad_a.temperature + self.pad_b.temperature) / 2.0
    }
}

/// Hardware access needed by the heater task.
pub trait HeaterPolicy {
    /// Sample all thermistors.
    fn read_temperatures(&mut self) -> TemperatureReadings;
    /// Whether the heater supply reports power good.
    fn power_good(&self) -> bool;
    /// Drive the heater at `power`, a fraction in `[0, 1]`.
    fn set_power_output(&mut self, power: f64) -> Result<(), ErrorCode>;
    /// Turn the heater output off. Must not fail.
    fn disable_power_output(&mut self);
}

/// What the heater output is currently doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaterMode {
    /// Output off.
    Idle,
    /// PID control toward `setpoint` °C.
    ClosedLoop { setpoint: f64 },
    /// Fixed output fraction, no feedback.
    PowerTest { power: f64 },
}

/// Owns the heater hardware and runs the control loop every
/// [`CONTROL_PERIOD`](super::CONTROL_PERIOD).
pub struct HeaterTask<'a, P: HeaterPolicy> {
    queue: &'a HeaterQueue,
    registry: RegistrySlot<'a>,
    policy: P,
    mode: HeaterMode,
    fault: Option<ErrorCode>,
    readings: TemperatureReadings,
    pid: Pid,
    next_tick: Instant,
}

impl<'a, P: HeaterPolicy> HeaterTask<'a, P> {
    /// Create an idle heater task and take an initial sensor reading.
    ///
    /// # Arguments
    ///
    /// * `queue` - The queue this task receives on
    /// * `policy` - Hardware access for the heater
    pub fn new(queue: &'a HeaterQueue, mut policy: P) -> Self {
        let readings = policy.read_temperatures();
        Self {
            queue,
            registry: RegistrySlot::new("heater"),
            policy,
            mode: HeaterMode::Idle,
            fault: None,
            readings,
            pid: Pid::new(DEFAULT_KP, DEFAULT_KI, DEFAULT_KD, -WINDUP_LIMIT, WINDUP_LIMIT),
            next_tick: Instant::now() + queue.tick(),
        }
    }

    /// Wire the task registry used for replies. Only the first call takes effect.
    pub fn provide_tasks(&mut self, tasks: &'a Tasks<'a>) {
        self.registry.provide(tasks);
    }

    /// Current output mode.
    pub fn mode(&self) -> HeaterMode {
        self.mode
    }

    /// The latched fault, if any.
    pub fn fault(&self) -> Option<ErrorCode> {
        self.fault
    }

    /// The hardware policy, for inspection.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// The hardware policy, for adjusting simulated or mocked hardware.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Handle at most one message, then run the control loop if its
    /// deadline has passed.
    ///
    /// Ticks are scheduled against an absolute deadline, so a steady stream
    /// of messages cannot hold the control loop off.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - A message was handled, a tick ran, or both
    /// * `Err(Stopped)` - The task was asked to stop
    pub async fn run_once(&mut self) -> Result<(), Stopped> {
        if let Some(message) = self.queue.recv_until(self.next_tick).await? {
            self.handle(message);
        }
        let now = Instant::now();
        if now >= self.next_tick {
            self.control_tick();
            let period = self.queue.tick();
            self.next_tick += period;
            if self.next_tick <= now {
                // Fell more than a period behind; skip the missed ticks.
                self.next_tick = now + period;
            }
        }
        Ok(())
    }

    fn handle(&mut self, message: HeaterMessage) {
        debug!("heater: {message:?}");
        match message {
            HeaterMessage::SetTemperature { id, target } => {
                let result = match self.fault {
                    Some(code) => Err(code),
                    None => {
                        self.mode = HeaterMode::ClosedLoop { setpoint: target };
                        self.pid.reset();
                        Ok(())
                    }
                };
                self.registry.reply(HostCommsMessage::ack_result(id, result));
            }
            HeaterMessage::SetPowerTest { id, power } => {
                let result = self.start_power_test(power);
                self.registry.reply(HostCommsMessage::ack_result(id, result));
            }
            HeaterMessage::SetPidConstants { id, kp, ki, kd } => {
                self.pid.set_gains(kp, ki, kd);
                self.registry.reply(HostCommsMessage::ack(id));
            }
            HeaterMessage::GetTemperature { id } => {
                let setpoint = match self.mode {
                    HeaterMode::Idle => 0.0,
                    HeaterMode::ClosedLoop { setpoint } => setpoint,
                    HeaterMode::PowerTest { power } => power,
                };
                self.registry.reply(HostCommsMessage::GetTemperatureResponse {
                    responding_to_id: id,
                    current: self.readings.pad_average(),
                    setpoint,
                });
            }
            HeaterMessage::GetTemperatureDebug { id } => {
                let TemperatureReadings {
                    pad_a,
                    pad_b,
                    board,
                } = self.readings;
                let report = TemperatureDebugReport {
                    pad_a_temperature: pad_a.temperature,
                    pad_b_temperature: pad_b.temperature,
                    board_temperature: board.temperature,
                    pad_a_adc: pad_a.adc,
                    pad_b_adc: pad_b.adc,
                    board_adc: board.adc,
                    power_good: self.policy.power_good(),
                };
                self.registry.reply(HostCommsMessage::GetTemperatureDebugResponse {
                    responding_to_id: id,
                    report,
                });
            }
        }
    }

    fn start_power_test(&mut self, power: f64) -> Result<(), ErrorCode> {
        if power <= 0.0 {
            self.policy.disable_power_output();
            self.mode = HeaterMode::Idle;
            return Ok(());
        }
        if let Some(code) = self.fault {
            return Err(code);
        }
        match self.policy.set_power_output(power) {
            Ok(()) => {
                self.mode = HeaterMode::PowerTest { power };
                Ok(())
            }
            Err(code) => {
                warn!("heater: power test at {power} failed: {code}");
                self.policy.disable_power_output();
                self.mode = HeaterMode::Idle;
                Err(code)
            }
        }
    }

    fn control_tick(&mut self) {
        self.readings = self.policy.read_temperatures();
        let heating = self.mode != HeaterMode::Idle;
        match self.detect_fault(heating) {
            Some(code) => self.enter_fault(code),
            None => {
                if let Some(code) = self.fault.take() {
                    info!("heater: {code} cleared");
                }
            }
        }

        if let HeaterMode::ClosedLoop { setpoint } = self.mode {
            let dt_s = self.queue.tick().as_micros() as f64 / 1_000_000.0;
            let error = setpoint - self.readings.pad_average();
            let output = clamp(self.pid.compute(error, dt_s), 0.0, 1.0);
            if let Err(code) = self.policy.set_power_output(output) {
                self.enter_fault(code);
            }
        }
    }

    fn detect_fault(&self, heating: bool) -> Option<ErrorCode> {
        let TemperatureReadings {
            pad_a,
            pad_b,
            board,
        } = self.readings;
        for pad in [pad_a, pad_b] {
            if pad.temperature < PAD_MIN_TEMPERATURE {
                return Some(ErrorCode::HeaterPadSensorFault);
            }
            if pad.temperature > PAD_MAX_TEMPERATURE {
                return Some(ErrorCode::HeaterPadOvertemp);
            }
        }
        if board.temperature < BOARD_MIN_TEMPERATURE || board.temperature > BOARD_MAX_TEMPERATURE {
            return Some(ErrorCode::HeaterBoardSensorFault);
        }
        // Once latched, power-not-good holds until the supply recovers,
        // even though the output is off.
        let latched = self.fault == Some(ErrorCode::HeaterPowerNotGood);
        if (heating || latched) && !self.policy.power_good() {
            return Some(ErrorCode::HeaterPowerNotGood);
        }
        None
    }

    fn enter_fault(&mut self, code: ErrorCode) {
        self.policy.disable_power_output();
        self.mode = HeaterMode::Idle;
        self.pid.reset();
        if self.fault != Some(code) {
            warn!("heater: {code}, output disabled");
            self.fault = Some(code);
            self.registry.reply(HostCommsMessage::ErrorMessage { code });
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::tasks::Queues;
    use futures::executor::block_on;
    use std::thread;
    use std::time::{Duration as StdDuration, Instant as StdInstant};

    fn reading(temperature: f64) -> TemperatureReading {
        TemperatureReading {
            temperature,
            adc: 1000,
        }
    }

    fn readings(pad: f64, board: f64) -> TemperatureReadings {
        TemperatureReadings {
            pad_a: reading(pad),
            pad_b: reading(pad),
            board: reading(board),
        }
    }

    struct MockHeater {
        readings: TemperatureReadings,
        power_good: bool,
        output: Option<f64>,
        fail_with: Option<ErrorCode>,
    }

    impl MockHeater {
        fn new() -> Self {
            Self {
                readings: readings(24.0, 30.0),
                power_good: true,
                output: None,
                fail_with: None,
            }
        }
    }

    impl HeaterPolicy for MockHeater {
        fn read_temperatures(&mut self) -> TemperatureReadings {
            self.readings
        }

        fn power_good(&self) -> bool {
            self.power_good
        }

        fn set_power_output(&mut self, power: f64) -> Result<(), ErrorCode> {
            if let Some(code) = self.fail_with {
                return Err(code);
            }
            self.output = Some(power);
            Ok(())
        }

        fn disable_power_output(&mut self) {
            self.output = None;
        }
    }

    fn step(task: &mut HeaterTask<'_, MockHeater>, queues: &Queues, message: HeaterMessage) {
        queues.heater.try_send(message).unwrap();
        block_on(task.run_once()).unwrap();
    }

    #[test]
    fn test_set_temperature_enters_closed_loop() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = HeaterTask::new(&queues.heater, MockHeater::new());
        task.provide_tasks(&tasks);

        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 3, target: 37.0 });
        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(3)));
        assert_eq!(task.mode(), HeaterMode::ClosedLoop { setpoint: 37.0 });

        task.control_tick();
        let output = task.policy().output.unwrap();
        assert!(output > 0.0 && output <= 1.0);
        assert!(queues.comms.is_empty());
    }

    #[test]
    fn test_closed_loop_output_is_clamped() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = HeaterTask::new(&queues.heater, MockHeater::new());
        task.provide_tasks(&tasks);

        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 0, target: 10.0 });
        task.control_tick();
        assert_eq!(task.policy().output, Some(0.0));
    }

    #[test]
    fn test_get_temperature_reports_mode_setpoint() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = HeaterTask::new(&queues.heater, MockHeater::new());
        task.provide_tasks(&tasks);

        step(&mut task, &queues, HeaterMessage::GetTemperature { id: 1 });
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::GetTemperatureResponse {
                responding_to_id: 1,
                current: 24.0,
                setpoint: 0.0,
            })
        );

        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 2, target: 50.0 });
        queues.comms.try_recv();
        step(&mut task, &queues, HeaterMessage::GetTemperature { id: 3 });
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::GetTemperatureResponse {
                responding_to_id: 3,
                current: 24.0,
                setpoint: 50.0,
            })
        );
    }

    #[test]
    fn test_get_temperature_debug() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut policy = MockHeater::new();
        policy.power_good = false;
        let mut task = HeaterTask::new(&queues.heater, policy);
        task.provide_tasks(&tasks);

        step(&mut task, &queues, HeaterMessage::GetTemperatureDebug { id: 4 });
        let Some(HostCommsMessage::GetTemperatureDebugResponse {
            responding_to_id,
            report,
        }) = queues.comms.try_recv()
        else {
            panic!("expected a debug response");
        };
        assert_eq!(responding_to_id, 4);
        assert_eq!(report.pad_a_temperature, 24.0);
        assert_eq!(report.board_temperature, 30.0);
        assert_eq!(report.board_adc, 1000);
        assert!(!report.power_good);
    }

    #[test]
    fn test_set_pid_constants() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = HeaterTask::new(&queues.heater, MockHeater::new());
        task.provide_tasks(&tasks);

        step(
            &mut task,
            &queues,
            HeaterMessage::SetPidConstants {
                id: 5,
                kp: 1.02,
                ki: 2.1,
                kd: 1.0,
            },
        );
        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(5)));
        assert_eq!(task.pid.gains(), (1.02, 2.1, 1.0));
    }

    #[test]
    fn test_power_test_supersedes_closed_loop() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = HeaterTask::new(&queues.heater, MockHeater::new());
        task.provide_tasks(&tasks);

        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 0, target: 60.0 });
        step(&mut task, &queues, HeaterMessage::SetPowerTest { id: 1, power: 0.5 });
        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(0)));
        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(1)));
        assert_eq!(task.mode(), HeaterMode::PowerTest { power: 0.5 });
        assert_eq!(task.policy().output, Some(0.5));

        // Ticks in power test leave the output alone.
        task.control_tick();
        assert_eq!(task.policy().output, Some(0.5));

        step(&mut task, &queues, HeaterMessage::SetPowerTest { id: 2, power: 0.0 });
        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(2)));
        assert_eq!(task.mode(), HeaterMode::Idle);
        assert_eq!(task.policy().output, None);
    }

    #[test]
    fn test_power_test_hardware_failure() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut policy = MockHeater::new();
        policy.fail_with = Some(ErrorCode::HeaterHardwareError);
        let mut task = HeaterTask::new(&queues.heater, policy);
        task.provide_tasks(&tasks);

        step(&mut task, &queues, HeaterMessage::SetPowerTest { id: 9, power: 0.25 });
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::ack_result(9, Err(ErrorCode::HeaterHardwareError)))
        );
        assert!(queues.comms.is_empty());
        assert_eq!(task.mode(), HeaterMode::Idle);
    }

    #[test]
    fn test_overtemp_fault_latches_until_healthy() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = HeaterTask::new(&queues.heater, MockHeater::new());
        task.provide_tasks(&tasks);

        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 0, target: 95.0 });
        queues.comms.try_recv();
        task.control_tick();
        assert!(task.policy().output.is_some());

        task.policy_mut().readings = readings(110.0, 30.0);
        task.control_tick();
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::ErrorMessage {
                code: ErrorCode::HeaterPadOvertemp
            })
        );
        assert_eq!(task.mode(), HeaterMode::Idle);
        assert_eq!(task.policy().output, None);

        // A persisting fault is reported once.
        task.control_tick();
        assert!(queues.comms.is_empty());

        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 1, target: 50.0 });
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::ack_result(1, Err(ErrorCode::HeaterPadOvertemp)))
        );
        assert_eq!(task.mode(), HeaterMode::Idle);

        task.policy_mut().readings = readings(80.0, 30.0);
        task.control_tick();
        assert_eq!(task.fault(), None);
        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 2, target: 50.0 });
        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(2)));
    }

    #[test]
    fn test_sensor_faults() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut task = HeaterTask::new(&queues.heater, MockHeater::new());
        task.provide_tasks(&tasks);

        task.policy_mut().readings = readings(-40.0, 30.0);
        task.control_tick();
        assert_eq!(task.fault(), Some(ErrorCode::HeaterPadSensorFault));

        task.policy_mut().readings = readings(25.0, 150.0);
        task.control_tick();
        assert_eq!(task.fault(), Some(ErrorCode::HeaterBoardSensorFault));
        assert_eq!(queues.comms.len(), 2);
    }

    #[test]
    fn test_power_not_good_only_while_heating() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut policy = MockHeater::new();
        policy.power_good = false;
        let mut task = HeaterTask::new(&queues.heater, policy);
        task.provide_tasks(&tasks);

        task.control_tick();
        assert_eq!(task.fault(), None);

        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 0, target: 40.0 });
        queues.comms.try_recv();
        task.control_tick();
        assert_eq!(task.fault(), Some(ErrorCode::HeaterPowerNotGood));
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::ErrorMessage {
                code: ErrorCode::HeaterPowerNotGood
            })
        );
    }

    #[test]
    fn test_power_not_good_latch_holds_until_supply_recovers() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut policy = MockHeater::new();
        policy.power_good = false;
        let mut task = HeaterTask::new(&queues.heater, policy);
        task.provide_tasks(&tasks);

        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 0, target: 40.0 });
        assert_eq!(queues.comms.try_recv(), Some(HostCommsMessage::ack(0)));
        task.control_tick();
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::ErrorMessage {
                code: ErrorCode::HeaterPowerNotGood
            })
        );

        // Output is off now, but the supply is still bad.
        task.control_tick();
        assert_eq!(task.fault(), Some(ErrorCode::HeaterPowerNotGood));

        step(&mut task, &queues, HeaterMessage::SetTemperature { id: 1, target: 40.0 });
        assert_eq!(
            queues.comms.try_recv(),
            Some(HostCommsMessage::ack_result(1, Err(ErrorCode::HeaterPowerNotGood)))
        );
        assert!(queues.comms.is_empty());
        assert_eq!(task.mode(), HeaterMode::Idle);

        task.policy_mut().power_good = true;
        task.control_tick();
        assert_eq!(task.fault(), None);
    }

    #[test]
    fn test_ticks_run_under_steady_traffic() {
        let queues = Queues::new();
        let tasks = queues.tasks();
        let mut policy = MockHeater::new();
        policy.readings = readings(110.0, 30.0);
        let mut task = HeaterTask::new(&queues.heater, policy);
        task.provide_tasks(&tasks);

        step(&mut task, &queues, HeaterMessage::SetPowerTest { id: 0, power: 1.0 });
        assert_eq!(task.mode(), HeaterMode::PowerTest { power: 1.0 });

        // One message every 20 ms keeps the queue busy for longer than
        // several control periods.
        let run_for = StdDuration::from_millis(500);
        thread::scope(|scope| {
            scope.spawn(|| {
                for id in 1..=25 {
                    let _ = queues.heater.try_send(HeaterMessage::GetTemperature { id });
                    thread::sleep(StdDuration::from_millis(20));
                }
            });
            let started = StdInstant::now();
            while started.elapsed() < run_for {
                block_on(task.run_once()).unwrap();
            }
        });

        assert_eq!(task.fault(), Some(ErrorCode::HeaterPadOvertemp));
        assert_eq!(task.mode(), HeaterMode::Idle);
        assert_eq!(task.policy().output, None);
    }

    #[test]
    fn test_idle_period_runs_control_tick() {
        let queues = Queues::new();
        let mut task = HeaterTask::new(&queues.heater, MockHeater::new());
        task.policy_mut().readings = readings(42.0, 30.0);

        block_on(task.run_once()).unwrap();
        assert_eq!(task.readings.pad_average(), 42.0);
    }

    #[test]
    fn test_stop() {
        let queues = Queues::new();
        let mut task = HeaterTask::new(&queues.heater, MockHeater::new());
        queues.heater.request_stop();
        assert_eq!(block_on(task.run_once()), Err(Stopped));
    }
}
