use std::thread;
use std::time::{Duration, Instant};

use hs_fw_core::ErrorCode;
use hs_fw_core::tasks::MotorPolicy;

pub const MAX_RPM: i16 = 3000;
const MAX_RAMP_RATE: i32 = 20_000;
const DEFAULT_RAMP_RATE: i32 = 1000;
/// Length of one scheduler tick for [`MotorPolicy::delay_ticks`].
const TICK: Duration = Duration::from_millis(1);

/// Spindle that ramps linearly toward its target at the configured rate.
pub struct SimMotor {
    ramp_rate: i32,
    start_rpm: f64,
    target_rpm: i16,
    ramp_started: Instant,
    solenoid_engaged: bool,
}

impl SimMotor {
    pub fn new() -> Self {
        Self {
            ramp_rate: DEFAULT_RAMP_RATE,
            start_rpm: 0.0,
            target_rpm: 0,
            ramp_started: Instant::now(),
            solenoid_engaged: false,
        }
    }

    pub fn solenoid_engaged(&self) -> bool {
        self.solenoid_engaged
    }

    fn speed_now(&self) -> f64 {
        let elapsed = self.ramp_started.elapsed().as_secs_f64();
        let target = f64::from(self.target_rpm);
        let step = f64::from(self.ramp_rate) * elapsed;
        if self.start_rpm < target {
            (self.start_rpm + step).min(target)
        } else {
            (self.start_rpm - step).max(target)
        }
    }

    /// Freeze the current speed as the start of a new ramp.
    fn restart_ramp(&mut self) {
        self.start_rpm = self.speed_now();
        self.ramp_started = Instant::now();
    }
}

impl Default for SimMotor {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorPolicy for SimMotor {
    fn set_rpm(&mut self, rpm: i16) -> Result<(), ErrorCode> {
        if !(0..=MAX_RPM).contains(&rpm) {
            return Err(ErrorCode::MotorIllegalSpeed);
        }
        self.restart_ramp();
        self.target_rpm = rpm;
        Ok(())
    }

    fn current_rpm(&self) -> i16 {
        self.speed_now().round() as i16
    }

    fn target_rpm(&self) -> i16 {
        self.target_rpm
    }

    fn set_ramp_rate(&mut self, rpm_per_s: i32) -> Result<(), ErrorCode> {
        if !(1..=MAX_RAMP_RATE).contains(&rpm_per_s) {
            return Err(ErrorCode::MotorIllegalRampRate);
        }
        self.restart_ramp();
        self.ramp_rate = rpm_per_s;
        Ok(())
    }

    fn lid_solenoid_engage(&mut self) {
        log::info!("sim motor: lid solenoid engaged");
        self.solenoid_engaged = true;
    }

    fn lid_solenoid_disengage(&mut self) {
        log::info!("sim motor: lid solenoid released");
        self.solenoid_engaged = false;
    }

    fn delay_ticks(&mut self, ticks: u16) {
        thread::sleep(TICK * u32::from(ticks));
    }
}
