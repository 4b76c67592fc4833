//! Minimal PID controller for the heater loop.

/// Proportional-integral-derivative controller with a clamped integrator.
///
/// The derivative term is skipped on the first call after construction or
/// [`reset`](Pid::reset), since there is no previous error to difference
/// against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    windup_low: f64,
    windup_high: f64,
    integrator: f64,
    last_error: f64,
    primed: bool,
}

impl Pid {
    pub const fn new(kp: f64, ki: f64, kd: f64, windup_low: f64, windup_high: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            windup_low,
            windup_high,
            integrator: 0.0,
            last_error: 0.0,
            primed: false,
        }
    }

    /// Advance the controller by `dt_s` seconds and return the raw output.
    pub fn compute(&mut self, error: f64, dt_s: f64) -> f64 {
        self.integrator = clamp(
            self.integrator + error * dt_s,
            self.windup_low,
            self.windup_high,
        );
        let derivative = if self.primed && dt_s > 0.0 {
            (error - self.last_error) / dt_s
        } else {
            0.0
        };
        self.last_error = error;
        self.primed = true;

        self.kp * error + self.ki * self.integrator + self.kd * derivative
    }

    /// Forget accumulated state; gains are kept.
    pub fn reset(&mut self) {
        self.integrator = 0.0;
        self.last_error = 0.0;
        self.primed = false;
    }

    /// Replace the gains and restart from a clean state.
    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self.reset();
    }

    pub fn gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    pub fn integrator(&self) -> f64 {
        self.integrator
    }
}

/// Like `f64::clamp`, but never panics on inverted limits.
pub(crate) fn clamp(value: f64, low: f64, high: f64) -> f64 {
    if value < low {
        low
    } else if value > high {
        high
    } else {
        value
    }
}
