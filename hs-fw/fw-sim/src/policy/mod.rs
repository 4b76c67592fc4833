//! Simulated hardware behind the core policy traits.

mod heater;
mod motor;
mod system;

pub use heater::SimHeater;
pub use motor::{MAX_RPM, SimMotor};
pub use system::SimSystem;
