//! Host simulator for the heater-shaker firmware core.
//!
//! Runs the unmodified core tasks on OS threads against simulated hardware,
//! so the G-code interface can be exercised without a board.

pub mod config;
pub mod policy;
pub mod simulator;

pub use config::SimConfig;
pub use simulator::Simulator;
