//! Heater-shaker firmware core.
//!
//! Hardware-independent part of the module firmware: the G-code grammar, the
//! messages tasks exchange, the bounded task queues and the tasks
//! themselves. Hardware is reached only through the policy traits in
//! [`tasks`], so the same code runs on the board and in the host simulator.

#![no_std]

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod gcode;
pub mod messages;
pub mod pid;
pub mod queue;
pub mod serial_number;
pub mod tasks;

pub use error::ErrorCode;
pub use queue::{QueueFull, Stopped, TaskQueue};

/// Size of the reply buffer handed to the communications task.
pub const TX_BUFFER_LENGTH: usize = 128;

/// Commands that may wait for a reply at the same time.
pub const ACK_CACHE_SIZE: usize = 8;
