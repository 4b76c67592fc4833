//! Bounded per-task inbox with a periodic tick and cooperative stop.
//!
//! Each task owns exactly one [`TaskQueue`]. Producers push with
//! [`TaskQueue::try_send`], which never blocks: a full queue is reported to
//! the caller instead. The owning task waits in [`TaskQueue::recv`], which
//! resolves on the first of a message, a stop request, or the tick period
//! elapsing. Tasks with periodic work that must not be delayed by traffic
//! wait with [`TaskQueue::recv_until`] against a fixed deadline instead.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{Either3, select3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

/// The destination queue had no room; the message was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

/// The queue has been asked to stop; the owning task should exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped;

impl core::fmt::Display for QueueFull {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("queue full")
    }
}

impl core::fmt::Display for Stopped {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("task stopped")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for QueueFull {}

#[cfg(feature = "std")]
impl std::error::Error for Stopped {}

/// Multi-producer, single-consumer FIFO of capacity `N`.
pub struct TaskQueue<M, const N: usize> {
    channel: Channel<CriticalSectionRawMutex, M, N>,
    stop: Signal<CriticalSectionRawMutex, ()>,
    stopped: AtomicBool,
    tick: Duration,
}

impl<M, const N: usize> TaskQueue<M, N> {
    /// Create an empty queue whose [`recv`](Self::recv) yields `Ok(None)`
    /// after `tick` without traffic.
    pub const fn new(tick: Duration) -> Self {
        Self {
            channel: Channel::new(),
            stop: Signal::new(),
            stopped: AtomicBool::new(false),
            tick,
        }
    }

    /// Enqueue without blocking. Safe to call from any context.
    pub fn try_send(&self, message: M) -> Result<(), QueueFull> {
        self.channel.try_send(message).map_err(|_| QueueFull)
    }

    /// Wait for the next message.
    ///
    /// Returns `Ok(Some(_))` for a message, `Ok(None)` when the tick period
    /// elapsed first, and `Err(Stopped)` once [`request_stop`](Self::request_stop)
    /// has been called.
    pub async fn recv(&self) -> Result<Option<M>, Stopped> {
        self.recv_until(Instant::now() + self.tick).await
    }

    /// Wait for the next message, giving up at `deadline`.
    ///
    /// A queued message is returned even when the deadline has already
    /// passed, so an overdue deadline never hides traffic.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(message))` if a message arrived first
    /// * `Ok(None)` if `deadline` was reached with the queue empty
    /// * `Err(Stopped)` once [`request_stop`](Self::request_stop) has been called
    pub async fn recv_until(&self, deadline: Instant) -> Result<Option<M>, Stopped> {
        if self.is_stop_requested() {
            return Err(Stopped);
        }
        match select3(
            self.channel.receive(),
            self.stop.wait(),
            Timer::at(deadline),
        )
        .await
        {
            Either3::First(message) => Ok(Some(message)),
            Either3::Second(()) => Err(Stopped),
            Either3::Third(()) => Ok(None),
        }
    }

    /// Enqueue only if `headroom` slots stay free afterwards.
    ///
    /// Used by producers that must not crowd out replies owed to the
    /// consumer. The check and the send are not atomic, so this bound holds
    /// only while a single producer uses it.
    pub fn try_send_with_headroom(&self, message: M, headroom: usize) -> Result<(), QueueFull> {
        if self.channel.len() + 1 + headroom > N {
            return Err(QueueFull);
        }
        self.try_send(message)
    }

    /// Dequeue without waiting.
    pub fn try_recv(&self) -> Option<M> {
        self.channel.try_receive().ok()
    }

    /// Wake the consumer and make every later [`recv`](Self::recv) fail.
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.stop.signal(());
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.channel.is_full()
    }
}
