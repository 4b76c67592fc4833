//! Host-side runtime: every firmware task on its own OS thread.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use futures::executor::block_on;
use hs_fw_core::TX_BUFFER_LENGTH;
use hs_fw_core::messages::{RX_LINE_LENGTH, host_line};
use hs_fw_core::serial_number::serial_number_from_bytes;
use hs_fw_core::tasks::comms::submit_host_line;
use hs_fw_core::tasks::{HeaterTask, HostCommsTask, MotorTask, Queues, SystemTask, Tasks};
use log::{debug, info, warn};

use crate::config::SimConfig;
use crate::policy::{SimHeater, SimMotor, SimSystem};

/// A running set of firmware tasks.
///
/// Queues and the task registry are leaked so the task threads can hold
/// `'static` references to them; each simulator instance costs one small
/// allocation for the rest of the process.
pub struct Simulator {
    tasks: &'static Tasks<'static>,
    replies: mpsc::Receiver<String>,
    threads: Vec<JoinHandle<()>>,
}

impl Simulator {
    pub fn start(config: &SimConfig) -> Result<Self> {
        let serial_number = match config.serial_number.as_deref() {
            Some(text) => Some(
                serial_number_from_bytes(text.as_bytes())
                    .ok_or_else(|| anyhow!("invalid serial number {text:?}"))?,
            ),
            None => None,
        };

        let queues: &'static Queues = Box::leak(Box::new(Queues::new()));
        let tasks: &'static Tasks<'static> = Box::leak(Box::new(queues.tasks()));

        let mut comms = HostCommsTask::new(&queues.comms);
        let mut heater = HeaterTask::new(
            &queues.heater,
            SimHeater::new(config.ambient_c, config.heater_gain_c),
        );
        let mut motor = MotorTask::new(&queues.motor, SimMotor::new());
        let mut system = SystemTask::new(
            &queues.system,
            SimSystem::new(serial_number, config.fail_serial_writes),
        );
        comms.provide_tasks(tasks);
        heater.provide_tasks(tasks);
        motor.provide_tasks(tasks);
        system.provide_tasks(tasks);

        let (reply_tx, replies) = mpsc::channel();
        let mut simulator = Self {
            tasks,
            replies,
            threads: Vec::with_capacity(4),
        };

        // On a spawn failure, dropping `simulator` stops the threads already running.
        simulator.threads.push(spawn_task("comms", move || {
            let mut tx = [0u8; TX_BUFFER_LENGTH];
            block_on(async {
                while let Ok(written) = comms.run_once(&mut tx).await {
                    if written == 0 {
                        continue;
                    }
                    let reply = String::from_utf8_lossy(&tx[..written]).into_owned();
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
            });
        })?);
        simulator.threads.push(spawn_task("heater", move || {
            block_on(async { while heater.run_once().await.is_ok() {} });
        })?);
        simulator.threads.push(spawn_task("motor", move || {
            block_on(async { while motor.run_once().await.is_ok() {} });
        })?);
        simulator.threads.push(spawn_task("system", move || {
            block_on(async { while system.run_once().await.is_ok() {} });
        })?);

        info!("simulator started");
        Ok(simulator)
    }

    /// Deliver one line of host input. A missing terminator is added.
    ///
    /// Fails while the comms task is too far behind to guarantee room for
    /// the replies it owes.
    pub fn send_line(&self, line: &str) -> Result<()> {
        let mut text = line.trim_end_matches(['\r', '\n']).to_owned();
        text.push('\n');
        let line = host_line(text.as_bytes())
            .ok_or_else(|| anyhow!("line longer than {RX_LINE_LENGTH} bytes"))?;
        submit_host_line(self.tasks.comms, line).map_err(|_| anyhow!("comms queue busy"))
    }

    /// Wait up to `timeout` for the next chunk of reply text.
    pub fn recv_reply(&self, timeout: Duration) -> Option<String> {
        self.replies.recv_timeout(timeout).ok()
    }

    /// Stop every task and wait for its thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.tasks.request_stop_all();
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("task").to_owned();
            if handle.join().is_err() {
                warn!("{name} thread panicked");
            } else {
                debug!("{name} thread stopped");
            }
        }
        info!("simulator stopped");
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_task<F>(name: &str, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(body)
        .with_context(|| format!("failed to spawn {name} thread"))
}
