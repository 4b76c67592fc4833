use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hs_fw_sim::{SimConfig, Simulator};

/// How long to keep collecting replies after each input line.
const REPLY_WAIT: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(
    name = "hs-fw-sim",
    version,
    about = "Run the heater-shaker firmware against simulated hardware. Reads G-code lines from stdin."
)]
struct Args {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    /// Ambient temperature in °C.
    #[arg(long, default_value_t = 23.0)]
    ambient: f64,

    /// Temperature rise above ambient at full heater power, in °C.
    #[arg(long, default_value_t = 90.0)]
    heater_gain: f64,

    /// Serial number present at startup.
    #[arg(long)]
    serial_number: Option<String>,

    /// Make serial number writes fail.
    #[arg(long)]
    fail_serial_writes: bool,
}

impl From<Args> for SimConfig {
    fn from(args: Args) -> Self {
        Self {
            ambient_c: args.ambient,
            heater_gain_c: args.heater_gain,
            serial_number: args.serial_number,
            fail_serial_writes: args.fail_serial_writes,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let simulator = Simulator::start(&SimConfig::from(args))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = simulator.send_line(&line) {
            log::warn!("dropped input: {e}");
            continue;
        }
        while let Some(reply) = simulator.recv_reply(REPLY_WAIT) {
            out.write_all(reply.as_bytes())?;
        }
        out.flush()?;
    }

    simulator.shutdown();
    Ok(())
}
