//! Polls a serial sensor node and prints collectd `PUTVAL` lines.
//!
//! Usage:
//!   telemetry-poll --config telemetry.toml
//!
//! Single cycle (handy when wiring up a new field table):
//!   telemetry-poll --config telemetry.toml --once

use anyhow::Context;
use clap::Parser;
use serial_telemetry::common::TelemetryFile;
use serial_telemetry::decoder::TelemetryDecoder;
use serial_telemetry::plugin::{putval::PutvalSink, serial::SerialSource};
use serial_telemetry::TelemetryPlugin;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: String,

    /// Override the serial device from the configuration
    #[arg(long)]
    device: Option<String>,

    /// Override the poll interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let file = TelemetryFile::load(&args.config)
        .with_context(|| format!("loading {}", args.config))?;
    let mut config = file.plugin;
    if let Some(device) = args.device {
        config.serial_device = device;
    }
    if let Some(interval) = args.interval {
        config.interval_secs = interval.max(1);
    }

    // Logs go to stderr; stdout carries the PUTVAL stream
    let default_filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let decoder = TelemetryDecoder::from_config(&file.decoder).context("building decoder")?;
    let sink = PutvalSink::new(
        std::io::stdout(),
        PutvalSink::<std::io::Stdout>::host_from_env(),
        config.interval_secs,
    );
    let source = SerialSource::from_config(&config);

    let interval = Duration::from_secs(config.interval_secs);
    let mut plugin = TelemetryPlugin::new(decoder, source, sink);
    plugin.configure(config);
    let outcome = plugin.start();
    info!(?outcome, wire = ?plugin.decoder().wire_mode(), "started");

    loop {
        let started = Instant::now();
        let report = plugin.poll_once();
        info!(
            freshness = ?report.freshness,
            bytes = report.bytes_read,
            frames = report.decode.frames,
            dispatched = report.dispatched,
            "cycle done"
        );
        if args.once {
            return Ok(());
        }
        std::thread::sleep(interval.saturating_sub(started.elapsed()));
    }
}
