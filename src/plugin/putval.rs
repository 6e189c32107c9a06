// src/plugin/putval.rs

use crate::common::hal_traits::{GaugePoint, MetricSink};
use alloc::string::String;
use std::io::Write;

/// Environment variable collectd's exec plugin sets for the host name.
pub const HOSTNAME_ENV: &str = "COLLECTD_HOSTNAME";

/// Writes points in collectd's plain-text exec protocol:
///
/// ```text
/// PUTVAL "host/arduino-tension/gauge-tension" interval=10 N:231.5
/// ```
#[derive(Debug)]
pub struct PutvalSink<W: Write> {
    out: W,
    host: String,
    interval_secs: u64,
}

impl<W: Write> PutvalSink<W> {
    pub fn new(out: W, host: impl Into<String>, interval_secs: u64) -> Self {
        PutvalSink {
            out,
            host: host.into(),
            interval_secs,
        }
    }

    /// Host name from [`HOSTNAME_ENV`], `localhost` when unset.
    pub fn host_from_env() -> String {
        std::env::var(HOSTNAME_ENV).unwrap_or_else(|_| String::from("localhost"))
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MetricSink for PutvalSink<W> {
    type Error = std::io::Error;

    fn dispatch(&mut self, point: &GaugePoint<'_>) -> Result<(), Self::Error> {
        writeln!(
            self.out,
            "PUTVAL \"{}/{}-{}/{}-{}\" interval={} N:{}",
            self.host,
            point.plugin,
            point.plugin_instance,
            point.kind(),
            point.type_instance,
            self.interval_secs,
            point.value
        )?;
        // The reading side expects a line per value as soon as it is produced
        self.out.flush()
    }
}
