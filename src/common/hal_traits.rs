// src/common/hal_traits.rs

use super::config::PluginConfig;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

/// Result of trying to (re)open a byte source before a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The source is open and readable.
    Opened,
    /// The configured device does not exist.
    DeviceMissing,
    /// The device exists but could not be opened.
    OpenFailed(String),
}

impl OpenOutcome {
    pub fn is_open(&self) -> bool {
        matches!(self, OpenOutcome::Opened)
    }
}

/// Abstraction for the telemetry byte stream (usually a serial device).
pub trait ByteSource {
    /// Associated error type for read failures.
    type Error: Debug;

    /// Opens the source if it is not open yet. Called before every cycle, so
    /// an already open source must return `Opened` without side effects.
    fn open(&mut self) -> OpenOutcome;

    /// Appends every byte currently waiting to `buf` without blocking.
    ///
    /// Returns `Ok(n)` with the number of bytes appended, or
    /// `Err(nb::Error::WouldBlock)` if nothing is waiting. Other errors are
    /// returned as `Err(nb::Error::Other(Self::Error))`.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> nb::Result<usize, Self::Error>;

    /// Picks up device options after `configure`. Sources that were built
    /// with their settings already in place can ignore it.
    fn apply_config(&mut self, _config: &PluginConfig) {}
}

/// Metric type reported for every point.
pub const GAUGE: &str = "gauge";

/// One aggregated value on its way to the monitoring host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugePoint<'a> {
    /// Plugin identifier (`arduino` unless configured otherwise).
    pub plugin: &'a str,
    /// Metric key, used as the plugin instance.
    pub plugin_instance: &'a str,
    /// Metric key, used as the type instance.
    pub type_instance: &'a str,
    /// Mean of the cycle's samples.
    pub value: f64,
}

impl GaugePoint<'_> {
    pub fn kind(&self) -> &'static str {
        GAUGE
    }
}

/// Receiver of gauge points. One call per metric in an emitted snapshot.
pub trait MetricSink {
    type Error: Debug;

    fn dispatch(&mut self, point: &GaugePoint<'_>) -> Result<(), Self::Error>;
}
