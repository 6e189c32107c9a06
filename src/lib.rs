// src/lib.rs

#![no_std] // Core decoding runs on alloc alone

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod common;
pub mod decoder;
pub mod plugin;

// Re-export key types for convenience
pub use common::{FieldTable, MetricSnapshot, PluginConfig, TelemetryError};
pub use decoder::TelemetryDecoder;
pub use plugin::TelemetryPlugin;
