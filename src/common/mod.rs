// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod config;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod types;

// --- Re-export key types/traits/functions for easier access ---

// From config.rs
pub use config::{ConfigItem, ConfigValue, DecoderConfig, PluginConfig, WireMode};
#[cfg(feature = "std")]
pub use config::{ConfigError, TelemetryFile};

// From error.rs
pub use error::{DecodeError, TelemetryError};

// From frame.rs
pub use frame::{is_frame, Frame, Line, LineSplitter, Rejection, DEFAULT_SHIFT, FRAME_MARKER};

// From hal_traits.rs
pub use hal_traits::{ByteSource, GaugePoint, MetricSink, OpenOutcome};

// From types.rs
pub use types::{FieldMap, FieldTable, MetricAccumulator, MetricSnapshot, PositionOrigin};
