// src/common/config.rs

use super::error::TelemetryError;
use super::frame::DEFAULT_SHIFT;
use super::types::{FieldMap, PositionOrigin};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PLUGIN_NAME: &str = "arduino";
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyUSB1";
pub const DEFAULT_SERIAL_SPEED: u32 = 57600;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

// --- Plugin options ---

/// Options recognised by the plugin, keyed the way the host config spells them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginConfig {
    /// Per-line diagnostic events.
    #[serde(rename = "Debug")]
    pub debug: bool,
    #[serde(rename = "SerialDevice")]
    pub serial_device: String,
    /// Bit rate.
    #[serde(rename = "SerialSpeed")]
    pub serial_speed: u32,
    /// Read timeout handed to the device driver.
    #[serde(rename = "TimeoutMs")]
    pub timeout_ms: u64,
    /// Identifier the metrics are reported under.
    #[serde(rename = "PluginName")]
    pub plugin_name: String,
    /// Poll period used by the standalone driver.
    #[serde(rename = "Interval")]
    pub interval_secs: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        PluginConfig {
            debug: false,
            serial_device: String::from(DEFAULT_SERIAL_DEVICE),
            serial_speed: DEFAULT_SERIAL_SPEED,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            plugin_name: String::from(DEFAULT_PLUGIN_NAME),
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

/// A value as it appears in a host configuration block.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// One `Key value...` child of the plugin's configuration block.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigItem {
    pub key: String,
    pub values: Vec<ConfigValue>,
}

impl ConfigItem {
    pub fn new(key: impl Into<String>, value: ConfigValue) -> Self {
        ConfigItem {
            key: key.into(),
            values: alloc::vec![value],
        }
    }
}

impl PluginConfig {
    /// Builds a config from host configuration children, starting from defaults.
    pub fn from_items<'a, I>(items: I) -> Result<Self, TelemetryError>
    where
        I: IntoIterator<Item = &'a ConfigItem>,
    {
        let mut config = PluginConfig::default();
        for item in items {
            config.apply(item)?;
        }
        Ok(config)
    }

    /// Applies one configuration child. Keys are matched case-insensitively.
    /// On error `self` is left untouched.
    pub fn apply(&mut self, item: &ConfigItem) -> Result<(), TelemetryError> {
        let value = item
            .values
            .first()
            .ok_or_else(|| invalid(&item.key, "missing value"))?;

        let mut next = self.clone();
        match item.key.to_ascii_lowercase().as_str() {
            "debug" => next.debug = as_bool(&item.key, value)?,
            "serialdevice" => next.serial_device = as_string(&item.key, value)?,
            "serialspeed" => {
                let speed = as_u64(&item.key, value)?;
                next.serial_speed =
                    u32::try_from(speed).map_err(|_| invalid(&item.key, "out of range"))?;
            }
            "timeoutms" => next.timeout_ms = as_u64(&item.key, value)?,
            "pluginname" => next.plugin_name = as_string(&item.key, value)?,
            "interval" => next.interval_secs = as_u64(&item.key, value)?,
            _ => return Err(invalid(&item.key, "unknown option")),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Checks the rules every source of options must satisfy.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.serial_device.is_empty() {
            return Err(invalid("SerialDevice", "must not be empty"));
        }
        if self.serial_speed == 0 {
            return Err(invalid("SerialSpeed", "must be positive"));
        }
        if self.plugin_name.is_empty() {
            return Err(invalid("PluginName", "must not be empty"));
        }
        if self.interval_secs == 0 {
            return Err(invalid("Interval", "must be at least 1 second"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> TelemetryError {
    TelemetryError::InvalidConfig(format!("{key}: {reason}"))
}

fn as_bool(key: &str, value: &ConfigValue) -> Result<bool, TelemetryError> {
    match value {
        ConfigValue::Boolean(b) => Ok(*b),
        ConfigValue::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        ConfigValue::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(invalid(key, "expected a boolean")),
    }
}

fn as_string(key: &str, value: &ConfigValue) -> Result<String, TelemetryError> {
    match value {
        ConfigValue::String(s) if !s.is_empty() => Ok(s.clone()),
        _ => Err(invalid(key, "expected a non-empty string")),
    }
}

fn as_u64(key: &str, value: &ConfigValue) -> Result<u64, TelemetryError> {
    match value {
        ConfigValue::Number(n) if *n >= 0.0 && *n <= u64::MAX as f64 && *n == (*n as u64) as f64 => {
            Ok(*n as u64)
        }
        ConfigValue::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(key, &e.to_string())),
        _ => Err(invalid(key, "expected a non-negative integer")),
    }
}

// --- Decoder options ---

/// How data tokens are carried on the wire.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireMode {
    /// Data tokens are ASCII integers read directly.
    #[default]
    Text,
    /// Data tokens are byte values re-encoded before extraction.
    Bytes,
}

/// Serialisable description of a decoder: header length, wire mode and the
/// field table (`fields` for one node, `nodes` for several).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecoderConfig {
    pub shift: Option<usize>,
    pub wire: WireMode,
    pub origin: Option<PositionOrigin>,
    pub fields: Option<FieldMap>,
    pub nodes: Option<BTreeMap<String, FieldMap>>,
}

impl DecoderConfig {
    pub fn shift(&self) -> usize {
        self.shift.unwrap_or(DEFAULT_SHIFT)
    }
}

// --- Config file (std) ---

/// Contents of a standalone configuration file.
///
/// ```toml
/// [plugin]
/// Debug = true
/// SerialDevice = "/dev/ttyUSB1"
///
/// [decoder]
/// wire = "bytes"
///
/// [decoder.nodes.2]
/// tension = 5
/// ```
#[cfg(feature = "std")]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryFile {
    pub plugin: PluginConfig,
    pub decoder: DecoderConfig,
}

#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] TelemetryError),
}

#[cfg(feature = "std")]
impl TelemetryFile {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: TelemetryFile = toml::from_str(raw)?;
        file.plugin.validate()?;
        Ok(file)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
