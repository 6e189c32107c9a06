// src/plugin/serial.rs

use crate::common::{
    config::PluginConfig,
    hal_traits::{ByteSource, OpenOutcome},
};
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::time::Duration;
use std::io::Read;
use std::path::Path;

/// Byte source reading whatever the serial driver has queued.
///
/// The port is opened lazily by [`ByteSource::open`] and dropped after a read
/// error, so a later cycle reconnects.
pub struct SerialSource {
    device: String,
    speed: u32,
    timeout: Duration,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl core::fmt::Debug for SerialSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerialSource")
            .field("device", &self.device)
            .field("speed", &self.speed)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialSource {
    pub fn new(device: impl Into<String>, speed: u32) -> Self {
        SerialSource {
            device: device.into(),
            speed,
            timeout: Duration::from_millis(crate::common::config::DEFAULT_TIMEOUT_MS),
            port: None,
        }
    }

    pub fn from_config(config: &PluginConfig) -> Self {
        let mut source = SerialSource::new(config.serial_device.clone(), config.serial_speed);
        source.timeout = Duration::from_millis(config.timeout_ms);
        source
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl ByteSource for SerialSource {
    type Error = serialport::Error;

    fn open(&mut self) -> OpenOutcome {
        if !Path::new(&self.device).exists() {
            self.port = None;
            return OpenOutcome::DeviceMissing;
        }
        if self.port.is_some() {
            return OpenOutcome::Opened;
        }

        tracing::info!(device = %self.device, speed = self.speed, "connecting");
        match serialport::new(&self.device, self.speed)
            .timeout(self.timeout)
            .open()
        {
            Ok(port) => {
                self.port = Some(port);
                OpenOutcome::Opened
            }
            Err(e) => OpenOutcome::OpenFailed(e.to_string()),
        }
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> nb::Result<usize, Self::Error> {
        let Some(port) = self.port.as_mut() else {
            return Err(nb::Error::WouldBlock);
        };

        let result = port.bytes_to_read().and_then(|waiting| {
            let waiting = waiting as usize;
            if waiting == 0 {
                return Ok(0);
            }
            let start = buf.len();
            buf.resize(start + waiting, 0);
            match port.read(&mut buf[start..]) {
                Ok(n) => {
                    buf.truncate(start + n);
                    Ok(n)
                }
                Err(e) => {
                    buf.truncate(start);
                    Err(serialport::Error::from(e))
                }
            }
        });

        match result {
            Ok(0) => Err(nb::Error::WouldBlock),
            Ok(n) => Ok(n),
            Err(e) => {
                // Reopen on the next cycle
                self.port = None;
                Err(nb::Error::Other(e))
            }
        }
    }

    fn apply_config(&mut self, config: &PluginConfig) {
        let changed = self.device != config.serial_device || self.speed != config.serial_speed;
        self.device = config.serial_device.clone();
        self.speed = config.serial_speed;
        self.timeout = Duration::from_millis(config.timeout_ms);
        if changed {
            self.port = None;
        }
    }
}
