// src/plugin/mod.rs

// Std adapters for the byte source and metric sink
#[cfg(feature = "std")]
pub mod putval;
#[cfg(feature = "serial")]
pub mod serial;

use crate::common::{
    config::PluginConfig,
    error::TelemetryError,
    hal_traits::{ByteSource, GaugePoint, MetricSink, OpenOutcome},
    types::MetricSnapshot,
};
use crate::decoder::{DecodeStats, Freshness, StaleValueCache, TelemetryDecoder};
use alloc::vec::Vec;

/// What one poll cycle did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Whether the emitted values are this cycle's or replayed.
    pub freshness: Freshness,
    /// Bytes read from the source.
    pub bytes_read: usize,
    /// Points accepted by the sink.
    pub dispatched: usize,
    /// Points the sink refused.
    pub dispatch_failures: usize,
    pub decode: DecodeStats,
}

/// Cycle driver: reads the source, decodes, applies the stale fallback and
/// pushes one gauge point per metric into the sink.
///
/// `poll_once` takes `&mut self`, so cycles cannot overlap; the stale cache
/// is the only state carried from one cycle to the next.
#[derive(Debug)]
pub struct TelemetryPlugin<S, K>
where
    S: ByteSource,
    K: MetricSink,
{
    config: PluginConfig,
    decoder: TelemetryDecoder,
    source: S,
    sink: K,
    cache: StaleValueCache,
    buffer: Vec<u8>,
}

impl<S, K> TelemetryPlugin<S, K>
where
    S: ByteSource,
    K: MetricSink,
{
    pub fn new(decoder: TelemetryDecoder, source: S, sink: K) -> Self {
        TelemetryPlugin {
            config: PluginConfig::default(),
            decoder,
            source,
            sink,
            cache: StaleValueCache::new(),
            buffer: Vec::new(),
        }
    }

    /// Installs host configuration. Device options are forwarded to the source.
    pub fn configure(&mut self, config: PluginConfig) {
        self.decoder.set_verbose(config.debug);
        self.source.apply_config(&config);
        tracing::info!(
            plugin = %config.plugin_name,
            device = %config.serial_device,
            speed = config.serial_speed,
            debug = config.debug,
            "configured"
        );
        self.config = config;
    }

    /// Opens the source once up front. A failure here is not fatal: every
    /// cycle tries again.
    pub fn start(&mut self) -> OpenOutcome {
        let outcome = self.source.open();
        self.log_open(&outcome);
        outcome
    }

    /// Runs one cycle. Never fails: every fault degrades to fewer metrics or
    /// to replaying the last good snapshot.
    pub fn poll_once(&mut self) -> PollReport {
        let bytes_read = match self.read_cycle_buffer() {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "read failed, no samples this cycle");
                self.buffer.clear();
                0
            }
        };

        let decoded = self.decoder.decode(&self.buffer);
        let decode = decoded.stats;
        let fresh = decoded.snapshot();
        self.buffer.clear();

        let (freshness, emitted) = self.cache.resolve(fresh);
        if freshness == Freshness::Stale {
            tracing::info!(metrics = emitted.len(), "no samples, replaying last values");
        }

        let (dispatched, dispatch_failures) =
            dispatch_snapshot(&mut self.sink, &self.config.plugin_name, emitted, self.config.debug);

        PollReport {
            freshness,
            bytes_read,
            dispatched,
            dispatch_failures,
            decode,
        }
    }

    /// Last snapshot handed to the sink (empty before the first good cycle).
    pub fn last_snapshot(&self) -> &MetricSnapshot {
        self.cache.last()
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn decoder(&self) -> &TelemetryDecoder {
        &self.decoder
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    // --- Cycle helpers ---

    /// Fills `self.buffer` with whatever is waiting. An unopenable source or an
    /// empty input queue is an empty buffer, not an error.
    fn read_cycle_buffer(&mut self) -> Result<usize, TelemetryError<S::Error>> {
        self.buffer.clear();

        let outcome = self.source.open();
        if !outcome.is_open() {
            self.log_open(&outcome);
            return Ok(0);
        }

        match self.source.read_available(&mut self.buffer) {
            Ok(n) => {
                if self.config.debug {
                    tracing::debug!(bytes = n, "read serial buffer");
                }
                Ok(n)
            }
            Err(nb::Error::WouldBlock) => {
                if self.config.debug {
                    tracing::debug!("empty buffer");
                }
                Ok(0)
            }
            Err(nb::Error::Other(e)) => Err(TelemetryError::Io(e)),
        }
    }

    fn log_open(&self, outcome: &OpenOutcome) {
        let device = &self.config.serial_device;
        match outcome {
            OpenOutcome::Opened => {
                if self.config.debug {
                    tracing::debug!(%device, "serial connection is ok");
                }
            }
            OpenOutcome::DeviceMissing => tracing::warn!(%device, "device not found"),
            OpenOutcome::OpenFailed(reason) => tracing::warn!(
                %device,
                speed = self.config.serial_speed,
                %reason,
                "error opening serial device"
            ),
        }
    }
}

/// Sends one gauge point per metric; a refused point does not stop the rest.
/// Returns `(accepted, refused)`.
fn dispatch_snapshot<K: MetricSink>(
    sink: &mut K,
    plugin: &str,
    snapshot: &MetricSnapshot,
    debug: bool,
) -> (usize, usize) {
    let mut accepted = 0;
    let mut refused = 0;
    for (metric, &value) in snapshot {
        if debug {
            tracing::debug!(%metric, value, "dispatching");
        }
        let point = GaugePoint {
            plugin,
            plugin_instance: metric,
            type_instance: metric,
            value,
        };
        match sink.dispatch(&point) {
            Ok(()) => accepted += 1,
            Err(e) => {
                tracing::warn!(%metric, error = ?e, "dispatch failed");
                refused += 1;
            }
        }
    }
    (accepted, refused)
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{FieldMap, FieldTable};
    use alloc::collections::VecDeque;
    use alloc::string::String;
    use alloc::vec;

    // --- Mock Comm Error ---
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    struct MockCommError;

    // --- Mock Source ---
    // Each cycle pops one scripted step; an exhausted script means nothing waiting.
    enum Step {
        Data(&'static [u8]),
        Fail,
    }

    struct MockSource {
        open_results: VecDeque<OpenOutcome>,
        script: VecDeque<Step>,
        opens: usize,
        applied_device: Option<String>,
    }

    impl MockSource {
        fn new(script: Vec<Step>) -> Self {
            MockSource {
                open_results: VecDeque::new(),
                script: script.into(),
                opens: 0,
                applied_device: None,
            }
        }

        fn with_open_results(mut self, results: Vec<OpenOutcome>) -> Self {
            self.open_results = results.into();
            self
        }
    }

    impl ByteSource for MockSource {
        type Error = MockCommError;

        fn open(&mut self) -> OpenOutcome {
            self.opens += 1;
            self.open_results.pop_front().unwrap_or(OpenOutcome::Opened)
        }

        fn read_available(&mut self, buf: &mut Vec<u8>) -> nb::Result<usize, Self::Error> {
            match self.script.pop_front() {
                Some(Step::Data(bytes)) if !bytes.is_empty() => {
                    buf.extend_from_slice(bytes);
                    Ok(bytes.len())
                }
                Some(Step::Fail) => Err(nb::Error::Other(MockCommError)),
                _ => Err(nb::Error::WouldBlock),
            }
        }

        fn apply_config(&mut self, config: &PluginConfig) {
            self.applied_device = Some(config.serial_device.clone());
        }
    }

    // --- Mock Sink ---
    // Refuses points whose key is listed in `refuse`.
    #[derive(Default)]
    struct MockSink {
        points: Vec<(String, String, String, f64)>,
        refuse: Vec<&'static str>,
    }

    impl MetricSink for MockSink {
        type Error = MockCommError;

        fn dispatch(&mut self, point: &GaugePoint<'_>) -> Result<(), Self::Error> {
            if self.refuse.iter().any(|r| *r == point.type_instance) {
                return Err(MockCommError);
            }
            assert_eq!(point.kind(), "gauge");
            self.points.push((
                point.plugin.into(),
                point.plugin_instance.into(),
                point.type_instance.into(),
                point.value,
            ));
            Ok(())
        }
    }

    fn tension_decoder() -> TelemetryDecoder {
        TelemetryDecoder::new(FieldTable::flat([("tension", 1)]))
    }

    fn plugin(script: Vec<Step>) -> TelemetryPlugin<MockSource, MockSink> {
        TelemetryPlugin::new(tension_decoder(), MockSource::new(script), MockSink::default())
    }

    #[test]
    fn test_cycle_dispatches_mean() {
        let mut plugin = plugin(vec![Step::Data(b"OK 2 3\nOK 2 5\n")]);
        let report = plugin.poll_once();
        assert_eq!(report.freshness, Freshness::Fresh);
        assert_eq!(report.bytes_read, 14);
        assert_eq!(report.dispatched, 1);
        assert_eq!(
            plugin.sink().points,
            vec![(
                String::from("arduino"),
                String::from("tension"),
                String::from("tension"),
                4.0
            )]
        );
    }

    #[test]
    fn test_empty_cycle_before_any_data_emits_nothing() {
        let mut plugin = plugin(vec![]);
        let report = plugin.poll_once();
        assert_eq!(report.freshness, Freshness::Empty);
        assert_eq!(report.dispatched, 0);
        assert!(plugin.sink().points.is_empty());
    }

    #[test]
    fn test_empty_cycle_replays_cache() {
        let mut plugin = plugin(vec![Step::Data(b"OK 2 3\n"), Step::Data(b"")]);
        plugin.poll_once();
        let before = plugin.last_snapshot().clone();

        let report = plugin.poll_once();
        assert_eq!(report.freshness, Freshness::Stale);
        assert_eq!(plugin.last_snapshot(), &before);
        assert_eq!(plugin.sink().points.len(), 2);
        assert_eq!(plugin.sink().points[1].3, 3.0);
    }

    #[test]
    fn test_garbage_only_cycle_replays_cache() {
        let mut plugin = plugin(vec![Step::Data(b"OK 2 8\n"), Step::Data(b"OK 2 x\nERR\n")]);
        plugin.poll_once();
        let report = plugin.poll_once();
        assert_eq!(report.freshness, Freshness::Stale);
        assert_eq!(report.decode.field_errors, 1);
        assert_eq!(plugin.sink().points[1].3, 8.0);
    }

    #[test]
    fn test_read_error_falls_back_to_cache() {
        let mut plugin = plugin(vec![Step::Data(b"OK 2 6\n"), Step::Fail]);
        plugin.poll_once();
        let report = plugin.poll_once();
        assert_eq!(report.freshness, Freshness::Stale);
        assert_eq!(report.bytes_read, 0);
        assert_eq!(plugin.sink().points[1].3, 6.0);
    }

    #[test]
    fn test_missing_device_is_retried_each_cycle() {
        let source = MockSource::new(vec![Step::Data(b"OK 2 1\n")]).with_open_results(vec![
            OpenOutcome::DeviceMissing,
            OpenOutcome::OpenFailed("busy".into()),
            OpenOutcome::DeviceMissing,
        ]);
        let mut plugin = TelemetryPlugin::new(tension_decoder(), source, MockSink::default());

        assert_eq!(plugin.start(), OpenOutcome::DeviceMissing);
        assert_eq!(plugin.poll_once().freshness, Freshness::Empty);
        assert_eq!(plugin.poll_once().freshness, Freshness::Empty);
        assert_eq!(plugin.poll_once().freshness, Freshness::Fresh);
        assert_eq!(plugin.source().opens, 4);
    }

    #[test]
    fn test_refused_point_does_not_stop_others() {
        let decoder = TelemetryDecoder::new(FieldTable::flat([("a", 1), ("b", 2)]));
        let sink = MockSink {
            refuse: vec!["a"],
            ..Default::default()
        };
        let mut plugin =
            TelemetryPlugin::new(decoder, MockSource::new(vec![Step::Data(b"OK 2 1 2\n")]), sink);
        let report = plugin.poll_once();
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.dispatch_failures, 1);
        assert_eq!(plugin.sink().points[0].2, "b");
    }

    #[test]
    fn test_configure_sets_name_and_forwards_device() {
        let mut plugin = plugin(vec![Step::Data(b"OK 2 3\n")]);
        plugin.configure(PluginConfig {
            debug: true,
            serial_device: "/dev/ttyACM0".into(),
            plugin_name: "edf".into(),
            ..Default::default()
        });
        assert_eq!(plugin.source().applied_device.as_deref(), Some("/dev/ttyACM0"));
        plugin.poll_once();
        assert_eq!(plugin.sink().points[0].0, "edf");
    }

    #[test]
    fn test_node_keyed_cycle() {
        let mut fields = FieldMap::new();
        fields.insert("tension".into(), 5);
        let decoder = TelemetryDecoder::new(FieldTable::node_keyed([("2", fields)]));
        let mut plugin = TelemetryPlugin::new(
            decoder,
            MockSource::new(vec![Step::Data(b"OK 2 3 4 5 9\n")]),
            MockSink::default(),
        );
        plugin.poll_once();
        assert_eq!(plugin.last_snapshot().get("tension"), Some(9.0));
    }
}
