// src/decoder/mod.rs

// Pipeline stages, leaves first
pub mod aggregate;
pub mod cache;
pub mod extract;
pub mod reencode;

pub use aggregate::{aggregate, mean};
pub use cache::{Freshness, StaleValueCache};
pub use extract::{Extracted, FieldExtractor};
pub use reencode::{reencode, ReencodedLine};

use crate::common::{
    config::{DecoderConfig, WireMode},
    error::{DecodeError, TelemetryError},
    frame::{Frame, LineSplitter, DEFAULT_SHIFT},
    types::{FieldTable, MetricAccumulator, MetricSnapshot, PositionOrigin},
};
use alloc::string::String;

/// Per-cycle counters, mostly for diagnostics and tests.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DecodeStats {
    /// Lines cut from the buffer, empty ones included.
    pub lines: usize,
    /// Lines accepted as frames.
    pub frames: usize,
    /// Lines rejected by the frame validator.
    pub rejected: usize,
    /// Frames dropped whole (unknown node, bad byte payload).
    pub dropped: usize,
    /// Individual fields skipped for non-numeric values.
    pub field_errors: usize,
    /// Samples collected.
    pub samples: usize,
}

/// Samples and counters from one buffer.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub samples: MetricAccumulator,
    pub stats: DecodeStats,
}

impl Decoded {
    /// Mean per metric.
    pub fn snapshot(self) -> MetricSnapshot {
        aggregate(self.samples)
    }
}

/// Turns one raw buffer into metric samples.
///
/// Text frames go through the text extractor when one is configured. In byte
/// mode each frame is also re-encoded and the synthetic line goes through the
/// byte extractor.
#[derive(Debug, Clone)]
pub struct TelemetryDecoder {
    shift: usize,
    text: Option<FieldExtractor>,
    bytes: Option<FieldExtractor>,
    verbose: bool,
}

impl TelemetryDecoder {
    /// Text wire mode with the default header length.
    pub fn new(table: FieldTable) -> Self {
        TelemetryDecoder {
            shift: DEFAULT_SHIFT,
            text: Some(FieldExtractor::new(table)),
            bytes: None,
            verbose: false,
        }
    }

    /// Byte wire mode: fields are read from the re-encoded line only.
    pub fn byte_mode(table: FieldTable) -> Self {
        TelemetryDecoder {
            shift: DEFAULT_SHIFT,
            text: None,
            bytes: Some(FieldExtractor::new(table)),
            verbose: false,
        }
    }

    /// Builds a decoder from its serialisable description.
    pub fn from_config(config: &DecoderConfig) -> Result<Self, TelemetryError> {
        let table = match (&config.fields, &config.nodes) {
            (Some(fields), None) => FieldTable::Flat(fields.clone()),
            (None, Some(nodes)) => FieldTable::NodeKeyed(nodes.clone()),
            (Some(_), Some(_)) => {
                return Err(TelemetryError::InvalidConfig(String::from(
                    "decoder: set either `fields` or `nodes`, not both",
                )))
            }
            (None, None) => {
                return Err(TelemetryError::InvalidConfig(String::from(
                    "decoder: no field table (`fields` or `nodes`)",
                )))
            }
        };

        let mut decoder = match config.wire {
            WireMode::Text => TelemetryDecoder::new(table),
            WireMode::Bytes => TelemetryDecoder::byte_mode(table),
        }
        .with_shift(config.shift());
        if let Some(origin) = config.origin {
            decoder = decoder.with_origin(origin);
        }
        Ok(decoder)
    }

    pub fn with_shift(mut self, shift: usize) -> Self {
        self.shift = shift;
        self
    }

    /// Overrides the position origin of every configured table.
    pub fn with_origin(mut self, origin: PositionOrigin) -> Self {
        self.text = self.text.map(|e| e.with_origin(origin));
        self.bytes = self.bytes.map(|e| e.with_origin(origin));
        self
    }

    /// Adds a second pass over the byte re-encoding of each frame.
    pub fn with_byte_fields(mut self, table: FieldTable) -> Self {
        self.bytes = Some(FieldExtractor::new(table));
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Turns per-line debug events on or off.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn shift(&self) -> usize {
        self.shift
    }

    pub fn wire_mode(&self) -> WireMode {
        if self.bytes.is_some() {
            WireMode::Bytes
        } else {
            WireMode::Text
        }
    }

    /// Decodes a whole buffer into a fresh accumulator.
    pub fn decode(&self, buffer: &[u8]) -> Decoded {
        let mut samples = MetricAccumulator::new();
        let stats = self.decode_into(buffer, &mut samples);
        Decoded { samples, stats }
    }

    /// Decodes a whole buffer, appending to `acc`.
    pub fn decode_into(&self, buffer: &[u8], acc: &mut MetricAccumulator) -> DecodeStats {
        let mut stats = DecodeStats::default();

        for line in LineSplitter::new(buffer) {
            stats.lines += 1;
            if self.verbose {
                tracing::debug!(line = %line.as_str(), "read line");
            }

            let frame = match Frame::validate(line.tokens(), self.shift) {
                Ok(frame) => frame,
                Err(reason) => {
                    if self.verbose {
                        tracing::debug!(?reason, line = %line.as_str(), "not a frame");
                    }
                    stats.rejected += 1;
                    continue;
                }
            };
            stats.frames += 1;

            if let Err(e) = self.decode_frame(&frame, acc, &mut stats) {
                tracing::warn!(error = %e, line = %line.as_str(), "dropping frame");
                stats.dropped += 1;
            }
        }

        stats
    }

    /// Decodes one frame into a scratch accumulator and merges it into `acc`
    /// only if every pass succeeds, so a dropped frame leaves no samples.
    fn decode_frame(
        &self,
        frame: &Frame<'_>,
        acc: &mut MetricAccumulator,
        stats: &mut DecodeStats,
    ) -> Result<(), DecodeError> {
        let mut scratch = MetricAccumulator::new();
        let mut total = Extracted::default();

        if let Some(text) = &self.text {
            let out = text.extract(frame, &mut scratch)?;
            total.samples += out.samples;
            total.field_errors += out.field_errors;
        }

        if let Some(bytes) = &self.bytes {
            let line = reencode(frame)?;
            if self.verbose {
                tracing::debug!(line = %line.as_str(), "re-encoded frame");
            }
            let out = bytes.extract(&line.frame(), &mut scratch)?;
            total.samples += out.samples;
            total.field_errors += out.field_errors;
        }

        acc.append(scratch);
        stats.samples += total.samples;
        stats.field_errors += total.field_errors;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::FieldMap;

    fn tension_flat() -> TelemetryDecoder {
        TelemetryDecoder::new(FieldTable::flat([("tension", 1)]))
    }

    fn node(fields: &[(&str, usize)]) -> FieldMap {
        fields.iter().map(|(k, p)| (String::from(*k), *p)).collect()
    }

    #[test]
    fn test_single_line_single_sample() {
        let decoded = tension_flat().decode(b"OK 2 3 4\n");
        assert_eq!(decoded.samples.samples("tension"), Some(&[3][..]));
        assert_eq!(decoded.stats.frames, 1);
        assert_eq!(decoded.stats.lines, 2); // trailing empty segment
        assert_eq!(decoded.stats.rejected, 1);
    }

    #[test]
    fn test_two_lines_average() {
        let decoded = tension_flat().decode(b"OK 2 3\nOK 2 5\n");
        assert_eq!(decoded.samples.samples("tension"), Some(&[3, 5][..]));
        assert_eq!(decoded.snapshot().get("tension"), Some(4.0));
    }

    #[test]
    fn test_empty_buffer_has_no_samples() {
        let decoded = tension_flat().decode(b"");
        assert!(decoded.samples.is_empty());
        assert_eq!(decoded.stats, DecodeStats::default());
    }

    #[test]
    fn test_noise_lines_are_skipped() {
        let decoded = tension_flat().decode(b"\0\0garbage\nOK\n ok 2 9\nOK 2 7\r\n");
        assert_eq!(decoded.samples.samples("tension"), Some(&[7][..]));
        assert_eq!(decoded.stats.frames, 1);
    }

    #[test]
    fn test_non_numeric_field_keeps_other_fields() {
        let decoder = TelemetryDecoder::new(FieldTable::flat([("a", 1), ("b", 2)]));
        let decoded = decoder.decode(b"OK 2 x 4\n");
        assert_eq!(decoded.samples.samples("a"), None);
        assert_eq!(decoded.samples.samples("b"), Some(&[4][..]));
        assert_eq!(decoded.stats.field_errors, 1);
    }

    #[test]
    fn test_node_keyed_selects_node() {
        let decoder = TelemetryDecoder::new(FieldTable::node_keyed([("2", node(&[("tension", 5)]))]));
        let decoded = decoder.decode(b"OK 2 3 4 5 9\nOK 3 1 1 1 1\n");
        assert_eq!(decoded.samples.samples("tension"), Some(&[9][..]));
        assert_eq!(decoded.stats.dropped, 1);
    }

    #[test]
    fn test_byte_mode_reads_reencoded_line() {
        let table = FieldTable::node_keyed([
            ("2", node(&[("tension", 2)])),
            ("3", node(&[("temperature", 1)])),
        ]);
        let decoder = TelemetryDecoder::byte_mode(table);
        assert_eq!(decoder.wire_mode(), WireMode::Bytes);
        let decoded = decoder.decode(b"OK 2 3 4\nOK 3 30\nOK 2 5 300\n");
        assert_eq!(decoded.samples.samples("tension"), Some(&[4][..]));
        assert_eq!(decoded.samples.samples("temperature"), Some(&[30][..]));
        assert_eq!(decoded.stats.dropped, 1);
    }

    #[test]
    fn test_text_and_byte_passes_together() {
        let decoder = TelemetryDecoder::new(FieldTable::flat([("first", 1)]))
            .with_byte_fields(FieldTable::flat([("second", 2)]));
        let decoded = decoder.decode(b"OK 2 10 20\n");
        assert_eq!(decoded.samples.samples("first"), Some(&[10][..]));
        assert_eq!(decoded.samples.samples("second"), Some(&[20][..]));
        assert_eq!(decoded.stats.samples, 2);
    }

    #[test]
    fn test_bad_byte_range_drops_text_samples_too() {
        let decoder = TelemetryDecoder::new(FieldTable::flat([("first", 1)]))
            .with_byte_fields(FieldTable::flat([("second", 2)]));
        let decoded = decoder.decode(b"OK 2 10 300\nOK 2 7 8\n");
        assert_eq!(decoded.samples.samples("first"), Some(&[7][..]));
        assert_eq!(decoded.samples.samples("second"), Some(&[8][..]));
        assert_eq!(decoded.stats.dropped, 1);
        assert_eq!(decoded.stats.samples, 2);
    }

    #[test]
    fn test_unknown_node_in_byte_pass_drops_text_samples() {
        let decoder = TelemetryDecoder::new(FieldTable::flat([("first", 1)]))
            .with_byte_fields(FieldTable::node_keyed([("2", node(&[("second", 1)]))]));
        let decoded = decoder.decode(b"OK 3 10 20\n");
        assert!(decoded.samples.is_empty());
        assert_eq!(decoded.stats.dropped, 1);
        assert_eq!(decoded.stats.samples, 0);
    }

    #[test]
    fn test_from_config_requires_one_table() {
        let mut config = DecoderConfig::default();
        assert!(TelemetryDecoder::from_config(&config).is_err());

        config.fields = Some(node(&[("tension", 1)]));
        let decoder = TelemetryDecoder::from_config(&config).unwrap();
        assert_eq!(decoder.shift(), DEFAULT_SHIFT);
        assert_eq!(decoder.wire_mode(), WireMode::Text);

        config.nodes = Some(Default::default());
        assert!(TelemetryDecoder::from_config(&config).is_err());
    }

    #[test]
    fn test_from_config_origin_override() {
        let config = DecoderConfig {
            shift: Some(1),
            origin: Some(PositionOrigin::FromMarker),
            fields: Some(node(&[("id", 1)])),
            ..Default::default()
        };
        let decoder = TelemetryDecoder::from_config(&config).unwrap();
        let decoded = decoder.decode(b"OK 42\n");
        assert_eq!(decoded.samples.samples("id"), Some(&[42][..]));
    }

    /// Counts DEBUG events so tests can see whether per-line diagnostics ran.
    #[cfg(feature = "std")]
    struct DebugCounter(alloc::sync::Arc<core::sync::atomic::AtomicUsize>);

    #[cfg(feature = "std")]
    impl tracing::Subscriber for DebugCounter {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }
        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}
        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}
        fn event(&self, event: &tracing::Event<'_>) {
            if *event.metadata().level() == tracing::Level::DEBUG {
                self.0.fetch_add(1, core::sync::atomic::Ordering::SeqCst);
            }
        }
        fn enter(&self, _: &tracing::span::Id) {}
        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[cfg(feature = "std")]
    fn debug_events(decoder: &TelemetryDecoder, buffer: &[u8]) -> usize {
        let count = alloc::sync::Arc::new(core::sync::atomic::AtomicUsize::new(0));
        let subscriber = DebugCounter(count.clone());
        tracing::subscriber::with_default(subscriber, || {
            decoder.decode(buffer);
        });
        count.load(core::sync::atomic::Ordering::SeqCst)
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_debug_events_follow_verbose_flag() {
        let buffer = b"OK 2 3 4\nnoise\n";
        let mut decoder = TelemetryDecoder::byte_mode(FieldTable::flat([("tension", 1)]));
        assert_eq!(debug_events(&decoder, buffer), 0);

        decoder.set_verbose(true);
        // three lines read, two rejected, one re-encoded
        assert_eq!(debug_events(&decoder, buffer), 6);

        let quiet = decoder.with_verbose(false);
        assert_eq!(debug_events(&quiet, buffer), 0);
    }
}
