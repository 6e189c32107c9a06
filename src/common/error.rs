// src/common/error.rs

use alloc::string::String;

/// Errors surfaced by the cycle driver and its adapters.
///
/// Nothing in a poll cycle returns this: faults inside a cycle degrade to fewer
/// metrics. It is used where a caller asked for something explicitly (loading
/// configuration, building a decoder).
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError<E = ()>
where
    E: core::fmt::Debug, // Debug is enough for the generic Io error
{
    /// Underlying I/O error from the byte source.
    #[error("I/O error: {0:?}")]
    Io(E),

    /// A configuration option had a value of the wrong shape.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// Allow mapping from the underlying source error
impl<E: core::fmt::Debug> From<E> for TelemetryError<E> {
    fn from(e: E) -> Self {
        TelemetryError::Io(e)
    }
}

/// Why a single frame was dropped during decoding.
///
/// These are per-line reasons: they are logged and counted, then the cycle
/// moves on to the next line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The node-id token has no entry in a node-keyed field table.
    #[error("node number {0} not in data definition")]
    UnknownNode(String),

    /// The frame is too short to carry a node-id token.
    #[error("frame carries no node id")]
    MissingNodeId,

    /// A token in the byte range is not an integer in 0..=255.
    #[error("invalid byte value {token:?}")]
    InvalidByte { token: String },
}
