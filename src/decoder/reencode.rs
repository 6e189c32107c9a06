// src/decoder/reencode.rs

use crate::common::{error::DecodeError, frame::Frame};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

/// Synthetic line built from a frame whose data tokens are byte values.
///
/// The text is the node id followed by each byte in decimal, so it
/// tokenizes back into `[node, b0, b1, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReencodedLine {
    text: String,
    bytes: Vec<u8>,
}

impl ReencodedLine {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The line as a frame for a second extraction pass. It is not
    /// re-validated: there is no marker, the node id is token 0.
    pub fn frame(&self) -> Frame<'_> {
        Frame::synthetic(self.text.split_whitespace().collect())
    }
}

/// Reinterprets the data tokens of `frame` as bytes.
///
/// A single token that is not an integer in `0..=255` discards the whole
/// frame: the leading bytes often carry a count, so a partial payload
/// cannot be trusted.
pub fn reencode(frame: &Frame<'_>) -> Result<ReencodedLine, DecodeError> {
    let node = frame.node_id().ok_or(DecodeError::MissingNodeId)?;

    let bytes = frame
        .data()
        .iter()
        .map(|token| {
            token.parse::<u8>().map_err(|_| DecodeError::InvalidByte {
                token: String::from(*token),
            })
        })
        .collect::<Result<Vec<u8>, _>>()?;

    let mut text = String::with_capacity(node.len() + bytes.len() * 4);
    text.push_str(node);
    for byte in &bytes {
        // Writing into a String cannot fail
        let _ = write!(text, " {byte}");
    }

    Ok(ReencodedLine { text, bytes })
}
