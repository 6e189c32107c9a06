// src/common/frame.rs

use alloc::string::String;
use alloc::vec::Vec;

/// Literal first token of every data frame.
pub const FRAME_MARKER: &str = "OK";

/// Default number of header tokens (`OK <node-id>`) preceding the data tokens.
pub const DEFAULT_SHIFT: usize = 2;

// --- Lines ---

/// One text line cut from a raw buffer, with NUL padding removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line(String);

impl Line {
    /// Builds a line from raw bytes, dropping every `\0` and replacing
    /// invalid UTF-8 so the damaged token fails numeric parsing later.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let cleaned: Vec<u8> = bytes.iter().copied().filter(|b| *b != 0).collect();
        Line(String::from_utf8_lossy(&cleaned).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whitespace tokens, empty tokens removed, order preserved.
    pub fn tokens(&self) -> Vec<&str> {
        self.0.split_whitespace().collect()
    }
}

/// Lazily splits a raw buffer on `\n` into [`Line`]s.
///
/// The trailing segment after the last newline is yielded too, and empty
/// segments are passed through: rejecting them is the validator's job.
/// An empty buffer yields nothing.
#[derive(Debug, Clone)]
pub struct LineSplitter<'a> {
    inner: Option<core::slice::Split<'a, u8, fn(&u8) -> bool>>,
}

fn is_newline(b: &u8) -> bool {
    *b == b'\n'
}

impl<'a> LineSplitter<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        let inner = if buffer.is_empty() {
            None
        } else {
            Some(buffer.split(is_newline as fn(&u8) -> bool))
        };
        LineSplitter { inner }
    }
}

impl Iterator for LineSplitter<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        self.inner.as_mut()?.next().map(Line::from_bytes)
    }
}

// --- Frames ---

/// Returns true iff `tokens` is a well-formed data frame: non-empty, starting
/// with [`FRAME_MARKER`], and at least `shift` tokens long.
pub fn is_frame(tokens: &[&str], shift: usize) -> bool {
    match tokens.first() {
        Some(first) => *first == FRAME_MARKER && tokens.len() >= shift,
        None => false,
    }
}

/// Why a line was not accepted as a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Rejection {
    /// Nothing left after tokenizing.
    Empty,
    /// First token is not the `OK` marker.
    BadMarker,
    /// Fewer tokens than the header length.
    TooShort,
}

/// A token sequence that extraction can resolve positions against.
///
/// Text frames come out of [`Frame::validate`]; synthetic frames built by the
/// byte re-encoder have a one-token header holding only the node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    tokens: Vec<&'a str>,
    header_len: usize,
    node_index: usize,
}

impl<'a> Frame<'a> {
    /// Accepts `tokens` as a text frame with `shift` header tokens.
    pub fn validate(tokens: Vec<&'a str>, shift: usize) -> Result<Self, Rejection> {
        if is_frame(&tokens, shift) {
            return Ok(Frame {
                tokens,
                header_len: shift,
                node_index: 1,
            });
        }
        let rejection = match tokens.first() {
            None => Rejection::Empty,
            Some(first) if *first != FRAME_MARKER => Rejection::BadMarker,
            Some(_) => Rejection::TooShort,
        };
        Err(rejection)
    }

    /// A frame whose first token is the node id and the data follows directly.
    pub(crate) fn synthetic(tokens: Vec<&'a str>) -> Self {
        Frame {
            tokens,
            header_len: 1,
            node_index: 0,
        }
    }

    pub fn tokens(&self) -> &[&'a str] {
        &self.tokens
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Node-id token, if the frame is long enough to carry one.
    pub fn node_id(&self) -> Option<&'a str> {
        self.tokens.get(self.node_index).copied()
    }

    /// Tokens after the header.
    pub fn data(&self) -> &[&'a str] {
        self.tokens.get(self.header_len..).unwrap_or(&[])
    }
}
