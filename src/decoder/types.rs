//! Shared frame and output types for the decode pipeline.

use std::fmt;

/// Byte length of a frame header; also the minimum legal frame size.
pub const HEADER_LEN: usize = 10;

/// The 10-byte header shared by sync frames and message frames.
///
/// Little-endian layout: `{crc: u8, size: u8, addr: u32, time: u32}`.
/// A sync frame carries `addr == 0` and its `time` is the timestamp
/// baseline in seconds; a message frame carries the format string address
/// in `addr` and its offset from the baseline, in microseconds, in `time`.
/// `size` counts the header itself plus the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub crc: u8,
    pub size: u8,
    pub addr: u32,
    pub time: u32,
}

impl FrameHeader {
    /// Parse a header from the start of `buf`. Returns `None` when fewer
    /// than [`HEADER_LEN`] bytes are available.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            crc: buf[0],
            size: buf[1],
            addr: u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]),
            time: u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]),
        })
    }
}

/// One decoded substitution value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Argument {
    /// From `%c`: a single signed byte, rendered as a character when
    /// printable.
    Char(i8),
    /// From `%d` and `%lld`.
    Int(i64),
    /// From `%x` and `%llu`; the radix is applied at render time.
    Uint(u64),
    /// From `%u`, `%X` and `%s`: values pre-rendered to text while
    /// decoding.
    Text(String),
}

/// One rendered output line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// Timestamp baseline from the page's sync frame, in seconds.
    pub seconds: u32,
    /// Offset from the baseline, in microseconds.
    pub micros: u32,
    /// The rendered message text.
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}.{:06} {}", self.seconds, self.micros, self.message)
    }
}
