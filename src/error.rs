//! Error taxonomy for the bridge.
//!
//! Channel failures are fatal to whatever is running on the channel. Decode
//! failures cover a single frame; the decoder resynchronizes on the next `<`
//! and callers decide whether to skip or abort.

use core::fmt;

use embedded_io_async::ErrorKind;

/// Fatal transport failure. The session or event loop holding the channel
/// stops; reconnecting is the caller's concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// The peer closed the stream (zero-length read).
    Disconnected,
    /// The underlying transport reported an I/O error.
    Io(ErrorKind),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Disconnected => f.write_str("disconnected"),
            ChannelError::Io(kind) => write!(f, "io error: {:?}", kind),
        }
    }
}

/// A single frame could not be decoded. Never fatal to the channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame body was not valid ASCII/UTF-8 text.
    NotText,
    /// Token count was neither 2 (log/command) nor 4 (point).
    TokenCount,
    /// A point frame carried a non-integer coordinate.
    BadInteger,
    /// Frame body or token exceeded its buffer cap.
    Oversize,
    /// Bulk input was not bounded by exactly `<` and `>`.
    Unframed,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DecodeError::NotText => "frame body is not text",
            DecodeError::TokenCount => "unexpected token count",
            DecodeError::BadInteger => "malformed coordinate integer",
            DecodeError::Oversize => "frame exceeds buffer",
            DecodeError::Unframed => "input is not a delimited frame",
        };
        f.write_str(label)
    }
}

/// What the framed reader can fail with: a per-frame decode problem or a
/// fatal channel problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadError {
    Channel(ChannelError),
    Decode(DecodeError),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Channel(e) => write!(f, "channel: {}", e),
            ReadError::Decode(e) => write!(f, "decode: {}", e),
        }
    }
}

/// Why a calibration session failed. Fatal to the session, not the channel,
/// except for the embedded [`ChannelError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationError {
    /// Collinear or duplicate touch points, or an empty pressure range; the
    /// solver refuses to emit NaN or infinite coefficients.
    Degenerate,
    /// The channel died mid-session.
    Channel(ChannelError),
    /// A malformed frame arrived during acquisition.
    Decode(DecodeError),
    /// The caller stopped the session before the point phase finished.
    Cancelled,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::Degenerate => f.write_str("degenerate calibration"),
            CalibrationError::Channel(e) => write!(f, "channel: {}", e),
            CalibrationError::Decode(e) => write!(f, "decode: {}", e),
            CalibrationError::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl From<ChannelError> for CalibrationError {
    fn from(e: ChannelError) -> Self {
        CalibrationError::Channel(e)
    }
}

impl From<ReadError> for CalibrationError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Channel(inner) => CalibrationError::Channel(inner),
            ReadError::Decode(inner) => CalibrationError::Decode(inner),
        }
    }
}
