//! Codec error types.

use thiserror::Error;

/// Errors that can occur when parsing or building DPA frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Frame length is outside the range allowed for its message kind.
    #[error("bad {kind} length: expected {min}..={max} bytes, got {actual}")]
    BadLength {
        /// Message kind the frame was parsed as.
        kind: &'static str,
        /// Minimum allowed length.
        min: usize,
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Confirmation frame without the confirmation status byte.
    #[error("bad confirmation code: expected 0xFF, got 0x{0:02X}")]
    BadConfirmationCode(u8),

    /// Response command byte without the response flag.
    #[error("response command 0x{0:02X} does not have the response flag set")]
    MalformedCommandFlag(u8),

    /// Response code outside the known set.
    #[error("unknown response code: 0x{0:02X}")]
    UnknownResponseCode(u8),

    /// Response carrying the confirmation status.
    #[error("confirmation code 0xFF is not a valid response code")]
    UnexpectedConfirmationCode,

    /// Request payload exceeds the frame capacity.
    #[error("payload too long: maximum {max} bytes, got {actual}")]
    PayloadTooLong {
        /// Maximum allowed payload length.
        max: usize,
        /// Actual payload length.
        actual: usize,
    },
}
