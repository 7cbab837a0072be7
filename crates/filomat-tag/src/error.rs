use filomat_types::TypeError;
use thiserror::Error;

/// Errors from NDEF framing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NdefError {
    #[error("empty NDEF message")]
    Empty,

    #[error("truncated record: need {needed} bytes, have {remaining}")]
    Truncated { needed: usize, remaining: usize },

    #[error("chunked records are not supported")]
    Chunked,

    #[error("first record is missing the message-begin flag")]
    MissingMessageBegin,

    #[error("last record is missing the message-end flag")]
    MissingMessageEnd,

    #[error("{field} too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Errors at the tag I/O boundary. Every variant is user-visible and none is
/// fatal to the process.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("NFC is not available or not enabled on this device")]
    HardwareUnavailable,

    #[error("tag is not writable")]
    NotWritable,

    #[error("tag too small: need {required} bytes, capacity {capacity} bytes")]
    TooSmall { required: usize, capacity: usize },

    #[error("tag does not support NDEF")]
    Unsupported,

    #[error("NDEF error: {0}")]
    Ndef(#[from] NdefError),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] TypeError),

    #[error("payload error: {0}")]
    Payload(String),

    #[error("device error: {0}")]
    Device(String),
}

/// Result alias for tag operations.
pub type TagResult<T> = Result<T, TagError>;
