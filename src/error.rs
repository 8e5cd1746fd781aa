//! Error types shared by every module of the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the codec, the channel, the pipeline and the payload layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A fixed-width bit sequence had the wrong number of bits
    #[error("invalid {what} length: expected {expected} bits, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An integer does not fit in the requested number of bits
    #[error("value {value} does not fit in {width} bits")]
    ValueOutOfRange { value: u64, width: usize },

    /// A bit stream is not a whole number of units
    #[error("bit stream of {len} bits is not a multiple of {unit}")]
    MisalignedStream { len: usize, unit: usize },

    /// A parameter is outside its accepted domain
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A payload file does not exist
    #[error("payload not found: {}", .0.display())]
    PayloadNotFound(PathBuf),

    /// A payload's bytes cannot fill its declared raster
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Encoding an image payload failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Whether the error is a structural violation of codec or pipeline
    /// invariants, as opposed to a failure of the payload I/O layer.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Error::InvalidLength { .. }
                | Error::ValueOutOfRange { .. }
                | Error::MisalignedStream { .. }
                | Error::InvalidInput(_)
        )
    }
}
