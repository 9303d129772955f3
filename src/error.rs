//! Error taxonomy for the container core.
//!
//! Every failure the writer or the patcher can report falls in one of four
//! classes. [`Error`] wraps them for callers that do not care which one it is.

use thiserror::Error;

/// Invalid or incomplete track configuration, detected at header generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("video track needs a non-zero width and height, got {width}x{height}")]
    MissingDimensions { width: u32, height: u32 },

    #[error("audio track needs a positive, finite sample rate, got {0}")]
    InvalidSampleRate(f64),

    #[error("audio track needs at least one channel")]
    MissingChannels,

    #[error("track {track_number} has an empty or non-ASCII codec id")]
    InvalidCodecId { track_number: u8 },

    #[error("track number {0} cannot be encoded in a SimpleBlock header")]
    TrackNumberOutOfRange(u64),

    #[error("no track with number {0} in this file")]
    UnknownTrack(u8),
}

/// Writer methods called out of order. Always a programming error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequenceError {
    #[error("header has not been generated yet")]
    HeaderNotGenerated,

    #[error("header was already generated for this writer")]
    HeaderAlreadyGenerated,

    #[error("writer was already finalized")]
    Finalized,

    #[error("video timestamp went backwards: {current}ms after {previous}ms")]
    TimestampRegression { previous: u64, current: u64 },
}

/// The byte stream does not have the structure the patcher expects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContainerStructureError {
    #[error("no Segment element found")]
    SegmentNotFound,

    #[error("no Info element within {window} bytes of the Segment payload")]
    InfoNotFound { window: usize },

    #[error("invalid variable-length integer at offset {offset}")]
    InvalidVarInt { offset: usize },

    #[error("element at offset {offset} runs past the end of its parent")]
    Truncated { offset: usize },

    #[error("unknown-sized {element} element at offset {offset} cannot be resized")]
    UnknownSize { element: &'static str, offset: usize },

    #[error("Duration element at offset {offset} has unsupported size {size}")]
    UnsupportedDurationSize { offset: usize, size: u64 },
}

/// A value does not fit the variable-length integer width it has to use.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("value {value} does not fit in a {width}-byte variable-length integer")]
pub struct EncodingOverflowError {
    pub value: u64,
    pub width: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    ContainerStructure(#[from] ContainerStructureError),

    #[error(transparent)]
    EncodingOverflow(#[from] EncodingOverflowError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
