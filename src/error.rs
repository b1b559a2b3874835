use thiserror::Error;

use crate::io::SaveFormat;

/// Failures turning external bytes into a [`crate::buffer::PixelBuffer`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no image data supplied")]
    Empty,

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("unsupported image format: {0}")]
    Unsupported(String),

    #[error("malformed image data: {0}")]
    Malformed(String),

    #[error("image of {width}x{height} exceeds the {limit} pixel limit")]
    DimensionsTooLarge { width: u32, height: u32, limit: u64 },
}

/// Failures serializing a buffer back into container bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("image encode error: {0}")]
    Codec(String),

    #[error("{0:?} output is not supported")]
    UnsupportedFormat(SaveFormat),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("no image loaded")]
    NoImage,

    #[error(
        "region outside image bounds: ({x}, {y}) {w}x{h} does not fit in {width}x{height}"
    )]
    OutOfBounds {
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        width: u32,
        height: u32,
    },

    #[error("nothing stored under '{0}'")]
    NotFound(String),

    #[error("'{0}' is inside a session namespace")]
    ReservedName(String),

    #[error("{channel} offset {value} outside [-{limit}, {limit}]")]
    OffsetOutOfRange {
        channel: &'static str,
        value: i32,
        limit: i32,
    },

    #[error("invalid pixel buffer: {width}x{height} needs {expected} samples, got {actual}")]
    InvalidBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("recipe error: {0}")]
    Recipe(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Box<bincode::ErrorKind>> for EngineError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        EngineError::Recipe(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
