//! Codec error types

use thiserror::Error;

/// Codec-specific error type
#[derive(Debug, Error)]
pub enum CodecError {
    /// Invalid BHSD parameters
    #[error("invalid codec parameters: {0}")]
    InvalidCodec(String),

    /// A value fell outside the codec's encodable range
    #[error("codec ({b},{h},{s},{d}) does not encode {value}")]
    OverflowInCodec {
        /// The value that could not be represented
        value: i64,
        /// Codec parameter b
        b: u32,
        /// Codec parameter h
        h: u32,
        /// Codec parameter s
        s: u32,
        /// Codec parameter d
        d: u32,
    },

    /// Input ended in the middle of a coded value
    #[error("end of stream reached while decoding")]
    TruncatedCodec,

    /// The codec cannot encode on its own (whole-band composites)
    #[error("{0} does not support direct encoding")]
    EncodeUnsupported(&'static str),

    /// No specifier exists for the codec under the given default
    #[error("no codec specifier for {0}")]
    UnknownSpecifier(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
