//! Packer error types

use thiserror::Error;

/// Packer-specific error type
#[derive(Debug, Error)]
pub enum PackError {
    /// An option value outside its recognized set
    #[error("invalid option {option}: {value}")]
    InvalidOption {
        /// The option name
        option: String,
        /// The rejected value
        value: String,
    },

    /// The class-file visitor reported an unreadable class
    #[error("malformed class {class}: {reason}")]
    MalformedClass {
        /// The class (or entry) name
        class: String,
        /// What went wrong
        reason: String,
    },

    /// A non-prototype attribute whose configured action is `error`
    #[error("unknown attribute {attribute} on {class}")]
    UnknownAttribute {
        /// The attribute name
        attribute: String,
        /// The class carrying it
        class: String,
    },

    /// An attribute layout string that does not parse
    #[error("invalid attribute layout {layout:?}: {reason}")]
    InvalidLayout {
        /// The offending layout string
        layout: String,
        /// Parse failure detail
        reason: String,
    },

    /// A context ran out of attribute flag indexes
    #[error("no attribute indexes left in {context} context")]
    TooManyAttributes {
        /// The exhausted context
        context: &'static str,
    },

    /// Input ended mid-entry
    #[error("truncated input at entry {entry}")]
    TruncatedInput {
        /// The entry being read
        entry: String,
    },

    /// Band encoding failed
    #[error("codec error: {0}")]
    Codec(#[from] jarpack_codec::CodecError),

    /// Underlying sink or source failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for packer operations
pub type Result<T> = std::result::Result<T, PackError>;
