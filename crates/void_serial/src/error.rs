//! Codec errors
//!
//! Every failure aborts the encode or decode call in progress. There is no
//! partial result; callers retry by calling again.

use thiserror::Error;

/// Errors produced while encoding or decoding a value graph
#[derive(Debug, Error)]
pub enum CodecError {
    /// A value that can never be serialized (callables, unhandled host nodes)
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),
    /// An object is bound to a behavior that has no name
    #[error("Cannot serialize an object whose type has no name")]
    AnonymousType,
    /// A type tag or builder path with no matching registration
    #[error("Unknown type: {0}")]
    UnknownType(String),
    /// The live behavior of an object is not the one registered under its name
    #[error("Behavior of '{0}' does not match the registered behavior")]
    ConstructorMismatch(String),
    /// A document that does not follow the table grammar
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),
    /// A caller field collides with an engine-internal key
    #[error("Field '{0}' collides with the type tag key")]
    ReservedKey(String),
    /// Rejected configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Text could not be parsed or written as JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Snapshot file I/O
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEncoding(msg.into())
    }
}

/// Result alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
