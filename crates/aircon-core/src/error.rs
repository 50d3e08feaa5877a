//! Error types for aircon-core.
//!
//! Errors are grouped the way the engine contains them:
//!
//! | Error | Raised by | Handling |
//! |-------|-----------|----------|
//! | [`Error::Transport`] | publish, subscribe, disconnect | logged, simulation continues |
//! | [`Error::Protocol`] | malformed inbound JSON | logged, message dropped |
//! | [`Error::Validation`] | out-of-range enum values | logged, field ignored |
//! | [`Error::Serialization`] | outbound JSON encoding | fatal to the tick loop |
//! | [`Error::Sink`] | telemetry persistence | logged, simulation continues |
//!
//! Nothing here unwinds across device boundaries: each device runner
//! decides locally what to log and what to drop.

use aircon_types::ParseError;
use thiserror::Error;

/// Errors that can occur inside a device simulation.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The messaging transport rejected an operation.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An inbound message could not be decoded.
    #[error("Malformed {channel} message: {source}")]
    Protocol {
        /// Which inbound channel delivered the message.
        channel: &'static str,
        /// The underlying decode error.
        source: serde_json::Error,
    },

    /// A value was outside its accepted set.
    #[error(transparent)]
    Validation(#[from] ParseError),

    /// An outbound document could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The telemetry sink failed to record a sample.
    #[error("Telemetry sink error: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create a transport error from any displayable cause.
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }

    /// Create a protocol error for the named channel.
    pub fn protocol(channel: &'static str, source: serde_json::Error) -> Self {
        Self::Protocol { channel, source }
    }

    /// Wrap a sink implementation's error.
    pub fn sink(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Sink(Box::new(cause))
    }
}

/// Result type alias using aircon-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
