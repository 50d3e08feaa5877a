//! Error types for value parsing in aircon-types.

use thiserror::Error;

/// Errors that can occur when parsing an operator- or backend-supplied value.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The string is not one of the accepted spellings for this kind of value.
    #[error("Invalid {kind}: {value:?} (expected one of {expected})")]
    InvalidValue {
        /// What was being parsed (e.g. "mode").
        kind: &'static str,
        /// The rejected input.
        value: String,
        /// Comma-separated list of accepted spellings.
        expected: String,
    },
}

/// Result type alias using aircon-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
