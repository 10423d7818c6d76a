//! Error types shared across the crate.

use thiserror::Error;

/// Errors that abort building or running a [`Retrace`](crate::Retrace).
///
/// Malformed mapping lines are not reported through this type, see
/// [`ParseError`](crate::ParseError) for those.
#[derive(Debug, Error)]
pub enum Error {
    /// A frame template compiled into an invalid regular expression.
    #[error("invalid frame pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Reading the mapping or stack trace, or writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results carrying an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
