//! Error types for the [`bundle`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};

/// A bundle validation error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for bundle validation.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a bundle was rejected.
///
/// Frame indices are zero-based positions within the whole bundle, not
/// within a single animation.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Frame at this index does not start with the frame magic.
    #[display("frame {_0}: bad magic")]
    BadMagic(#[error(not(source))] u32),
    /// Frame at this index runs past the end of the bundle.
    #[display("frame {_0}: truncated")]
    Truncated(#[error(not(source))] u32),
    /// The bundle is well-formed but holds the wrong number of frames.
    /// The expected total is a `u64` sum of the per-animation counts.
    #[display("expected {_0} frames, found {_1}")]
    CountMismatch(#[error(not(source))] u64, #[error(not(source))] u32),
    /// Reading or seeking the underlying source failed.
    #[display("I/O error while validating bundle")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Only I/O failures are worth retrying; a structurally broken bundle
    /// will fail identically every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io)
    }
}
