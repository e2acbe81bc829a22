//! Animation Load Error Types
//!
//! Loading is all-or-nothing, so every error names the asset that stopped
//! the load. The underlying storage or format error hangs off it as a child.

use derive_more::{Display, Error};

/// An animation load error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for animation loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The asset could not be read from the store.
    #[display("could not read asset: {_0}")]
    Storage(#[error(not(source))] String),
    /// The asset was read but does not decode.
    #[display("malformed frame data in asset: {_0}")]
    Format(#[error(not(source))] String),
    /// A load was asked for zero frames, or a bundle holds fewer frames than
    /// its layout describes.
    #[display("no frames to load from: {_0}")]
    Empty(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
