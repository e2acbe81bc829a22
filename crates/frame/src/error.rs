//! Frame Format Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, in the same shape as every other crate in this
//! workspace.

use derive_more::{Display, Error};

/// A frame format error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for frame decoding.
pub type Result<T> = std::result::Result<T, Error>;

/// Ways a frame can be malformed.
///
/// Neither is retryable: the same bytes will always fail the same way.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The first header field is not [`MAGIC`](crate::MAGIC).
    #[display("bad frame magic: {_0:#010x}")]
    BadMagic(#[error(not(source))] u32),
    /// Fewer bytes are available than the header or payload requires.
    #[display("truncated frame: needed {needed} bytes, {available} available")]
    Truncated {
        #[error(not(source))]
        needed: u64,
        #[error(not(source))]
        available: u64,
    },
    /// Payload length does not match `height * stride`.
    #[display("payload is {actual} bytes, header describes {expected}")]
    PayloadMismatch {
        #[error(not(source))]
        expected: u64,
        #[error(not(source))]
        actual: u64,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::BadMagic(0xDEADBEEF).to_string(), "bad frame magic: 0xdeadbeef");
        assert_eq!(
            ErrorKind::Truncated { needed: 24, available: 3 }.to_string(),
            "truncated frame: needed 24 bytes, 3 available"
        );
    }

    #[test]
    fn error_kind_not_retryable() {
        assert!(!ErrorKind::BadMagic(0).is_retryable());
        assert!(!ErrorKind::Truncated { needed: 1, available: 0 }.is_retryable());
    }
}
