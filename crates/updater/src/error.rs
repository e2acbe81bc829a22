//! Updater Error Types
//!
//! Network failures are expected on the device: they are logged, counted
//! and retried on the next schedule, never fatal to the worker.

use derive_more::{Display, Error};

/// An updater error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for updater operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The endpoint did not produce a usable bundle URL.
    #[display("bundle URL could not be resolved: {_0}")]
    Unresolvable(#[error(not(source))] String),
    /// The server answered with something other than `200 OK`.
    #[display("unexpected HTTP status {_0}")]
    Status(#[error(not(source))] u16),
    /// Connection or protocol failure below HTTP.
    #[display("transport failure: {_0}")]
    Transport(#[error(not(source))] String),
    /// A read, or the whole operation, ran out of time.
    #[display("timed out during {_0}")]
    Timeout(#[error(not(source))] &'static str),
    /// The connection closed before `Content-Length` bytes arrived.
    #[display("download interrupted after {received} of {expected} bytes")]
    Interrupted {
        #[error(not(source))]
        received: u64,
        #[error(not(source))]
        expected: u64,
    },
    /// The asset store refused a write, rename or manifest update.
    #[display("asset store failure")]
    Storage,
    /// The downloaded bundle is malformed and was discarded.
    #[display("downloaded bundle failed validation")]
    Validation,
    /// The worker is shutting down or has already stopped.
    #[display("updater is shut down")]
    Shutdown,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            Self::Unresolvable(_) | Self::Transport(_) | Self::Timeout(_) | Self::Interrupted { .. } => true,
            Self::Storage => true,
            Self::Validation | Self::Shutdown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Status(503), true)]
    #[case(ErrorKind::Status(404), false)]
    #[case(ErrorKind::Timeout("read"), true)]
    #[case(ErrorKind::Interrupted { received: 1, expected: 2 }, true)]
    #[case(ErrorKind::Validation, false)]
    #[case(ErrorKind::Shutdown, false)]
    fn test_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }

    #[test]
    fn test_display() {
        let kind = ErrorKind::Interrupted { received: 10, expected: 52416 };
        assert_eq!(kind.to_string(), "download interrupted after 10 of 52416 bytes");
    }
}
