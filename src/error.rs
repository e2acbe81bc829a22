use derive_more::{Display, Error};

/// A top-level error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for command execution.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("asset store error")]
    Storage,
    #[display("update failed")]
    Update,
    #[display("bundle is invalid: {_0}")]
    Validation(#[error(not(source))] String),
    #[display("could not write output")]
    Output,
}
