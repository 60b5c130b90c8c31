use std::io;

use thiserror::Error;

/// All errors produced by this crate.
#[derive(Error, Debug)]
pub enum MsgError {
    /// The input is not a compound file at all.
    #[error("not a valid compound file: {0}")]
    Format(String),

    /// The compound file is readable but violates a .msg convention.
    #[error("invalid message structure: {0}")]
    InvalidFormat(String),

    /// A requested child storage, stream or property is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A length or checksum field is inconsistent with the data it describes.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// Underlying read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias for `Result<T, MsgError>`.
pub type Result<T> = std::result::Result<T, MsgError>;

impl MsgError {
    /// Map an `io::Error` coming out of a lookup to `NotFound` when the kind
    /// says so, keeping real I/O faults as `Io`.
    pub(crate) fn from_lookup(name: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(name.to_string())
        } else {
            Self::Io(err)
        }
    }
}
