use thiserror::Error;

/// Every failure a volume operation can surface.
///
/// Errors propagate to the caller verbatim; the driver performs no retries
/// and never swallows a failure.
#[derive(Debug, Error)]
pub enum FatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid filesystem format: {0}")]
    InvalidFormat(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("directory is full")]
    DirectoryFull,

    #[error("no free clusters left on volume")]
    NoSpace,
}
