use thiserror::Error;

/// Errors surfaced by the indexing, query and sync core.
#[derive(Error, Debug)]
pub enum Error {
    /// A corpus key that does not exist. Lookups report absence as `Ok(None)`;
    /// this variant is reserved for operations that require the key, like `read`.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// The remote history diverged and cannot be fast-forwarded.
    #[error("sync conflict: {0}")]
    SyncConflict(String),

    /// A pagination cursor that could not be decoded. Always a client error.
    #[error("malformed cursor: {0}")]
    MalformedCursor(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not valid UTF-8: {0}")]
    InvalidUtf8(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Corpus read or index write failures. These abort the current operation
    /// and leave the last committed index state untouched.
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Index(_) | Error::Git(_))
    }

    /// Errors caused by the caller's input rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::MalformedCursor(_) | Error::InvalidRequest(_))
    }
}

impl From<tantivy::directory::error::OpenDirectoryError> for Error {
    fn from(e: tantivy::directory::error::OpenDirectoryError) -> Self {
        Error::Index(tantivy::TantivyError::from(e))
    }
}
