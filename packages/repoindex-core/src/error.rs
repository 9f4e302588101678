use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Unified error type for the indexing core and the packer.
///
/// Drivers map these onto exit codes: `InvalidArgument` -> 1, `Io` -> 2,
/// `Corruption` -> 3 when publication still succeeded, everything else -> 4.
/// Per-artifact failures never surface here; they accumulate on
/// `ArtifactContext::errors` and are reported through the scanning listener.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("index corruption: {0}")]
    Corruption(String),

    #[error("index is locked by another writer: {0}")]
    LockObtainFailed(String),

    #[error("malformed index data: {0}")]
    DataFormat(String),

    #[error("POM parse error: {0}")]
    Pom(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl From<tantivy::TantivyError> for IndexError {
    fn from(e: tantivy::TantivyError) -> Self {
        match e {
            tantivy::TantivyError::LockFailure(..) => IndexError::LockObtainFailed(e.to_string()),
            other => IndexError::Corruption(other.to_string()),
        }
    }
}

impl IndexError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        IndexError::InvalidArgument(msg.into())
    }

    pub fn corruption<E: std::fmt::Display>(e: E) -> Self {
        IndexError::Corruption(e.to_string())
    }
}
