//! Error types for ip2region.

use std::path::PathBuf;

use thiserror::Error;

use crate::IpVersion;

/// Error type for ip2region operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed address, or an address of the wrong family
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Database file does not exist
    #[error("xdb file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Database file exists but could not be loaded
    #[error("failed to load {what} from {}: {source}", .path.display())]
    LoadFailure {
        path: PathBuf,
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// File is shorter than a required region
    #[error("truncated xdb data: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Unsupported xdb structure version
    #[error("unsupported xdb structure version: {0}")]
    UnsupportedVersion(u16),

    /// Header field out of range, or pointers outside the file or misaligned
    #[error("malformed header: {0}")]
    MalformedOffsets(String),

    /// Runtime pointer width cannot address the whole file
    #[error("runtime pointer width of {ptr_bytes} bytes cannot address a {file_len} byte file")]
    PointerOverflow { ptr_bytes: u16, file_len: u64 },

    /// The file was built for another address family
    #[error("ip version mismatch: searcher expects {expected}, file holds {actual}")]
    IpVersionMismatch {
        expected: IpVersion,
        actual: IpVersion,
    },

    /// Index block violates its structural invariants
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Searcher was closed
    #[error("searcher is closed")]
    Closed,

    /// Default searcher used before initialization
    #[error("default searcher not initialized")]
    NotInitialized,

    /// Unknown ip version name
    #[error("invalid ip version: {0} (use 'v4' or 'v6')")]
    InvalidIpVersion(String),

    /// Unknown cache policy name
    #[error("invalid cache policy: {0} (use 'file', 'vectorIndex' or 'content')")]
    InvalidCachePolicy(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Numeric code reported by [`verify`](crate::verify) for this error.
    ///
    /// `0` is reserved for success. Errors header loading never produces
    /// count as a file that cannot be used (`-1`).
    pub fn verify_code(&self) -> i32 {
        match self {
            Error::NotFound(_) | Error::LoadFailure { .. } | Error::Io(_) => -1,
            Error::Truncated { .. } => 1,
            Error::UnsupportedVersion(_) => 2,
            Error::MalformedOffsets(_) => 3,
            Error::PointerOverflow { .. } => 4,
            Error::InvalidAddress(_)
            | Error::IpVersionMismatch { .. }
            | Error::CorruptIndex(_)
            | Error::Closed
            | Error::NotInitialized
            | Error::InvalidIpVersion(_)
            | Error::InvalidCachePolicy(_)
            | Error::Json(_) => -1,
        }
    }
}

/// Result type alias for ip2region operations.
pub type Result<T> = std::result::Result<T, Error>;
