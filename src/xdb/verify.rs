//! Header-level verification of xdb files.

use std::path::Path;

use serde::Serialize;

use super::format::Header;
use super::source::XdbFile;
use crate::Result;

/// Outcome of [`verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub valid: bool,
    /// `0` when valid, otherwise [`Error::verify_code`](crate::Error::verify_code).
    pub error_code: i32,
}

/// Check that the file at `path` has a well-formed header.
///
/// Only the header is examined: its structure version, ip version field, pointer
/// width and that the regions it declares fit inside the file. A file whose
/// IndexBlock or DataBlock is corrupt still reports `valid`; such files
/// surface as [`Error::CorruptIndex`](crate::Error::CorruptIndex) on the
/// lookups that touch the damage. Use [`check_index`](crate::check_index)
/// for a full structural scan.
pub fn verify(path: impl AsRef<Path>) -> VerifyResult {
    match verify_header(path) {
        Ok(_) => VerifyResult {
            valid: true,
            error_code: 0,
        },
        Err(e) => {
            log::debug!("xdb verification failed: {}", e);
            VerifyResult {
                valid: false,
                error_code: e.verify_code(),
            }
        }
    }
}

/// Load and validate the header of the file at `path`.
pub fn verify_header(path: impl AsRef<Path>) -> Result<Header> {
    XdbFile::open(path.as_ref())?.load_header()
}
