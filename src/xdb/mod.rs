//! xdb binary format and search engine.
//!
//! An xdb file maps every address of one family to a region string. Lookups
//! narrow by the first two address bytes through the vector index, then
//! binary-search the matching slice of the IndexBlock.
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! |     HEADER       |  256 bytes (fixed)
//! +------------------+
//! |   VECTOR INDEX   |  256 x 256 x 8 bytes: {start_ptr, end_ptr} per 2-byte prefix
//! +------------------+
//! |    DATA BLOCK    |  variable: UTF-8 regions
//! +------------------+
//! |   INDEX BLOCK    |  14 (v4) or 38 (v6) byte records:
//! |                  |  {start, end, data_len: u16, data_ptr: u32}
//! +------------------+
//! ```
//!
//! All integers are little-endian; IPv6 addresses are stored in network order.

mod cached;
mod check;
mod format;
mod searcher;
mod source;
mod verify;

#[cfg(test)]
pub(crate) mod fixture;

pub use cached::{CacheStats, CachedSearcher, CachedSearcherConfig};
pub use check::{check_index, IndexIssue, IndexReport, MAX_REPORTED_ISSUES};
pub use format::*;
pub use searcher::{SearchResult, Searcher};
pub use source::{ContentSource, XdbFile};
pub use verify::{verify, verify_header, VerifyResult};
