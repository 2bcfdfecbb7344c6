//! ip2region - Offline IP to region lookup over xdb files.
//!
//! This crate resolves IPv4 and IPv6 addresses to region strings
//! (`country|region|province|city|isp`) using a compact, read-only,
//! pre-built xdb database, without any network round trip.
//!
//! # Features
//!
//! - **Two-level lookup**: vector index by two-byte prefix, then binary search
//! - **Three cache policies**: trade open-time cost and memory against I/O per lookup
//! - **I/O accounting**: every lookup reports the file reads it performed
//! - **Thread-safe**: one searcher serves any number of concurrent lookups
//! - **Hot reload**: swap the database under a running [`CachedSearcher`]
//!
//! # Quick Start
//!
//! ```ignore
//! use ip2region::{CachePolicy, IpVersion, Searcher};
//!
//! let searcher = Searcher::with_policy("ip2region_v4.xdb", IpVersion::V4, CachePolicy::VectorIndex)?;
//! let result = searcher.search("120.229.45.2")?;
//! assert_eq!(result.io_count, 2);
//! println!("{}", result.region);
//! searcher.close();
//! ```
//!
//! # Cache Policies
//!
//! | policy        | loaded at open    | reads per lookup               |
//! |---------------|-------------------|--------------------------------|
//! | `FileOnly`    | header            | 1 + probes + 1                 |
//! | `VectorIndex` | header + 512 KiB  | probes + 1                     |
//! | `Content`     | whole file        | 0                              |
//!
//! # Verification
//!
//! [`verify`] checks the header only and reports an error code; a file with a
//! damaged IndexBlock still verifies. [`check_index`] walks the whole index
//! when a full structural scan is wanted.

mod config;
mod error;
mod ip_version;

pub mod global;
pub mod xdb;

// Re-export core types
pub use config::{CachePolicy, SearcherConfig};
pub use error::{Error, Result};
pub use ip_version::IpVersion;

// Re-export engine types
pub use xdb::{
    check_index, verify, verify_header, CacheStats, CachedSearcher, CachedSearcherConfig, Header,
    IndexIssue, IndexReport, SearchResult, Searcher, VerifyResult,
};
