//! Searcher configuration types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, IpVersion, Result};

/// Memory / I/O trade-off chosen when a searcher is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Nothing cached; every read hits the file.
    #[serde(rename = "file", alias = "fileOnly")]
    FileOnly,
    /// Vector index held in memory; segments and payloads read from the file.
    #[default]
    #[serde(rename = "vectorIndex")]
    VectorIndex,
    /// Whole file held in memory.
    #[serde(rename = "content")]
    Content,
}

impl CachePolicy {
    /// All policies, cheapest to open first.
    pub const ALL: [CachePolicy; 3] = [
        CachePolicy::FileOnly,
        CachePolicy::VectorIndex,
        CachePolicy::Content,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::FileOnly => "file",
            CachePolicy::VectorIndex => "vectorIndex",
            CachePolicy::Content => "content",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CachePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" | "fileonly" | "file_only" => Ok(CachePolicy::FileOnly),
            "vectorindex" | "vector_index" | "vector" => Ok(CachePolicy::VectorIndex),
            "content" => Ok(CachePolicy::Content),
            _ => Err(Error::InvalidCachePolicy(s.to_string())),
        }
    }
}

/// Options used to open a [`Searcher`](crate::Searcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearcherConfig {
    /// Address family the file must hold.
    pub ip_version: IpVersion,
    /// Cache policy.
    pub cache_policy: CachePolicy,
}

impl SearcherConfig {
    pub fn new(ip_version: IpVersion, cache_policy: CachePolicy) -> Self {
        Self {
            ip_version,
            cache_policy,
        }
    }

    /// Parse a JSON document such as `{"ipVersion": "v6", "cachePolicy": "content"}`.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
