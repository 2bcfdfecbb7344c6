//! Region lookup over an xdb file.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Serialize, Serializer};

use super::format::{Header, Segment};
use super::source::ContentSource;
use crate::{CachePolicy, Error, IpVersion, Result, SearcherConfig};

/// Outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// `country|region|province|city|isp`
    pub region: String,
    /// Reads served from the file during this lookup
    pub io_count: u32,
    /// Wall-clock time of the lookup, serialized in microseconds
    #[serde(serialize_with = "serialize_micros")]
    pub took: Duration,
}

fn serialize_micros<S: Serializer>(took: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(took.as_micros() as u64)
}

/// Searcher over one xdb file.
///
/// A searcher is `Send + Sync`; any number of threads may call
/// [`search`](Searcher::search) at once. File-backed policies use positioned
/// reads, so lookups never contend on a file cursor.
///
/// # Example
///
/// ```ignore
/// use ip2region::{CachePolicy, IpVersion, Searcher};
///
/// let searcher = Searcher::with_policy("ip2region_v4.xdb", IpVersion::V4, CachePolicy::VectorIndex)?;
/// let result = searcher.search("120.229.45.2")?;
/// println!("{} ({} reads, {:?})", result.region, result.io_count, result.took);
/// searcher.close();
/// ```
pub struct Searcher {
    config: SearcherConfig,
    header: Header,
    path: Option<PathBuf>,
    /// `None` once closed.
    source: RwLock<Option<ContentSource>>,
}

impl Searcher {
    /// Open an xdb file.
    pub fn open(path: impl AsRef<Path>, config: SearcherConfig) -> Result<Self> {
        let path = path.as_ref();
        let (source, header) = ContentSource::open(path, config.cache_policy)?;
        let searcher = Self::from_source(source, header, config, Some(path.to_path_buf()))?;

        log::debug!(
            "Opened {:?}: policy={}, ip_version={}, structure={}, segments={}",
            path,
            config.cache_policy,
            config.ip_version,
            header.version,
            header.segment_count()
        );
        Ok(searcher)
    }

    /// Open an xdb file with an explicit family and cache policy.
    pub fn with_policy(
        path: impl AsRef<Path>,
        ip_version: IpVersion,
        cache_policy: CachePolicy,
    ) -> Result<Self> {
        Self::open(path, SearcherConfig::new(ip_version, cache_policy))
    }

    /// Search over an xdb file already held in memory.
    pub fn from_buffer(buffer: Vec<u8>, ip_version: IpVersion) -> Result<Self> {
        let (source, header) = ContentSource::from_buffer(buffer)?;
        let config = SearcherConfig::new(ip_version, CachePolicy::Content);
        Self::from_source(source, header, config, None)
    }

    fn from_source(
        source: ContentSource,
        header: Header,
        config: SearcherConfig,
        path: Option<PathBuf>,
    ) -> Result<Self> {
        if header.ip_version != config.ip_version {
            return Err(Error::IpVersionMismatch {
                expected: config.ip_version,
                actual: header.ip_version,
            });
        }

        Ok(Self {
            config,
            header,
            path,
            source: RwLock::new(Some(source)),
        })
    }

    /// Look up the region of a textual address.
    pub fn search(&self, ip: &str) -> Result<SearchResult> {
        let started = Instant::now();
        let guard = self.source.read();
        let source = guard.as_ref().ok_or(Error::Closed)?;
        let addr = self.config.ip_version.parse_addr(ip)?;
        self.lookup(source, addr, started)
    }

    /// Look up the region of a parsed address.
    pub fn search_addr(&self, ip: IpAddr) -> Result<SearchResult> {
        let started = Instant::now();
        let guard = self.source.read();
        let source = guard.as_ref().ok_or(Error::Closed)?;
        let addr = self.config.ip_version.addr_from_ip(ip)?;
        self.lookup(source, addr, started)
    }

    /// Look up an address already converted to this searcher's family.
    pub(crate) fn search_raw(&self, addr: u128, started: Instant) -> Result<SearchResult> {
        let guard = self.source.read();
        let source = guard.as_ref().ok_or(Error::Closed)?;
        self.lookup(source, addr, started)
    }

    fn lookup(&self, source: &ContentSource, addr: u128, started: Instant) -> Result<SearchResult> {
        let mut io_count = 0;
        let region = self.locate(source, addr, &mut io_count).map_err(|e| {
            if let Error::CorruptIndex(reason) = &e {
                log::warn!(
                    "Corrupt index while searching {} in {:?}: {}",
                    self.config.ip_version.to_ip(addr),
                    self.path,
                    reason
                );
            }
            e
        })?;

        Ok(SearchResult {
            region,
            io_count,
            took: started.elapsed(),
        })
    }

    fn locate(&self, source: &ContentSource, addr: u128, io_count: &mut u32) -> Result<String> {
        let version = self.config.ip_version;
        let segment_size = version.segment_index_size();

        let key = version.shard_key(addr);
        let shard = source.shard(key, io_count)?;
        let count = shard.segment_count(&self.header)?;

        // Binary search over [low, high)
        let mut low = 0usize;
        let mut high = count;
        while low < high {
            let mid = low + (high - low) / 2;
            let offset = shard.start_ptr as usize + mid * segment_size;
            let record = source.read(offset, segment_size, io_count)?;
            let segment = Segment::decode(version, &record)?;

            if addr < segment.start {
                high = mid;
            } else if addr > segment.end {
                low = mid + 1;
            } else {
                return read_region(source, &segment, io_count);
            }
        }

        Err(Error::CorruptIndex(format!(
            "no segment covers {} (shard {:#06x}, {} records)",
            version.to_ip(addr),
            key,
            count
        )))
    }

    /// Release the file handle and cached buffers.
    ///
    /// Waits for in-flight searches. Closing twice is a no-op.
    pub fn close(&self) {
        if self.source.write().take().is_some() {
            log::debug!("Closed searcher for {:?}", self.path);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.source.read().is_none()
    }

    /// Header loaded at open.
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn config(&self) -> SearcherConfig {
        self.config
    }

    pub fn ip_version(&self) -> IpVersion {
        self.config.ip_version
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.config.cache_policy
    }

    /// File the searcher was opened from, `None` for in-memory buffers.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn read_region(source: &ContentSource, segment: &Segment, io_count: &mut u32) -> Result<String> {
    if segment.data_len == 0 {
        return Ok(String::new());
    }
    let bytes = source.read(segment.data_ptr as usize, segment.data_len as usize, io_count)?;
    String::from_utf8(bytes.into_owned()).map_err(|e| {
        Error::CorruptIndex(format!(
            "region at offset {} is not valid UTF-8: {}",
            segment.data_ptr, e
        ))
    })
}
