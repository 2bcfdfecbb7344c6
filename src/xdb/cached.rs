//! Cached searcher with hot reload support.
//!
//! This module provides a searcher wrapper with:
//! - LRU cache of regions keyed by address
//! - Atomic hot reload for replacing the xdb file without downtime
//! - Thread-safe concurrent access

use arc_swap::ArcSwap;
use quick_cache::sync::Cache;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::searcher::{SearchResult, Searcher};
use crate::{Error, Result, SearcherConfig};

/// Default cache capacity (number of addresses).
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Configuration for the region cache.
#[derive(Debug, Clone)]
pub struct CachedSearcherConfig {
    /// Maximum number of addresses in the cache.
    pub cache_capacity: usize,
    /// Whether to enable caching.
    pub cache_enabled: bool,
}

impl Default for CachedSearcherConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
        }
    }
}

impl CachedSearcherConfig {
    /// Create a new configuration with the specified cache capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache_capacity: capacity,
            cache_enabled: true,
        }
    }

    /// Create a configuration with caching disabled.
    pub fn no_cache() -> Self {
        Self {
            cache_capacity: 0,
            cache_enabled: false,
        }
    }
}

/// Searcher with a region cache and hot reload.
///
/// Cache hits report an `io_count` of zero. Reloading swaps the underlying
/// [`Searcher`] atomically: lookups already running finish against the old
/// file, new lookups use the new one.
///
/// # Example
///
/// ```ignore
/// use ip2region::{CachedSearcher, SearcherConfig};
///
/// let searcher = CachedSearcher::open("ip2region_v4.xdb", SearcherConfig::default())?;
/// let result = searcher.search("8.8.8.8")?;
///
/// // Swap in a freshly synced database
/// searcher.reload("ip2region_v4.new.xdb")?;
/// ```
pub struct CachedSearcher {
    inner: ArcSwap<Searcher>,
    cache: Option<Cache<u128, Arc<str>>>,
    config: CachedSearcherConfig,
    /// Incremented on each reload.
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedSearcher {
    /// Open an xdb file with the default cache configuration.
    pub fn open(path: impl AsRef<Path>, config: SearcherConfig) -> Result<Self> {
        Self::open_with_config(path, config, CachedSearcherConfig::default())
    }

    /// Open an xdb file with a custom cache configuration.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: SearcherConfig,
        cache_config: CachedSearcherConfig,
    ) -> Result<Self> {
        Ok(Self::from_searcher(Searcher::open(path, config)?, cache_config))
    }

    /// Wrap an already opened searcher.
    pub fn from_searcher(searcher: Searcher, config: CachedSearcherConfig) -> Self {
        let cache = if config.cache_enabled && config.cache_capacity > 0 {
            Some(Cache::new(config.cache_capacity))
        } else {
            None
        };

        Self {
            inner: ArcSwap::from_pointee(searcher),
            cache,
            config,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up the region of a textual address, consulting the cache first.
    pub fn search(&self, ip: &str) -> Result<SearchResult> {
        let started = Instant::now();
        // Read before loading the searcher: `swap` stores first and bumps the
        // generation second, so a stale searcher always carries a stale
        // generation and its insert is skipped.
        let generation = self.generation();
        let searcher = self.inner.load();
        if searcher.is_closed() {
            return Err(Error::Closed);
        }
        let addr = searcher.ip_version().parse_addr(ip)?;

        if let Some(ref cache) = self.cache {
            if let Some(region) = cache.get(&addr) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(SearchResult {
                    region: region.to_string(),
                    io_count: 0,
                    took: started.elapsed(),
                });
            }
        }

        // Cache miss - perform lookup
        self.search_uncached(&searcher, generation, addr, started)
    }

    /// Search `searcher` and cache the region unless a reload happened
    /// since `generation` was read.
    fn search_uncached(
        &self,
        searcher: &Searcher,
        generation: u64,
        addr: u128,
        started: Instant,
    ) -> Result<SearchResult> {
        let result = searcher.search_raw(addr, started)?;
        self.misses.fetch_add(1, Ordering::Relaxed);

        if let Some(ref cache) = self.cache {
            if generation == self.generation() {
                cache.insert(addr, Arc::from(result.region.as_str()));
            }
        }

        Ok(result)
    }

    /// Hot reload from a new xdb file opened with the current configuration.
    ///
    /// On failure the current searcher stays in place.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config = self.inner.load().config();
        let searcher = Searcher::open(path, config)?;
        self.swap(searcher);

        log::info!("Hot reloaded xdb from {:?}", path);
        Ok(())
    }

    /// Hot reload from an xdb file held in memory.
    pub fn reload_from_buffer(&self, data: Vec<u8>) -> Result<()> {
        let ip_version = self.inner.load().ip_version();
        let searcher = Searcher::from_buffer(data, ip_version)?;
        self.swap(searcher);

        log::info!("Hot reloaded xdb from buffer");
        Ok(())
    }

    fn swap(&self, searcher: Searcher) {
        self.inner.store(Arc::new(searcher));
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_cache();
    }

    /// Close the current searcher and drop cached regions.
    pub fn close(&self) {
        self.inner.load().close();
        self.clear_cache();
    }

    /// Clear the cache.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        match self.cache {
            Some(ref cache) => CacheStats {
                capacity: self.config.cache_capacity,
                len: cache.len(),
                enabled: true,
                hits,
                misses,
            },
            None => CacheStats {
                capacity: 0,
                len: 0,
                enabled: false,
                hits,
                misses,
            },
        }
    }

    /// Get the current generation (incremented on each reload).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Get a reference to the underlying searcher.
    ///
    /// The returned Arc may become stale after a hot reload.
    pub fn inner(&self) -> arc_swap::Guard<Arc<Searcher>> {
        self.inner.load()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current number of entries in the cache.
    pub len: usize,
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that went to the searcher.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
