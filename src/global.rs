//! Process-wide default searcher.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::xdb::{SearchResult, Searcher};
use crate::SearcherConfig;

/// Global searcher
static DEFAULT_SEARCHER: Lazy<RwLock<Option<Arc<Searcher>>>> = Lazy::new(|| RwLock::new(None));

/// Open `path` and install it as the default searcher.
///
/// Replaces any previously installed searcher; lookups already holding the
/// old one finish against it. On failure the current searcher stays.
pub fn init(path: impl AsRef<Path>, config: SearcherConfig) -> Result<()> {
    let searcher = Searcher::open(path.as_ref(), config)?;

    let mut guard = DEFAULT_SEARCHER.write();
    *guard = Some(Arc::new(searcher));

    log::debug!("Installed default searcher from {:?}", path.as_ref());
    Ok(())
}

/// Check if a default searcher is installed.
pub fn is_initialized() -> bool {
    DEFAULT_SEARCHER.read().is_some()
}

/// The installed default searcher, if any.
pub fn default_searcher() -> Option<Arc<Searcher>> {
    DEFAULT_SEARCHER.read().clone()
}

/// Search with the default searcher.
///
/// # Examples
/// ```ignore
/// ip2region::global::init("ip2region_v4.xdb", Default::default())?;
/// let result = ip2region::global::search("1.1.1.1")?;
/// println!("{}", result.region);
/// ```
pub fn search(ip: &str) -> Result<SearchResult> {
    let searcher = default_searcher().ok_or(Error::NotInitialized)?;
    searcher.search(ip)
}

/// Close and uninstall the default searcher.
pub fn close() {
    let searcher = DEFAULT_SEARCHER.write().take();
    if let Some(searcher) = searcher {
        searcher.close();
    }
}
