pub mod asn;
pub mod config;
pub mod parse;
pub mod summary;

use relayfam::{AsCache, IpinfoLookup, RelayfamConfig};

/// Open the configured AS cache, falling back to a memory-only cache
pub(crate) fn open_as_cache(config: &RelayfamConfig, no_write: bool) -> AsCache<IpinfoLookup> {
    let lookup = config.as_lookup();
    if config.ipinfo_token.is_none() {
        eprintln!("WARNING: no AS lookup token configured, lookups may be rate-limited");
    }

    let cache = match AsCache::open(config.as_cache_file.as_str(), lookup) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("WARNING: {}, using a memory-only AS cache", e);
            return AsCache::in_memory(config.as_lookup());
        }
    };

    match no_write {
        true => cache.without_persistence(),
        false => cache,
    }
}
