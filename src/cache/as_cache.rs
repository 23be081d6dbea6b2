//! File-backed AS lookup cache
//!
//! The cache maps IPv4 strings to [`AsResolution`] outcomes and is stored as a
//! single JSON object, e.g.
//!
//! ```json
//! {
//!   "1.2.3.4": "AS3320 Deutsche Telekom AG",
//!   "999.1.1.1": "Invalid IPv4 address."
//! }
//! ```
//!
//! Entries never expire. Failed lookups are cached too, so an address is only
//! ever sent to the external service once; delete the file to retry them.
//! The whole file is rewritten after every new entry.

use crate::lens::asn::{AsLookup, AsResolution};
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Memoizing AS lookup store
///
/// Owned by one summarization run: construct, resolve any number of
/// addresses, drop. Every miss is persisted immediately, so an interrupted
/// run loses at most the lookup in flight.
pub struct AsCache<L: AsLookup> {
    path: Option<PathBuf>,
    entries: BTreeMap<String, AsResolution>,
    lookup: L,
    lookups: usize,
}

impl<L: AsLookup> AsCache<L> {
    /// Open the cache stored at `path`
    ///
    /// A missing, unreadable or malformed file yields an empty cache. Fails
    /// only when the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>, lookup: L) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                anyhow!("Failed to create AS cache directory {:?}: {}", parent, e)
            })?;
        }

        let entries = load_entries(&path);
        info!("loaded {} AS cache entries from {:?}", entries.len(), path);

        Ok(Self {
            path: Some(path),
            entries,
            lookup,
            lookups: 0,
        })
    }

    /// Create an empty cache that is never written to disk
    pub fn in_memory(lookup: L) -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
            lookup,
            lookups: 0,
        }
    }

    /// Keep the loaded entries but stop writing to disk
    pub fn without_persistence(mut self) -> Self {
        self.path = None;
        self
    }

    /// Resolve an address, consulting the external lookup only on a miss
    ///
    /// Cached failures are returned as-is and never retried.
    pub fn resolve(&mut self, ip: &str) -> AsResolution {
        if let Some(hit) = self.entries.get(ip) {
            debug!("AS cache hit for {}", ip);
            return hit.clone();
        }

        let resolution = match ip.parse::<Ipv4Addr>() {
            Ok(addr) => {
                self.lookups += 1;
                self.lookup.lookup(addr)
            }
            Err(_) => AsResolution::InvalidAddress,
        };
        debug!("AS cache miss for {}: {}", ip, resolution);

        self.entries.insert(ip.to_string(), resolution.clone());
        self.persist_or_detach();
        resolution
    }

    /// Look up a cached entry without resolving
    pub fn get(&self, ip: &str) -> Option<&AsResolution> {
        self.entries.get(ip)
    }

    /// Number of calls made to the external lookup by this cache
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the backing file, if the cache is persistent
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write all entries to the backing file
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| anyhow!("Failed to serialize AS cache: {}", e))?;
        fs::write(path, content)
            .map_err(|e| anyhow!("Failed to write AS cache file {:?}: {}", path, e))?;
        Ok(())
    }

    /// Persist, or fall back to memory-only for the rest of the run
    fn persist_or_detach(&mut self) {
        if let Err(e) = self.persist() {
            warn!("{}; continuing without writing the AS cache", e);
            self.path = None;
        }
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, AsResolution> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("no readable AS cache at {:?}: {}", path, e);
            return BTreeMap::new();
        }
    };

    match serde_json::from_str::<BTreeMap<String, AsResolution>>(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("ignoring malformed AS cache file {:?}: {}", path, e);
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use tempfile::TempDir;

    /// Lookup stub that answers from a fixed table and counts calls
    #[derive(Default)]
    pub(crate) struct StubLookup {
        pub answers: BTreeMap<Ipv4Addr, AsResolution>,
        pub calls: Cell<usize>,
        pub seen: RefCell<Vec<Ipv4Addr>>,
    }

    impl StubLookup {
        pub fn with(answers: &[(&str, &str)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(ip, org)| (ip.parse().unwrap(), AsResolution::Org(org.to_string())))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl AsLookup for StubLookup {
        fn lookup(&self, ip: Ipv4Addr) -> AsResolution {
            self.calls.set(self.calls.get() + 1);
            self.seen.borrow_mut().push(ip);
            self.answers
                .get(&ip)
                .cloned()
                .unwrap_or(AsResolution::NotFound)
        }
    }

    fn setup_test_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_resolve_is_memoized() {
        let stub = StubLookup::with(&[("1.2.3.4", "AS3320 Deutsche Telekom AG")]);
        let mut cache = AsCache::in_memory(&stub);

        let first = cache.resolve("1.2.3.4");
        let second = cache.resolve("1.2.3.4");

        assert_eq!(first, second);
        assert_eq!(first.org(), Some("AS3320 Deutsche Telekom AG"));
        assert_eq!(stub.calls.get(), 1);
    }

    #[test]
    fn test_failures_are_cached() {
        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);

        assert_eq!(cache.resolve("5.6.7.8"), AsResolution::NotFound);
        assert_eq!(cache.resolve("5.6.7.8"), AsResolution::NotFound);
        assert_eq!(stub.calls.get(), 1);
    }

    #[test]
    fn test_invalid_address_skips_lookup() {
        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);

        assert_eq!(cache.resolve("999.1.1.1"), AsResolution::InvalidAddress);
        assert_eq!(cache.resolve("not-an-ip"), AsResolution::InvalidAddress);
        assert_eq!(stub.calls.get(), 0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookups(), 0);

        cache.resolve("1.2.3.4");
        cache.resolve("1.2.3.4");
        assert_eq!(cache.lookups(), 1);
        assert_eq!(cache.lookups(), stub.calls.get());
    }

    #[test]
    fn test_every_miss_is_persisted() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("nested").join("as_cache.json");
        let stub = StubLookup::with(&[("1.2.3.4", "AS1 Example")]);

        {
            let mut cache = AsCache::open(&path, &stub).unwrap();
            assert!(cache.is_empty());
            cache.resolve("1.2.3.4");
            cache.resolve("999.1.1.1");
        }

        let content = fs::read_to_string(&path).unwrap();
        let raw: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert_eq!(raw.get("1.2.3.4").map(String::as_str), Some("AS1 Example"));
        assert_eq!(
            raw.get("999.1.1.1").map(String::as_str),
            Some("Invalid IPv4 address.")
        );

        // a second run answers from the file
        let fresh = StubLookup::default();
        let mut cache = AsCache::open(&path, &fresh).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.resolve("1.2.3.4").org(), Some("AS1 Example"));
        assert_eq!(fresh.calls.get(), 0);
    }

    #[test]
    fn test_open_reads_existing_sentinels() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("as_cache.json");
        fs::write(
            &path,
            r#"{"8.8.8.8": "cURL Error: Could not resolve host: ipinfo.io", "9.9.9.9": "AS information not found."}"#,
        )
        .unwrap();

        let stub = StubLookup::default();
        let mut cache = AsCache::open(&path, &stub).unwrap();
        assert_eq!(
            cache.resolve("8.8.8.8"),
            AsResolution::TransportError("Could not resolve host: ipinfo.io".to_string())
        );
        assert_eq!(cache.get("9.9.9.9"), Some(&AsResolution::NotFound));
        assert_eq!(stub.calls.get(), 0);
    }

    #[test]
    fn test_open_non_object_is_empty() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("as_cache.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let stub = StubLookup::default();
        let cache = AsCache::open(&path, &stub).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_persist_failure_keeps_running() {
        let temp_dir = setup_test_dir();
        // a directory where the cache file should be makes every write fail
        let path = temp_dir.path().join("as_cache.json");
        fs::create_dir_all(&path).unwrap();

        let stub = StubLookup::with(&[("1.2.3.4", "AS1 Example")]);
        let mut cache = AsCache::open(&path, &stub).unwrap();
        assert_eq!(cache.resolve("1.2.3.4").org(), Some("AS1 Example"));
        assert!(cache.path().is_none());
        assert_eq!(cache.resolve("1.2.3.4").org(), Some("AS1 Example"));
        assert_eq!(stub.calls.get(), 1);
    }

    #[test]
    fn test_without_persistence() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("as_cache.json");
        let stub = StubLookup::default();

        let mut cache = AsCache::open(&path, &stub).unwrap().without_persistence();
        cache.resolve("1.1.1.1");
        assert!(!path.exists());
    }
}
