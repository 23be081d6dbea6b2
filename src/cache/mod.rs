//! Persistent caches
//!
//! Currently only the AS lookup cache, a flat JSON file mapping IPv4
//! addresses to lookup outcomes.

pub mod as_cache;

pub use as_cache::AsCache;
