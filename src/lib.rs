#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Relayfam - relay family health reports
//!
//! Relayfam reads archived relay server descriptors, groups the relays by the
//! family they declare and reports network-health metrics per family: relay
//! and exit counts, uptime, bandwidth, address diversity and the number of
//! distinct autonomous systems the family spans. AS information comes from an
//! external lookup service and is memoized in a persistent JSON cache.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | Command-line binary | `clap`, `indicatif`, `tracing-subscriber` |
//!
//! The library itself (parsing, grouping, summarizing, cache) is always
//! available:
//!
//! ```toml
//! relayfam = { version = "0.1", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - **[`lens`]**: the processing steps
//!   - `descriptor`: split descriptor files into blocks and parse relay records
//!   - `family`: canonical family keys and grouping
//!   - `summary`: per-family metrics, totals and report rendering
//!   - `asn`: IPv4 to AS organization lookups
//! - **[`cache`]**: the persistent AS lookup cache
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use relayfam::{AsCache, DescriptorLens, RelayfamConfig, SummaryLens};
//!
//! let config = RelayfamConfig::new(&None)?;
//! let records = DescriptorLens::new().read_files(&["2024-05-01-00-00-00-server-descriptors"]);
//!
//! let mut cache = AsCache::open(config.as_cache_file.as_str(), config.as_lookup())?;
//! let report = SummaryLens::new().build_report(&records, &mut cache, None);
//!
//! for family in &report.families {
//!     println!("{}: {} relays in {} AS", family.family, family.relay_count, family.unique_as);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod lens;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{format_size, RelayfamConfig};

// =============================================================================
// Cache
// =============================================================================

pub use cache::AsCache;

// =============================================================================
// Lens Module
// =============================================================================

pub use lens::asn::{AsLookup, AsResolution, IpinfoLookup};
pub use lens::descriptor::{DescriptorLens, RelayRecord};
pub use lens::family::{FamilyGroup, FamilyGroups, FamilyLens, NO_FAMILY};
pub use lens::summary::{
    FamilySummary, NetworkReport, NetworkTotals, SummaryLens, SummaryProgress,
    SummaryProgressCallback,
};
pub use lens::utils::OutputFormat;
