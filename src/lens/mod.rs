//! Lens module
//!
//! Each lens wraps one step of the pipeline together with the types its
//! callers need. Lenses are plain unit structs; anything stateful (the AS
//! cache) is passed in by the caller.
//!
//! | Lens | Purpose | Dependencies |
//! |------|---------|--------------|
//! | `DescriptorLens` | split and parse descriptor text | oneio, rayon |
//! | `FamilyLens` | group relays by declared family | regex |
//! | `SummaryLens` | per-family metrics and report output | itertools, tabled |
//! | `IpinfoLookup` | IPv4 to AS organization lookups | ureq |
//!
//! # Usage
//!
//! ```rust,ignore
//! use relayfam::cache::AsCache;
//! use relayfam::lens::descriptor::DescriptorLens;
//! use relayfam::lens::summary::SummaryLens;
//! use relayfam::lens::utils::OutputFormat;
//!
//! let records = DescriptorLens::new().read_files(&paths);
//! let mut cache = AsCache::open(config.as_cache_file.as_str(), config.as_lookup())?;
//! let report = SummaryLens::new().build_report(&records, &mut cache, None);
//! println!("{}", SummaryLens::new().format_report(&report, &OutputFormat::Markdown));
//! ```

pub mod utils;

// IpinfoLookup - IPv4 to AS organization
pub mod asn;

// DescriptorLens - server descriptor parsing
pub mod descriptor;

// FamilyLens - relay family grouping
pub mod family;

// SummaryLens - family metrics and rendering
pub mod summary;
