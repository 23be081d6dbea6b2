//! Descriptor lens
//!
//! Turns relay-descriptor snapshot files into [`RelayRecord`]s. A file is a
//! concatenation of descriptor blocks, each starting with an
//! `@type server-descriptor` line:
//!
//! ```text
//! @type server-descriptor 1.0
//! router alice 1.2.3.4 9001 0 0
//! bandwidth 1048576 2097152 3145728
//! uptime 86400
//! family $AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA
//! contact alice at example dot org
//! reject *:*
//! ```
//!
//! Parsing is best-effort. Unknown keywords and short or malformed lines are
//! skipped, and blocks without a nickname are dropped. Nothing here fails on
//! bad descriptor content; only unreadable files produce errors.
//!
//! Skipped lines and dropped blocks are reported as `tracing` events at
//! `trace`/`debug` level, so they stay silent unless a subscriber asks for them.

pub mod snapshot;
pub mod types;

pub use snapshot::{discover_files, expand_inputs, snapshot_time};
pub use types::{RelayRecord, RelayRecordRow};

use anyhow::{anyhow, Result};
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info, trace, warn};

/// Marker that opens every descriptor block
pub const BLOCK_MARKER: &str = "@type";

const BLOCK_BREAK: &str = "\n@type";

// =============================================================================
// Block splitting
// =============================================================================

/// Iterator over the raw descriptor blocks of one file's content
///
/// Blocks are trimmed; empty blocks are skipped. Text before the first marker
/// is yielded as a block of its own.
pub struct DescriptorBlocks<'a> {
    rest: &'a str,
}

impl<'a> DescriptorBlocks<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { rest: content }
    }
}

impl<'a> Iterator for DescriptorBlocks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while !self.rest.is_empty() {
            // look for the next marker past the one opening this block
            let search_from = if self.rest.starts_with(BLOCK_MARKER) {
                BLOCK_MARKER.len()
            } else {
                0
            };
            let end = self.rest[search_from..]
                .find(BLOCK_BREAK)
                .map(|pos| search_from + pos + 1)
                .unwrap_or(self.rest.len());

            let (block, rest) = self.rest.split_at(end);
            self.rest = rest;

            let block = block.trim();
            if !block.is_empty() {
                return Some(block);
            }
        }
        None
    }
}

// =============================================================================
// Lens
// =============================================================================

/// Relay-descriptor parsing lens
///
/// # Example
///
/// ```rust,ignore
/// use relayfam::lens::descriptor::DescriptorLens;
///
/// let lens = DescriptorLens::new();
/// let records = lens.read_file("2024-05-01-00-00-00-server-descriptors")?;
/// for record in &records {
///     println!("{:?} {:?}", record.nickname, record.ipv4);
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorLens;

impl DescriptorLens {
    pub fn new() -> Self {
        Self
    }

    /// Parse one descriptor block into a record
    ///
    /// Never fails: lines that cannot be used are skipped individually.
    pub fn parse_block(&self, block: &str) -> RelayRecord {
        let mut record = RelayRecord::default();

        for line in block.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // coarse exit detection: any mention of "accept" counts
            if line.to_lowercase().contains("accept") {
                record.exit_relay = true;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some((keyword, args)) = tokens.split_first() else {
                continue;
            };

            match keyword.to_lowercase().as_str() {
                "@type" => {}
                "router" => {
                    if let [nickname, ipv4, or_port, socks_port, dir_port, ..] = args {
                        record.nickname = Some(nickname.to_string());
                        record.ipv4 = Some(ipv4.to_string());
                        record.or_port = Some(or_port.to_string());
                        record.socks_port = Some(socks_port.to_string());
                        record.dir_port = Some(dir_port.to_string());
                    } else {
                        trace!("skipping short router line: {}", line);
                    }
                }
                "uptime" => match args.first() {
                    Some(uptime) => record.uptime = Some(uptime.to_string()),
                    None => trace!("skipping short uptime line: {}", line),
                },
                "bandwidth" => {
                    if let [avg, burst, observed, ..] = args {
                        record.bandwidth_avg = Some(avg.to_string());
                        record.bandwidth_burst = Some(burst.to_string());
                        record.bandwidth_observed = Some(observed.to_string());
                    } else {
                        trace!("skipping short bandwidth line: {}", line);
                    }
                }
                "family" => {
                    if args.is_empty() {
                        trace!("skipping empty family line");
                    } else {
                        record.family = Some(args.join(" "));
                    }
                }
                "contact" => {
                    let text = args.join(" ");
                    record.contact = Some(match record.contact.take() {
                        Some(earlier) => format!("{}; {}", earlier, text),
                        None => text,
                    });
                }
                "fingerprint" => {
                    if args.is_empty() {
                        trace!("skipping empty fingerprint line");
                    } else {
                        record.fingerprint = Some(args.join(" "));
                    }
                }
                _ => {}
            }
        }

        record
    }

    /// Split file content into raw descriptor blocks
    pub fn blocks<'a>(&self, content: &'a str) -> DescriptorBlocks<'a> {
        DescriptorBlocks::new(content)
    }

    /// Parse all usable relay records out of file content
    ///
    /// Records without a nickname are dropped.
    pub fn records<'a>(&'a self, content: &'a str) -> impl Iterator<Item = RelayRecord> + 'a {
        self.blocks(content)
            .map(|block| self.parse_block(block))
            .filter(|record| {
                let usable = record.is_usable();
                if !usable {
                    debug!("dropping descriptor block without a nickname");
                }
                usable
            })
    }

    /// Read one descriptor file, local or remote, plain or compressed
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<RelayRecord>> {
        let path = path.as_ref().to_string_lossy();
        let content = oneio::read_to_string(&path)
            .map_err(|e| anyhow!("Failed to read descriptor file {}: {}", path, e))?;

        let records: Vec<RelayRecord> = self.records(&content).collect();
        debug!("parsed {} relay records from {}", records.len(), path);
        Ok(records)
    }

    /// Read many descriptor files
    ///
    /// Files are parsed in parallel, but records come back in input order.
    /// Unreadable files are logged and skipped.
    pub fn read_files<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Vec<RelayRecord> {
        let results: Vec<Result<Vec<RelayRecord>>> =
            paths.par_iter().map(|path| self.read_file(path)).collect();

        let mut records = Vec::new();
        let mut failed = 0;
        for result in results {
            match result {
                Ok(file_records) => records.extend(file_records),
                Err(e) => {
                    failed += 1;
                    warn!("{}", e);
                }
            }
        }

        info!(
            "read {} relay records from {} files ({} unreadable)",
            records.len(),
            paths.len() - failed,
            failed
        );
        records
    }
}

// =============================================================================
// Tests
// =============================================================================
