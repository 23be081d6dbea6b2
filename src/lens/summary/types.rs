//! Summary lens types
//!
//! These are the hand-off types for renderers: everything a report needs is
//! already computed, rounded and ordered.

use crate::lens::utils::{truncate_text, DEFAULT_CELL_MAX_LEN};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-family network-health metrics
///
/// Bandwidth figures are MiB/s and all floating values are rounded to two
/// decimals. `*_sustained` is the descriptor's average bandwidth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilySummary {
    /// Family key: sorted member fingerprints, or "no family"
    pub family: String,
    pub relay_count: usize,
    pub exit_count: usize,
    pub non_exit_count: usize,
    pub avg_uptime_days: f64,
    pub total_bandwidth_sustained: f64,
    pub avg_bandwidth_sustained: f64,
    pub total_bandwidth_observed: f64,
    pub avg_bandwidth_observed: f64,
    pub total_bandwidth_burst: f64,
    pub avg_bandwidth_burst: f64,
    pub unique_ipv4: usize,
    pub unique_or_ports: usize,
    pub unique_as: usize,
    /// Distinct addresses that did not resolve to an AS
    pub ipv4_without_asn: usize,
    /// Distinct contact strings joined by `"; "`
    pub contacts: String,
}

/// Totals over every parsed relay, before grouping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct NetworkTotals {
    #[cfg_attr(feature = "display", tabled(rename = "Total Relays"))]
    pub total_relays: usize,
    #[cfg_attr(feature = "display", tabled(rename = "Unique Fingerprints"))]
    pub unique_fingerprints: usize,
    #[cfg_attr(feature = "display", tabled(rename = "Unique Contacts"))]
    pub unique_contacts: usize,
    #[cfg_attr(feature = "display", tabled(rename = "Unique IPv4 Addresses"))]
    pub unique_ipv4: usize,
}

/// Complete output of one summarization run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    /// Latest snapshot timestamp among the inputs, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    pub totals: NetworkTotals,
    /// Ordered by relay count, largest first
    pub families: Vec<FamilySummary>,
}

/// Table row for a family summary, long text truncated
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct FamilySummaryRow {
    #[cfg_attr(feature = "display", tabled(rename = "Family"))]
    pub family: String,
    #[cfg_attr(feature = "display", tabled(rename = "Relays"))]
    pub relay_count: usize,
    #[cfg_attr(feature = "display", tabled(rename = "Exit Count"))]
    pub exit_count: usize,
    #[cfg_attr(feature = "display", tabled(rename = "Non-Exit Count"))]
    pub non_exit_count: usize,
    #[cfg_attr(feature = "display", tabled(rename = "Avg Uptime (days)"))]
    pub avg_uptime_days: f64,
    #[cfg_attr(feature = "display", tabled(rename = "Total Bandwidth (MiB/s)"))]
    pub total_bandwidth_sustained: f64,
    #[cfg_attr(feature = "display", tabled(rename = "Avg Bandwidth (MiB/s)"))]
    pub avg_bandwidth_sustained: f64,
    #[cfg_attr(feature = "display", tabled(rename = "Total Bandwidth Observed (MiB/s)"))]
    pub total_bandwidth_observed: f64,
    #[cfg_attr(feature = "display", tabled(rename = "Avg Bandwidth Observed (MiB/s)"))]
    pub avg_bandwidth_observed: f64,
    #[cfg_attr(feature = "display", tabled(rename = "Total Burst (MiB/s)"))]
    pub total_bandwidth_burst: f64,
    #[cfg_attr(feature = "display", tabled(rename = "Avg Burst (MiB/s)"))]
    pub avg_bandwidth_burst: f64,
    #[cfg_attr(feature = "display", tabled(rename = "Unique IPv4 Addresses"))]
    pub unique_ipv4: usize,
    #[cfg_attr(feature = "display", tabled(rename = "Unique ORPorts"))]
    pub unique_or_ports: usize,
    #[cfg_attr(feature = "display", tabled(rename = "Unique AS"))]
    pub unique_as: usize,
    #[cfg_attr(feature = "display", tabled(rename = "IPv4 w/o ASN Count"))]
    pub ipv4_without_asn: usize,
    #[cfg_attr(feature = "display", tabled(rename = "Contacts"))]
    pub contacts: String,
}

impl From<&FamilySummary> for FamilySummaryRow {
    fn from(summary: &FamilySummary) -> Self {
        Self {
            family: truncate_text(&summary.family, DEFAULT_CELL_MAX_LEN),
            relay_count: summary.relay_count,
            exit_count: summary.exit_count,
            non_exit_count: summary.non_exit_count,
            avg_uptime_days: summary.avg_uptime_days,
            total_bandwidth_sustained: summary.total_bandwidth_sustained,
            avg_bandwidth_sustained: summary.avg_bandwidth_sustained,
            total_bandwidth_observed: summary.total_bandwidth_observed,
            avg_bandwidth_observed: summary.avg_bandwidth_observed,
            total_bandwidth_burst: summary.total_bandwidth_burst,
            avg_bandwidth_burst: summary.avg_bandwidth_burst,
            unique_ipv4: summary.unique_ipv4,
            unique_or_ports: summary.unique_or_ports,
            unique_as: summary.unique_as,
            ipv4_without_asn: summary.ipv4_without_asn,
            contacts: truncate_text(&summary.contacts, DEFAULT_CELL_MAX_LEN),
        }
    }
}

/// Progress information for a summarization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SummaryProgress {
    /// Summarization has started
    Started { total_families: usize },
    /// One family is done
    FamilyDone {
        completed: usize,
        total_families: usize,
        /// Calls to the lookup service made for this family
        new_lookups: usize,
    },
    /// All families are done
    Completed {
        total_families: usize,
        /// Calls to the lookup service made during the whole run
        new_lookups: usize,
    },
}

/// Callback receiving [`SummaryProgress`] updates
pub type SummaryProgressCallback = Arc<dyn Fn(SummaryProgress) + Send + Sync>;
