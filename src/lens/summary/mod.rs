//! Summary lens
//!
//! Computes network-health metrics for each relay family and totals for the
//! whole input. This is the last step before presentation:
//!
//! ```text
//! records ──► FamilyLens::group ──► SummaryLens::summarize ──► NetworkReport
//!                                         │
//!                                         └── AsCache (one lookup per new IPv4)
//! ```
//!
//! Numeric descriptor fields are converted here. Absent or non-numeric values
//! contribute nothing to sums; averages are taken over every relay of the
//! family. Bandwidth is reported in MiB/s and every float is rounded to two decimals
//! (half away from zero).

pub mod types;

pub use types::{
    FamilySummary, FamilySummaryRow, NetworkReport, NetworkTotals, SummaryProgress,
    SummaryProgressCallback,
};

use crate::cache::AsCache;
use crate::lens::asn::{AsLookup, AsResolution};
use crate::lens::descriptor::RelayRecord;
use crate::lens::family::{FamilyGroup, FamilyGroups, FamilyLens};
use crate::lens::utils::{psv_field, OutputFormat};
use itertools::Itertools;
use std::collections::HashSet;
use tracing::{debug, info};

pub const BYTES_PER_MIB: f64 = 1_048_576.0;
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Round to two decimal places, halves away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn numeric(field: &Option<String>) -> Option<f64> {
    field
        .as_deref()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn field_sum(relays: &[RelayRecord], field: fn(&RelayRecord) -> &Option<String>) -> f64 {
    relays.iter().filter_map(|r| numeric(field(r))).sum()
}

/// Family-wide average of a summed field
fn mean(sum: f64, relays: usize) -> f64 {
    if relays == 0 {
        0.0
    } else {
        sum / relays as f64
    }
}

// =============================================================================
// Lens
// =============================================================================

/// Family metrics lens
///
/// # Example
///
/// ```rust,ignore
/// use relayfam::cache::AsCache;
/// use relayfam::lens::asn::IpinfoLookup;
/// use relayfam::lens::summary::SummaryLens;
///
/// let mut cache = AsCache::open("as_cache.json", IpinfoLookup::new(token))?;
/// let report = SummaryLens::new().build_report(&records, &mut cache, None);
/// for family in &report.families {
///     println!("{}: {} relays", family.family, family.relay_count);
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryLens;

impl SummaryLens {
    pub fn new() -> Self {
        Self
    }

    /// Totals over the flat record list
    pub fn totals(&self, records: &[RelayRecord]) -> NetworkTotals {
        NetworkTotals {
            total_relays: records.len(),
            unique_fingerprints: records
                .iter()
                .filter_map(|r| r.fingerprint.as_deref())
                .unique()
                .count(),
            unique_contacts: records
                .iter()
                .filter_map(|r| r.contact.as_deref())
                .filter(|c| !c.is_empty())
                .unique()
                .count(),
            unique_ipv4: records
                .iter()
                .filter_map(|r| r.ipv4.as_deref())
                .unique()
                .count(),
        }
    }

    /// Metrics for a single family
    ///
    /// Each distinct IPv4 of the family is resolved through `cache` once.
    pub fn summarize_family<L: AsLookup>(
        &self,
        group: &FamilyGroup,
        cache: &mut AsCache<L>,
    ) -> FamilySummary {
        let relays = group.relays();

        let n = relays.len();
        let uptime = field_sum(relays, |r| &r.uptime);
        let sustained = field_sum(relays, |r| &r.bandwidth_avg);
        let observed = field_sum(relays, |r| &r.bandwidth_observed);
        let burst = field_sum(relays, |r| &r.bandwidth_burst);

        let addresses: Vec<&str> = relays
            .iter()
            .filter_map(|r| r.ipv4.as_deref())
            .unique()
            .collect();

        let mut orgs = HashSet::new();
        let mut ipv4_without_asn = 0;
        for ip in &addresses {
            match cache.resolve(ip) {
                AsResolution::Org(org) => {
                    orgs.insert(org);
                }
                other => {
                    debug!("{} in family {} has no AS: {}", ip, group.key(), other);
                    ipv4_without_asn += 1;
                }
            }
        }

        let exit_count = relays.iter().filter(|r| r.exit_relay).count();

        FamilySummary {
            family: group.key().to_string(),
            relay_count: n,
            exit_count,
            non_exit_count: n - exit_count,
            avg_uptime_days: round2(mean(uptime, n) / SECONDS_PER_DAY),
            total_bandwidth_sustained: round2(sustained / BYTES_PER_MIB),
            avg_bandwidth_sustained: round2(mean(sustained, n) / BYTES_PER_MIB),
            total_bandwidth_observed: round2(observed / BYTES_PER_MIB),
            avg_bandwidth_observed: round2(mean(observed, n) / BYTES_PER_MIB),
            total_bandwidth_burst: round2(burst / BYTES_PER_MIB),
            avg_bandwidth_burst: round2(mean(burst, n) / BYTES_PER_MIB),
            unique_ipv4: addresses.len(),
            unique_or_ports: relays
                .iter()
                .filter_map(|r| r.or_port.as_deref())
                .unique()
                .count(),
            unique_as: orgs.len(),
            ipv4_without_asn,
            contacts: relays
                .iter()
                .filter_map(|r| r.contact.as_deref())
                .filter(|c| !c.is_empty())
                .unique()
                .join("; "),
        }
    }

    /// Metrics for every family, largest family first
    pub fn summarize<L: AsLookup>(
        &self,
        groups: &FamilyGroups,
        cache: &mut AsCache<L>,
    ) -> Vec<FamilySummary> {
        self.summarize_with_progress(groups, cache, None)
    }

    /// Like [`SummaryLens::summarize`], reporting progress after each family
    pub fn summarize_with_progress<L: AsLookup>(
        &self,
        groups: &FamilyGroups,
        cache: &mut AsCache<L>,
        progress: Option<SummaryProgressCallback>,
    ) -> Vec<FamilySummary> {
        let total_families = groups.len();
        let lookups_before = cache.lookups();
        if let Some(cb) = &progress {
            cb(SummaryProgress::Started { total_families });
        }

        let mut summaries = Vec::with_capacity(total_families);
        for (i, group) in groups.iter().enumerate() {
            let before = cache.lookups();
            summaries.push(self.summarize_family(group, cache));
            if let Some(cb) = &progress {
                cb(SummaryProgress::FamilyDone {
                    completed: i + 1,
                    total_families,
                    new_lookups: cache.lookups() - before,
                });
            }
        }

        // stable: equal counts keep grouping order
        summaries.sort_by(|a, b| b.relay_count.cmp(&a.relay_count));

        let new_lookups = cache.lookups() - lookups_before;
        info!(
            "summarized {} families with {} new AS lookups",
            total_families, new_lookups
        );
        if let Some(cb) = &progress {
            cb(SummaryProgress::Completed {
                total_families,
                new_lookups,
            });
        }
        summaries
    }

    /// Run grouping and summarization over a flat record list
    pub fn build_report<L: AsLookup>(
        &self,
        records: &[RelayRecord],
        cache: &mut AsCache<L>,
        progress: Option<SummaryProgressCallback>,
    ) -> NetworkReport {
        let totals = self.totals(records);
        let groups = FamilyLens::new().group(records);
        let families = self.summarize_with_progress(&groups, cache, progress);

        NetworkReport {
            snapshot: None,
            totals,
            families,
        }
    }

    /// Render a report
    ///
    /// Table formats need the `display` feature; without it they fall back to
    /// pretty JSON.
    pub fn format_report(&self, report: &NetworkReport, format: &OutputFormat) -> String {
        match format {
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Psv => self.format_psv(report),
            OutputFormat::Table | OutputFormat::Markdown => self.format_tables(report, format),
        }
    }

    fn format_psv(&self, report: &NetworkReport) -> String {
        let mut lines = vec![[
            "family",
            "relays",
            "exits",
            "non_exits",
            "avg_uptime_days",
            "total_bw_sustained",
            "avg_bw_sustained",
            "total_bw_observed",
            "avg_bw_observed",
            "total_bw_burst",
            "avg_bw_burst",
            "unique_ipv4",
            "unique_or_ports",
            "unique_as",
            "ipv4_without_asn",
            "contacts",
        ]
        .join("|")];

        for s in &report.families {
            lines.push(format!(
                "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
                psv_field(&s.family),
                s.relay_count,
                s.exit_count,
                s.non_exit_count,
                s.avg_uptime_days,
                s.total_bandwidth_sustained,
                s.avg_bandwidth_sustained,
                s.total_bandwidth_observed,
                s.avg_bandwidth_observed,
                s.total_bandwidth_burst,
                s.avg_bandwidth_burst,
                s.unique_ipv4,
                s.unique_or_ports,
                s.unique_as,
                s.ipv4_without_asn,
                psv_field(&s.contacts),
            ));
        }
        lines.join("\n")
    }

    #[cfg(feature = "display")]
    fn format_tables(&self, report: &NetworkReport, format: &OutputFormat) -> String {
        use tabled::settings::Style;
        use tabled::Table;

        let rows: Vec<FamilySummaryRow> = report.families.iter().map(Into::into).collect();
        let mut totals = Table::new([report.totals.clone()]);
        let mut families = Table::new(rows);
        match format {
            OutputFormat::Markdown => {
                totals.with(Style::markdown());
                families.with(Style::markdown());
            }
            _ => {
                totals.with(Style::rounded());
                families.with(Style::rounded());
            }
        }

        let mut out = String::new();
        if let Some(snapshot) = &report.snapshot {
            out.push_str(&format!("Snapshot: {}\n\n", snapshot));
        }
        out.push_str(&format!("{}\n\n{}", totals, families));
        out
    }

    #[cfg(not(feature = "display"))]
    fn format_tables(&self, report: &NetworkReport, _format: &OutputFormat) -> String {
        serde_json::to_string_pretty(report).unwrap_or_default()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::as_cache::tests::StubLookup;
    use crate::lens::descriptor::DescriptorLens;
    use std::sync::{Arc, Mutex};

    const FP_A: &str = "$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const FP_B: &str = "$BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

    fn relay(nickname: &str, ipv4: &str, family: Option<&str>) -> RelayRecord {
        RelayRecord {
            nickname: Some(nickname.to_string()),
            ipv4: Some(ipv4.to_string()),
            or_port: Some("9001".to_string()),
            family: family.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(2.0), 2.0);
        assert_eq!(round2(1.004), 1.0);
    }

    #[test]
    fn test_two_relay_family_scenario() {
        let content = format!(
            "@type server-descriptor 1.0\n\
             router alice 1.2.3.4 9001 0 0\n\
             bandwidth 1048576 2097152 3145728\n\
             uptime 86400\n\
             family {fp}\n\
             @type server-descriptor 1.0\n\
             family {fp}\n\
             router bob 5.6.7.8 9001 0 0\n",
            fp = FP_A
        );
        let records: Vec<RelayRecord> = DescriptorLens::new().records(&content).collect();

        let stub = StubLookup::with(&[("1.2.3.4", "AS1 Example"), ("5.6.7.8", "AS2 Other")]);
        let mut cache = AsCache::in_memory(&stub);
        let report = SummaryLens::new().build_report(&records, &mut cache, None);

        assert_eq!(report.families.len(), 1);
        let family = &report.families[0];
        assert_eq!(family.family, FP_A);
        assert_eq!(family.relay_count, 2);
        assert_eq!(family.exit_count, 0);
        assert_eq!(family.non_exit_count, 2);
        assert_eq!(family.avg_uptime_days, 0.5);
        assert_eq!(family.total_bandwidth_observed, 3.0);
        assert_eq!(family.avg_bandwidth_observed, 1.5);
        assert_eq!(family.total_bandwidth_sustained, 1.0);
        assert_eq!(family.total_bandwidth_burst, 2.0);
        assert_eq!(family.unique_ipv4, 2);
        assert_eq!(family.unique_or_ports, 1);
        assert_eq!(family.unique_as, 2);
        assert_eq!(family.ipv4_without_asn, 0);
    }

    #[test]
    fn test_missing_values_add_nothing() {
        let mut alice = relay("alice", "1.2.3.4", Some(FP_A));
        alice.uptime = Some("43200".to_string());
        let mut bob = relay("bob", "5.6.7.8", Some(FP_A));
        bob.uptime = Some("not-a-number".to_string());
        let carol = relay("carol", "5.6.7.9", Some(FP_A));

        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);
        let groups = FamilyLens::new().group(&[alice, bob, carol]);
        let summary = SummaryLens::new().summarize_family(groups.get(FP_A).unwrap(), &mut cache);

        // 43200s over three relays
        assert_eq!(summary.avg_uptime_days, 0.17);
        assert_eq!(summary.total_bandwidth_observed, 0.0);
        assert_eq!(summary.avg_bandwidth_observed, 0.0);
    }

    #[test]
    fn test_total_observed_bandwidth_rounding() {
        let values = [123_456.0, 7_654_321.0, 1.0, 999_999.0];
        let records: Vec<RelayRecord> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut r = relay(&format!("r{}", i), &format!("10.0.0.{}", i), Some(FP_A));
                r.bandwidth_observed = Some(format!("{}", v));
                r
            })
            .collect();

        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);
        let report = SummaryLens::new().build_report(&records, &mut cache, None);

        let expected = round2(values.iter().sum::<f64>() / 1_048_576.0);
        assert_eq!(report.families[0].total_bandwidth_observed, expected);
        assert_eq!(expected, 8.37);
    }

    #[test]
    fn test_exit_counts() {
        let mut exit = relay("exit", "1.1.1.1", Some(FP_A));
        exit.exit_relay = true;
        let records = vec![exit, relay("middle", "2.2.2.2", Some(FP_A))];

        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);
        let report = SummaryLens::new().build_report(&records, &mut cache, None);

        assert_eq!(report.families[0].exit_count, 1);
        assert_eq!(report.families[0].non_exit_count, 1);
    }

    #[test]
    fn test_invalid_and_unresolved_addresses() {
        let records = vec![
            relay("a", "999.1.1.1", Some(FP_A)),
            relay("b", "1.2.3.4", Some(FP_A)),
            relay("c", "1.2.3.4", Some(FP_A)),
            relay("d", "8.8.8.8", Some(FP_A)),
            relay("e", "9.9.9.9", Some(FP_A)),
        ];

        let stub = StubLookup::with(&[("1.2.3.4", "AS1 Example"), ("9.9.9.9", "AS1 Example")]);
        let mut cache = AsCache::in_memory(&stub);
        let report = SummaryLens::new().build_report(&records, &mut cache, None);
        let family = &report.families[0];

        assert_eq!(family.unique_ipv4, 4);
        assert_eq!(family.unique_as, 1);
        // 999.1.1.1 is invalid, 8.8.8.8 has no AS data
        assert_eq!(family.ipv4_without_asn, 2);
        assert_eq!(
            cache.get("999.1.1.1"),
            Some(&AsResolution::InvalidAddress)
        );

        // every valid distinct address looked up exactly once
        assert_eq!(stub.calls.get(), 3);
        let seen: Vec<String> = stub.seen.borrow().iter().map(|ip| ip.to_string()).collect();
        assert_eq!(seen, vec!["1.2.3.4", "8.8.8.8", "9.9.9.9"]);
    }

    #[test]
    fn test_addresses_shared_across_families_resolve_once() {
        let records = vec![
            relay("a", "1.2.3.4", Some(FP_A)),
            relay("b", "1.2.3.4", Some(FP_B)),
        ];

        let stub = StubLookup::with(&[("1.2.3.4", "AS1 Example")]);
        let mut cache = AsCache::in_memory(&stub);
        let report = SummaryLens::new().build_report(&records, &mut cache, None);

        assert_eq!(report.families.len(), 2);
        assert!(report.families.iter().all(|f| f.unique_as == 1));
        assert_eq!(stub.calls.get(), 1);
    }

    #[test]
    fn test_contacts_deduplicated() {
        let mut a = relay("a", "1.1.1.1", Some(FP_A));
        a.contact = Some("ops at example dot org".to_string());
        let mut b = relay("b", "1.1.1.2", Some(FP_A));
        b.contact = Some("ops at example dot org".to_string());
        let mut c = relay("c", "1.1.1.3", Some(FP_A));
        c.contact = Some("Ops at example dot org".to_string());
        let d = relay("d", "1.1.1.4", Some(FP_A));

        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);
        let report = SummaryLens::new().build_report(&[a, b, c, d], &mut cache, None);

        assert_eq!(
            report.families[0].contacts,
            "ops at example dot org; Ops at example dot org"
        );
        assert_eq!(report.totals.unique_contacts, 2);
    }

    #[test]
    fn test_families_sorted_by_size_stable() {
        let records = vec![
            relay("solo-a", "1.0.0.1", Some(FP_A)),
            relay("n1", "2.0.0.1", None),
            relay("n2", "2.0.0.2", None),
            relay("solo-b", "3.0.0.1", Some(FP_B)),
        ];

        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);
        let report = SummaryLens::new().build_report(&records, &mut cache, None);

        let order: Vec<&str> = report.families.iter().map(|f| f.family.as_str()).collect();
        assert_eq!(order, vec![crate::lens::family::NO_FAMILY, FP_A, FP_B]);
    }

    #[test]
    fn test_totals() {
        let mut a = relay("a", "1.1.1.1", Some(FP_A));
        a.fingerprint = Some("AAAA 0001".to_string());
        let mut b = relay("b", "1.1.1.1", None);
        b.fingerprint = Some("AAAA 0002".to_string());
        b.contact = Some("x".to_string());
        let mut c = relay("c", "2.2.2.2", None);
        c.fingerprint = Some("AAAA 0002".to_string());

        let totals = SummaryLens::new().totals(&[a, b, c]);
        assert_eq!(
            totals,
            NetworkTotals {
                total_relays: 3,
                unique_fingerprints: 2,
                unique_contacts: 1,
                unique_ipv4: 2,
            }
        );
    }

    #[test]
    fn test_empty_input() {
        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);
        let report = SummaryLens::new().build_report(&[], &mut cache, None);

        assert!(report.families.is_empty());
        assert_eq!(report.totals, NetworkTotals::default());
    }

    #[test]
    fn test_progress_events() {
        let records = vec![
            relay("a", "1.1.1.1", Some(FP_A)),
            relay("b", "2.2.2.2", Some(FP_B)),
        ];
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: SummaryProgressCallback = Arc::new(move |p: SummaryProgress| {
            sink.lock().unwrap().push(p);
        });

        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);
        SummaryLens::new().build_report(&records, &mut cache, Some(callback));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0],
            SummaryProgress::Started { total_families: 2 }
        ));
        assert!(matches!(
            events[1],
            SummaryProgress::FamilyDone {
                completed: 1,
                new_lookups: 1,
                ..
            }
        ));
        assert!(matches!(
            events[3],
            SummaryProgress::Completed {
                total_families: 2,
                new_lookups: 2
            }
        ));
    }

    #[test]
    fn test_progress_counts_only_external_lookups() {
        let records = vec![
            relay("a", "999.1.1.1", Some(FP_A)),
            relay("b", "1.1.1.1", Some(FP_A)),
            relay("c", "1.1.1.1", Some(FP_B)),
        ];
        let completed = Arc::new(Mutex::new(None));
        let sink = completed.clone();
        let callback: SummaryProgressCallback = Arc::new(move |p: SummaryProgress| {
            if let SummaryProgress::Completed { new_lookups, .. } = p {
                *sink.lock().unwrap() = Some(new_lookups);
            }
        });

        let stub = StubLookup::default();
        let mut cache = AsCache::in_memory(&stub);
        SummaryLens::new().build_report(&records, &mut cache, Some(callback));

        // the invalid address is cached but never sent to the service
        assert_eq!(cache.len(), 2);
        assert_eq!(*completed.lock().unwrap(), Some(1));
        assert_eq!(stub.calls.get(), 1);
    }

    #[test]
    fn test_format_report() {
        let lens = SummaryLens::new();
        let report = NetworkReport {
            snapshot: Some("2024-05-01 00:00:00".to_string()),
            totals: NetworkTotals {
                total_relays: 1,
                ..Default::default()
            },
            families: vec![FamilySummary {
                family: FP_A.to_string(),
                relay_count: 1,
                contacts: "a|b".to_string(),
                ..Default::default()
            }],
        };

        let json = lens.format_report(&report, &OutputFormat::Json);
        assert!(json.contains("\"relay_count\":1"));
        assert!(json.contains("\"snapshot\":\"2024-05-01 00:00:00\""));

        let psv = lens.format_report(&report, &OutputFormat::Psv);
        let lines: Vec<&str> = psv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("family|relays|"));
        assert!(lines[1].ends_with("|a\\|b"));

        let table = lens.format_report(&report, &OutputFormat::Table);
        assert!(table.contains("2024-05-01 00:00:00"));
    }
}
