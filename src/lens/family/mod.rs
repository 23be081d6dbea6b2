//! Family lens
//!
//! Groups relays by the family they declare. A relay's family key is the
//! sorted, comma-joined list of `$`-prefixed 40-character fingerprints found in
//! its `family` line, so relays listing the same members in any order share a
//! group. Relays declaring nothing recognizable all land in the
//! [`NO_FAMILY`] group.
//!
//! Within a group relays are deduplicated by identity (fingerprint, else
//! nickname); a later observation replaces an earlier one in place.

use crate::lens::descriptor::RelayRecord;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

/// Key of the group holding relays without a recognizable family
pub const NO_FAMILY: &str = "no family";

#[allow(clippy::expect_used)]
fn fingerprint_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\$[A-Za-z0-9]{40}").expect("valid fingerprint pattern"))
}

// =============================================================================
// Types
// =============================================================================

/// Relays sharing one family key, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct FamilyGroup {
    key: String,
    relays: Vec<RelayRecord>,
    index: HashMap<String, usize>,
}

impl FamilyGroup {
    fn new(key: String) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    /// Insert a relay, replacing an earlier one with the same identity
    fn insert(&mut self, identity: String, record: RelayRecord) {
        match self.index.get(&identity) {
            Some(&pos) => {
                debug!("replacing duplicate relay {} in family {}", identity, self.key);
                self.relays[pos] = record;
            }
            None => {
                self.index.insert(identity, self.relays.len());
                self.relays.push(record);
            }
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn relays(&self) -> &[RelayRecord] {
        &self.relays
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }
}

/// All family groups of a run, in order of first appearance
#[derive(Debug, Clone, Default)]
pub struct FamilyGroups {
    groups: Vec<FamilyGroup>,
    index: HashMap<String, usize>,
}

impl FamilyGroups {
    fn entry(&mut self, key: String) -> &mut FamilyGroup {
        let pos = match self.index.get(&key) {
            Some(&pos) => pos,
            None => {
                let pos = self.groups.len();
                self.index.insert(key.clone(), pos);
                self.groups.push(FamilyGroup::new(key));
                pos
            }
        };
        &mut self.groups[pos]
    }

    pub fn get(&self, key: &str) -> Option<&FamilyGroup> {
        self.index.get(key).map(|&pos| &self.groups[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FamilyGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// =============================================================================
// Lens
// =============================================================================

/// Family grouping lens
///
/// # Example
///
/// ```rust,ignore
/// use relayfam::lens::family::FamilyLens;
///
/// let groups = FamilyLens::new().group(&records);
/// for group in groups.iter() {
///     println!("{}: {} relays", group.key(), group.len());
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FamilyLens;

impl FamilyLens {
    pub fn new() -> Self {
        Self
    }

    /// Canonical family key for declared family text
    pub fn family_key(&self, family: Option<&str>) -> String {
        let mut members: Vec<&str> = family
            .map(|text| {
                fingerprint_token()
                    .find_iter(text)
                    .map(|m| m.as_str())
                    .collect()
            })
            .unwrap_or_default();

        if members.is_empty() {
            return NO_FAMILY.to_string();
        }
        members.sort_unstable();
        members.join(",")
    }

    /// Partition relays into family groups
    pub fn group(&self, records: &[RelayRecord]) -> FamilyGroups {
        let mut groups = FamilyGroups::default();

        for record in records {
            let Some(identity) = record.identity() else {
                debug!("skipping relay record without identity");
                continue;
            };
            let key = self.family_key(record.family.as_deref());
            groups
                .entry(key)
                .insert(identity.to_string(), record.clone());
        }

        debug!(
            "grouped {} relay records into {} families",
            records.len(),
            groups.len()
        );
        groups
    }
}

// =============================================================================
// Tests
// =============================================================================
