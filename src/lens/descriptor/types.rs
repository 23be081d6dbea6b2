//! Descriptor lens types

use serde::{Deserialize, Serialize};

/// One relay, as described by a single descriptor block
///
/// Numeric fields are kept as the text found in the descriptor and are only
/// converted when metrics are computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRecord {
    pub nickname: Option<String>,
    pub ipv4: Option<String>,
    pub or_port: Option<String>,
    pub socks_port: Option<String>,
    pub dir_port: Option<String>,
    /// Seconds
    pub uptime: Option<String>,
    /// Bytes per second
    pub bandwidth_avg: Option<String>,
    /// Bytes per second
    pub bandwidth_burst: Option<String>,
    /// Bytes per second
    pub bandwidth_observed: Option<String>,
    /// Declared family, as written in the descriptor
    pub family: Option<String>,
    /// All contact lines of the block, joined by `"; "`
    pub contact: Option<String>,
    pub fingerprint: Option<String>,
    /// Set when any line of the block mentions `accept`
    pub exit_relay: bool,
}

impl RelayRecord {
    /// Whether this record identifies a relay at all
    pub fn is_usable(&self) -> bool {
        self.nickname.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Identity used to deduplicate observations: fingerprint, else nickname
    pub fn identity(&self) -> Option<&str> {
        self.fingerprint
            .as_deref()
            .filter(|f| !f.is_empty())
            .or(self.nickname.as_deref())
    }
}

/// Flat view of a record for table output
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct RelayRecordRow {
    pub nickname: String,
    pub ipv4: String,
    pub or_port: String,
    pub uptime: String,
    pub bandwidth_observed: String,
    pub exit: bool,
    pub fingerprint: String,
    pub contact: String,
}

impl From<&RelayRecord> for RelayRecordRow {
    fn from(record: &RelayRecord) -> Self {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        Self {
            nickname: text(&record.nickname),
            ipv4: text(&record.ipv4),
            or_port: text(&record.or_port),
            uptime: text(&record.uptime),
            bandwidth_observed: text(&record.bandwidth_observed),
            exit: record.exit_relay,
            fingerprint: text(&record.fingerprint),
            contact: text(&record.contact),
        }
    }
}
