//! AS lookup lens
//!
//! This module resolves IPv4 addresses to the organization string of the
//! autonomous system that announces them. Lookups go to an external
//! IP-intelligence service and are expected to be wrapped by
//! [`crate::cache::AsCache`], which memoizes every outcome.
//!
//! Lookup failures are data, not errors: every call produces an
//! [`AsResolution`], and the failure variants are cached just like successes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Types
// =============================================================================

/// Stored text for an address that is not a dotted-quad IPv4.
pub const INVALID_ADDRESS_TEXT: &str = "Invalid IPv4 address.";

/// Stored text for an address the service knows nothing about.
pub const NOT_FOUND_TEXT: &str = "AS information not found.";

/// Prefix of the stored text for transport failures.
///
/// The wording matches cache files written by earlier tooling, so existing
/// caches keep working.
pub const TRANSPORT_ERROR_PREFIX: &str = "cURL Error: ";

/// Outcome of resolving one IPv4 address
///
/// Serializes to (and from) a single string so the cache file stays a flat
/// `{ "ip": "text" }` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AsResolution {
    /// AS organization, e.g. `AS24940 Hetzner Online GmbH`
    Org(String),
    /// The input was not a valid IPv4 address
    InvalidAddress,
    /// The service answered but returned no AS organization
    NotFound,
    /// The service could not be reached
    TransportError(String),
}

impl AsResolution {
    /// Whether this outcome names an AS organization.
    pub fn is_valid(&self) -> bool {
        matches!(self, AsResolution::Org(_))
    }

    /// The AS organization, if resolved.
    pub fn org(&self) -> Option<&str> {
        match self {
            AsResolution::Org(org) => Some(org.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for AsResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsResolution::Org(org) => write!(f, "{}", org),
            AsResolution::InvalidAddress => write!(f, "{}", INVALID_ADDRESS_TEXT),
            AsResolution::NotFound => write!(f, "{}", NOT_FOUND_TEXT),
            AsResolution::TransportError(msg) => write!(f, "{}{}", TRANSPORT_ERROR_PREFIX, msg),
        }
    }
}

impl From<String> for AsResolution {
    fn from(text: String) -> Self {
        if text == INVALID_ADDRESS_TEXT {
            return AsResolution::InvalidAddress;
        }
        if text == NOT_FOUND_TEXT {
            return AsResolution::NotFound;
        }
        match text.strip_prefix(TRANSPORT_ERROR_PREFIX.trim_end()) {
            Some(msg) => AsResolution::TransportError(msg.trim_start().to_string()),
            None => AsResolution::Org(text),
        }
    }
}

impl From<AsResolution> for String {
    fn from(resolution: AsResolution) -> Self {
        match resolution {
            AsResolution::Org(org) => org,
            other => other.to_string(),
        }
    }
}

/// An external source of AS information
///
/// Implementations perform one lookup per call and must not cache; caching is
/// the job of [`crate::cache::AsCache`].
pub trait AsLookup {
    fn lookup(&self, ip: Ipv4Addr) -> AsResolution;
}

impl<T: AsLookup + ?Sized> AsLookup for &T {
    fn lookup(&self, ip: Ipv4Addr) -> AsResolution {
        (**self).lookup(ip)
    }
}

// =============================================================================
// Lens
// =============================================================================

/// Default lookup endpoint. `{ip}` and `{token}` are substituted per call.
pub const DEFAULT_AS_LOOKUP_URL: &str = "https://ipinfo.io/{ip}/json?token={token}";

#[derive(Debug, Deserialize)]
struct IpinfoResponse {
    org: Option<String>,
}

/// AS lookup against an ipinfo-style JSON endpoint
///
/// # Example
///
/// ```rust,ignore
/// use relayfam::lens::asn::{AsLookup, IpinfoLookup};
///
/// let lookup = IpinfoLookup::new("my-token");
/// let result = lookup.lookup("1.1.1.1".parse().unwrap());
/// println!("{}", result);
/// ```
pub struct IpinfoLookup {
    agent: ureq::Agent,
    url_template: String,
    token: String,
}

impl IpinfoLookup {
    /// Create a lookup client for the default endpoint
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_url(DEFAULT_AS_LOOKUP_URL, token, None)
    }

    /// Create a lookup client for a custom endpoint template
    ///
    /// A `timeout` of `None` leaves the transport default in place.
    pub fn with_url(
        url_template: impl Into<String>,
        token: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .build()
            .into();
        Self {
            agent,
            url_template: url_template.into(),
            token: token.into(),
        }
    }

    /// Build the request URL for one address
    pub fn request_url(&self, ip: Ipv4Addr) -> String {
        self.url_template
            .replace("{ip}", &ip.to_string())
            .replace("{token}", &self.token)
    }
}

impl AsLookup for IpinfoLookup {
    fn lookup(&self, ip: Ipv4Addr) -> AsResolution {
        let url = self.request_url(ip);
        debug!("looking up AS information for {}", ip);

        let mut resp = match self.agent.get(&url).call() {
            Ok(resp) => resp,
            // the service answered, just not with AS data
            Err(ureq::Error::StatusCode(code)) => {
                debug!("lookup for {} returned HTTP {}", ip, code);
                return AsResolution::NotFound;
            }
            Err(e) => return AsResolution::TransportError(e.to_string()),
        };

        match resp.body_mut().read_json::<IpinfoResponse>() {
            Ok(IpinfoResponse { org: Some(org) }) => AsResolution::Org(org),
            Ok(_) => AsResolution::NotFound,
            Err(e) => {
                debug!("unreadable lookup response for {}: {}", ip, e);
                AsResolution::NotFound
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
