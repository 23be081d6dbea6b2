use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::lens::asn::{IpinfoLookup, DEFAULT_AS_LOOKUP_URL};
use crate::lens::utils::OutputFormat;

pub struct RelayfamConfig {
    /// Path to the directory to hold relayfam's data
    pub data_dir: String,

    /// AS lookup cache file (default: `<data_dir>/as_cache.json`)
    pub as_cache_file: String,

    /// Token for the AS lookup service
    pub ipinfo_token: Option<String>,

    /// Lookup URL template with `{ip}` and `{token}` placeholders
    pub as_lookup_url: String,

    /// Per-request timeout in seconds, 0 for the transport default
    pub as_lookup_timeout_secs: u64,

    /// Output format used when `--format` is not given
    pub output_format: OutputFormat,
}

const EMPTY_CONFIG: &str = r#"### relayfam configuration file

### directory for cached data used by relayfam
# data_dir = "~/.relayfam"

### AS lookup cache file, defaults to <data_dir>/as_cache.json
# as_cache_file = "~/.relayfam/as_cache.json"

### AS lookup service (the token can also come from RELAYFAM_IPINFO_TOKEN or IPINFO_TOKEN)
# ipinfo_token = ""
# as_lookup_url = "https://ipinfo.io/{ip}/json?token={token}"
# as_lookup_timeout_secs = 10

### default output format: table, markdown, json, json-pretty or psv
# output_format = "table"
"#;

const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

impl Default for RelayfamConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        let data_dir = format!("{}/.relayfam", home_dir);

        Self {
            as_cache_file: format!("{}/as_cache.json", data_dir),
            data_dir,
            ipinfo_token: None,
            as_lookup_url: DEFAULT_AS_LOOKUP_URL.to_string(),
            as_lookup_timeout_secs: DEFAULT_LOOKUP_TIMEOUT_SECS,
            output_format: OutputFormat::default(),
        }
    }
}

impl RelayfamConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<RelayfamConfig> {
        // a .env file may hold the lookup token
        if let Some(msg) = env_file_warning(dotenvy::dotenv()) {
            warn!("{}", msg);
        }

        let mut builder = Config::builder();

        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();
        let relayfam_dir = format!("{}/.relayfam", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(relayfam_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create relayfam directory: {}", e))?;
                let p = format!("{}/relayfam.toml", relayfam_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of RELAYFAM)
        // E.g., `RELAYFAM_DATA_DIR=/tmp/relayfam relayfam summary ...` sets the data directory
        builder = builder.add_source(config::Environment::with_prefix("RELAYFAM"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_settings(&config, &relayfam_dir, std::env::var("IPINFO_TOKEN").ok())
    }

    /// Build a configuration from flat key/value settings
    fn from_settings(
        config: &HashMap<String, String>,
        default_data_dir: &str,
        token_fallback: Option<String>,
    ) -> Result<RelayfamConfig> {
        let data_dir = config
            .get("data_dir")
            .map(|p| expand_home(p))
            .unwrap_or_else(|| default_data_dir.to_string());
        std::fs::create_dir_all(data_dir.as_str())
            .map_err(|e| anyhow!("Unable to create data directory {}: {}", data_dir, e))?;

        let as_cache_file = config
            .get("as_cache_file")
            .map(|p| expand_home(p))
            .unwrap_or_else(|| format!("{}/as_cache.json", data_dir.trim_end_matches('/')));

        let ipinfo_token = config
            .get("ipinfo_token")
            .cloned()
            .or(token_fallback)
            .filter(|t| !t.trim().is_empty());

        let as_lookup_url = config
            .get("as_lookup_url")
            .cloned()
            .unwrap_or_else(|| DEFAULT_AS_LOOKUP_URL.to_string());

        let as_lookup_timeout_secs = config
            .get("as_lookup_timeout_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LOOKUP_TIMEOUT_SECS);

        let output_format = match config.get("output_format") {
            Some(s) => s.parse::<OutputFormat>().unwrap_or_else(|e| {
                warn!("{}, using {}", e, OutputFormat::default());
                OutputFormat::default()
            }),
            None => OutputFormat::default(),
        };

        Ok(RelayfamConfig {
            data_dir,
            as_cache_file,
            ipinfo_token,
            as_lookup_url,
            as_lookup_timeout_secs,
            output_format,
        })
    }

    /// Get lookup timeout as Duration, `None` for the transport default
    pub fn as_lookup_timeout(&self) -> Option<Duration> {
        match self.as_lookup_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Build the AS lookup client described by this configuration
    pub fn as_lookup(&self) -> IpinfoLookup {
        IpinfoLookup::with_url(
            self.as_lookup_url.as_str(),
            self.ipinfo_token.clone().unwrap_or_default(),
            self.as_lookup_timeout(),
        )
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let token = match &self.ipinfo_token {
            Some(t) => mask_token(t),
            None => "(not set)".to_string(),
        };
        let timeout = match self.as_lookup_timeout_secs {
            0 => "transport default".to_string(),
            secs => format!("{} seconds", secs),
        };

        let mut lines = vec![
            format!("Data Directory:     {}", self.data_dir),
            format!("AS Cache File:      {}", self.as_cache_file),
            format!("AS Lookup URL:      {}", self.as_lookup_url),
            format!("AS Lookup Token:    {}", token),
            format!("AS Lookup Timeout:  {}", timeout),
            format!("Output Format:      {}", self.output_format),
        ];

        if let Ok(meta) = std::fs::metadata(&self.as_cache_file) {
            lines.push(format!("AS Cache Size:      {}", format_size(meta.len())));
        }

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.relayfam/relayfam.toml", home_dir)
    }
}

/// Warning for a `.env` file that exists but could not be loaded
fn env_file_warning<T>(result: dotenvy::Result<T>) -> Option<String> {
    match result {
        Err(e) if !e.not_found() => Some(format!("Failed to load .env file: {}", e)),
        _ => None,
    }
}

/// Replace a leading `~` with the home directory
fn expand_home(path: &str) -> String {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{}****", visible)
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
