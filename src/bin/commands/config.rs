use clap::Args;
use relayfam::lens::utils::OutputFormat;
use relayfam::RelayfamConfig;
use serde::Serialize;
use std::path::Path;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Also count the entries of the AS cache file
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    as_lookup_url: String,
    as_lookup_token_set: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    as_lookup_timeout_secs: Option<u64>,
    output_format: String,
    as_cache: AsCacheInfo,
}

#[derive(Debug, Serialize)]
struct AsCacheInfo {
    path: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<usize>,
}

pub fn run(config: &RelayfamConfig, args: ConfigArgs, output_format: OutputFormat) {
    let ConfigArgs { verbose } = args;

    let cache_path = Path::new(&config.as_cache_file);
    let size_bytes = std::fs::metadata(cache_path).ok().map(|m| m.len());
    let entries = match verbose {
        true => count_cache_entries(cache_path),
        false => None,
    };

    let info = ConfigInfo {
        config_file: RelayfamConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        as_lookup_url: config.as_lookup_url.clone(),
        as_lookup_token_set: config.ipinfo_token.is_some(),
        as_lookup_timeout_secs: config.as_lookup_timeout().map(|d| d.as_secs()),
        output_format: config.output_format.to_string(),
        as_cache: AsCacheInfo {
            path: config.as_cache_file.clone(),
            exists: cache_path.exists(),
            size_bytes,
            entries,
        },
    };

    if output_format.is_json() {
        let output = match output_format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&info),
            _ => serde_json::to_string(&info),
        };
        match output {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("ERROR: {e}"),
        }
        return;
    }

    println!("Config File:        {}", info.config_file);
    println!("{}", config.summary());
    if let Some(n) = info.as_cache.entries {
        println!("AS Cache Entries:   {}", n);
    }
    if !info.as_cache.exists {
        println!("AS Cache Status:    not created yet");
    }
}

fn count_cache_entries(path: &Path) -> Option<usize> {
    let content = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    value.as_object().map(|o| o.len())
}
