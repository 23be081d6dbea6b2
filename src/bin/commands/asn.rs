use clap::Args;
use relayfam::lens::utils::{psv_field, OutputFormat};
use relayfam::RelayfamConfig;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::open_as_cache;

/// Arguments for the Asn command
#[derive(Args)]
pub struct AsnArgs {
    /// IPv4 addresses to resolve
    #[clap(name = "IP", required = true)]
    pub ips: Vec<String>,

    /// Do not write new lookups to the AS cache file
    #[clap(long)]
    pub no_cache_write: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct AsnRow {
    ip: String,
    valid: bool,
    #[tabled(rename = "as")]
    #[serde(rename = "as")]
    org: String,
}

pub fn run(config: &RelayfamConfig, args: AsnArgs, output_format: OutputFormat) {
    let AsnArgs {
        ips,
        no_cache_write,
    } = args;

    let mut cache = open_as_cache(config, no_cache_write);
    let rows: Vec<AsnRow> = ips
        .into_iter()
        .map(|ip| {
            let resolution = cache.resolve(ip.as_str());
            AsnRow {
                ip,
                valid: resolution.is_valid(),
                org: resolution.to_string(),
            }
        })
        .collect();

    match output_format {
        OutputFormat::Json => match serde_json::to_string(&rows) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("ERROR: {e}"),
        },
        OutputFormat::JsonPretty => match serde_json::to_string_pretty(&rows) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("ERROR: {e}"),
        },
        OutputFormat::Psv => {
            println!("ip|valid|as");
            for row in &rows {
                println!("{}|{}|{}", row.ip, row.valid, psv_field(&row.org));
            }
        }
        OutputFormat::Table => println!("{}", Table::new(rows).with(Style::rounded())),
        OutputFormat::Markdown => println!("{}", Table::new(rows).with(Style::markdown())),
    }
}
