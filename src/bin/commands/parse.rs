use std::path::PathBuf;

use clap::Args;
use relayfam::lens::descriptor::{DescriptorLens, RelayRecord, RelayRecordRow};
use relayfam::lens::utils::{psv_field, OutputFormat};
use tabled::settings::Style;
use tabled::Table;

/// Arguments for the Parse command
#[derive(Args)]
pub struct ParseArgs {
    /// File path to a descriptor file, local or remote.
    #[clap(name = "FILE")]
    pub file_path: PathBuf,
}

pub fn run(args: ParseArgs, output_format: OutputFormat) {
    let ParseArgs { file_path } = args;

    let records = match DescriptorLens::new().read_file(&file_path) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    println!("{}", format_records(&records, output_format));
}

fn format_records(records: &[RelayRecord], output_format: OutputFormat) -> String {
    match output_format {
        OutputFormat::Json => serde_json::to_string(records).unwrap_or_default(),
        OutputFormat::JsonPretty => serde_json::to_string_pretty(records).unwrap_or_default(),
        OutputFormat::Psv => {
            let mut lines = vec![
                "nickname|ipv4|or_port|uptime|bandwidth_observed|exit|fingerprint|contact"
                    .to_string(),
            ];
            for row in records.iter().map(RelayRecordRow::from) {
                lines.push(format!(
                    "{}|{}|{}|{}|{}|{}|{}|{}",
                    psv_field(&row.nickname),
                    row.ipv4,
                    row.or_port,
                    row.uptime,
                    row.bandwidth_observed,
                    row.exit,
                    psv_field(&row.fingerprint),
                    psv_field(&row.contact),
                ));
            }
            lines.join("\n")
        }
        OutputFormat::Table | OutputFormat::Markdown => {
            let rows: Vec<RelayRecordRow> = records.iter().map(Into::into).collect();
            let mut table = Table::new(rows);
            match output_format {
                OutputFormat::Markdown => table.with(Style::markdown()),
                _ => table.with(Style::rounded()),
            };
            table.to_string()
        }
    }
}
