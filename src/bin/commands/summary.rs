use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use relayfam::lens::descriptor::{expand_inputs, snapshot_time, DescriptorLens};
use relayfam::lens::summary::{SummaryLens, SummaryProgress, SummaryProgressCallback};
use relayfam::lens::utils::OutputFormat;
use relayfam::RelayfamConfig;
use tracing::info;

use super::open_as_cache;

/// Arguments for the Summary command
#[derive(Args)]
pub struct SummaryArgs {
    /// Descriptor files or directories of snapshot files.
    #[clap(name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Resolve addresses without writing new entries to the AS cache file
    #[clap(long)]
    pub no_cache_write: bool,

    /// Only show families with at least this many relays
    #[clap(long, default_value_t = 1)]
    pub min_relays: usize,

    /// Hide the progress bar
    #[clap(long)]
    pub no_progress: bool,
}

pub fn run(config: &RelayfamConfig, args: SummaryArgs, output_format: OutputFormat) {
    let SummaryArgs {
        paths,
        no_cache_write,
        min_relays,
        no_progress,
    } = args;

    let files = match expand_inputs(&paths) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };
    if files.is_empty() {
        eprintln!("ERROR: no descriptor files found");
        std::process::exit(1);
    }
    info!("reading {} descriptor files", files.len());

    let records = DescriptorLens::new().read_files(&files);
    if records.is_empty() {
        eprintln!("WARNING: no relay records parsed from {} files", files.len());
    }

    let mut cache = open_as_cache(config, no_cache_write);

    let progress_bar = match no_progress {
        true => None,
        false => Some(new_progress_bar()),
    };
    let callback = progress_bar.map(|pb| -> SummaryProgressCallback {
        Arc::new(move |progress: SummaryProgress| match progress {
            SummaryProgress::Started { total_families } => {
                pb.set_length(total_families as u64);
            }
            SummaryProgress::FamilyDone { completed, .. } => {
                pb.set_position(completed as u64);
            }
            SummaryProgress::Completed {
                total_families,
                new_lookups,
            } => {
                pb.finish_and_clear();
                info!(
                    "{} families summarized, {} new AS lookups",
                    total_families, new_lookups
                );
            }
        })
    });

    let lens = SummaryLens::new();
    let mut report = lens.build_report(&records, &mut cache, callback);

    report.snapshot = files
        .iter()
        .filter_map(snapshot_time)
        .max()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());
    report.families.retain(|f| f.relay_count >= min_relays);

    println!("{}", lens.format_report(&report, &output_format));
}

fn new_progress_bar() -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new(0);
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    if let Ok(sty) = indicatif::ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} families {msg}",
    ) {
        pb.set_style(sty.progress_chars("##-"));
    }
    pb
}
