#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::{Parser, Subcommand};
use relayfam::lens::utils::OutputFormat;
use relayfam::RelayfamConfig;
use tracing::Level;

mod commands;

use commands::asn::AsnArgs;
use commands::config::ConfigArgs;
use commands::parse::ParseArgs;
use commands::summary::SummaryArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.relayfam/relayfam.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format, defaults to `output_format` from the config file
    #[clap(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize relay families from descriptor files or snapshot directories.
    Summary(SummaryArgs),

    /// Parse a single descriptor file and print its relay records.
    Parse(ParseArgs),

    /// Resolve IPv4 addresses to AS organizations through the cache.
    Asn(AsnArgs),

    /// Show relayfam configuration and cache status.
    Config(ConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.debug {
        true => Level::DEBUG,
        false => Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match RelayfamConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let format: OutputFormat = cli.format.unwrap_or(config.output_format);

    match cli.command {
        Commands::Summary(args) => commands::summary::run(&config, args, format),
        Commands::Parse(args) => commands::parse::run(args, format),
        Commands::Asn(args) => commands::asn::run(&config, args, format),
        Commands::Config(args) => commands::config::run(&config, args, format),
    }
}
