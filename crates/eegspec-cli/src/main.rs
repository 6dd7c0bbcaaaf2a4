//! eegspec CLI - spectral analysis of EEG recordings from the command line.
//!
//! Results are printed as JSON on stdout; logs go to stderr.

mod commands;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eegspec")]
#[command(author, version, about = "EEG spectral analysis", long_about = None)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show channels, sample rate, duration and annotations of a recording
    Info(commands::info::InfoArgs),

    /// Run one analysis on a recording
    Analyze(commands::analyze::AnalyzeArgs),

    /// Overlay PSDs of channels from one or more recordings
    Compare(commands::compare::CompareArgs),

    /// Analyse stimulation periods listed in an annotation table
    Epochs(commands::epochs::EpochsArgs),

    /// Write a synthetic EEG recording
    Generate(commands::generate::GenerateArgs),

    /// List, show and copy analysis profiles
    Profiles(commands::profiles::ProfilesArgs),
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Analyze(args) => commands::analyze::run(args),
        Commands::Compare(args) => commands::compare::run(args),
        Commands::Epochs(args) => commands::epochs::run(args),
        Commands::Generate(args) => commands::generate::run(args),
        Commands::Profiles(args) => commands::profiles::run(args),
    }
}
