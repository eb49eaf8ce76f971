//! CLI for profwire
//!
//! Commands:
//! - wrap: build a request from a payload file and wrap it in a profiling envelope
//! - inspect: unwrap an envelope file and print its metadata

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod output;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "profwire")]
#[command(about = "profwire - profiling envelopes for RPC requests", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML config file (worker id, profiler settings)
    #[arg(short, long, global = true, env = "PROFWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap a request payload in a profiling envelope
    Wrap(commands::wrap::WrapArgs),

    /// Print the metadata and wrapped request of an envelope
    Inspect(commands::inspect::InspectArgs),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Wrap(args) => {
            let config = CliConfig::load(cli.config.as_deref())?;
            commands::wrap::run(args, &config)
        }
        Commands::Inspect(args) => commands::inspect::run(args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
