use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use feederpower::prelude::*;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Distribution feeder study: load, query, plot and solve.
#[derive(Parser, Debug)]
#[command(name = "feederpower", version, about)]
struct Cli {
    /// TOML configuration; built-in IEEE 33 defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Every stage in order.
    Run {
        /// Empty the tables before loading.
        #[arg(long)]
        fresh: bool,
        /// Skip all chart output.
        #[arg(long)]
        no_plots: bool,
    },
    /// Load the CSV files into the database.
    Load {
        #[arg(long)]
        fresh: bool,
    },
    /// Run the SQL analysis batch.
    Report,
    /// Draw topology and load charts.
    Plot,
    /// Solve the base case and the load profile.
    Solve,
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli.verbose))
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let mut cfg = Config::load(cli.config.as_deref()).context("reading configuration")?;
    if let Commands::Run { no_plots: true, .. } = cli.command {
        cfg.plots.enabled = false;
    }
    info!(database = %cfg.paths.database.display(), "starting");

    let mut pipeline = Pipeline::open(cfg).context("opening database")?;
    let mut stdout = io::stdout().lock();
    match cli.command {
        Commands::Run { fresh, .. } => {
            pipeline.run_all(fresh, &mut stdout)?;
        }
        Commands::Load { fresh } => pipeline.load(fresh).context("loading csv files")?,
        Commands::Report => {
            pipeline.report(&mut stdout)?;
        }
        Commands::Plot => pipeline.plot().context("plotting")?,
        Commands::Solve => {
            pipeline.solve().context("power flow study")?;
        }
    }
    Ok(())
}
