//! FxLab CLI — run backtests and generate synthetic tick data.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config file
//! - `synth` — write a seeded synthetic tick stream to standard output
//!
//! Diagnostics go to stderr via tracing; the deterministic CSV log stays on
//! stdout.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fxlab_runner::config::RunConfig;
use fxlab_runner::synthetic::{generate_csv, SyntheticConfig};

#[derive(Parser)]
#[command(name = "fxlab", about = "Deterministic FX backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a backtest from a TOML config file.
    Run {
        /// Path to the run configuration.
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Generate a deterministic synthetic tick stream on stdout.
    Synth {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Ticks per symbol.
        #[arg(long, default_value_t = 1000)]
        ticks: usize,
        /// Symbols to quote.
        #[arg(long, value_delimiter = ',', default_value = "EUR/USD,USD/JPY")]
        symbols: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Run { config } => {
            let config = RunConfig::from_file(&config)?;
            let summary = fxlab_runner::run(&config)?;
            tracing::info!(
                fingerprint = %summary.fingerprint,
                completed_at = %summary.completed_at,
                "backtest finished"
            );
        }
        Command::Synth {
            seed,
            ticks,
            symbols,
        } => {
            let csv = generate_csv(&SyntheticConfig {
                seed,
                ticks_per_symbol: ticks,
                symbols,
                ..SyntheticConfig::default()
            });
            std::io::stdout().write_all(csv.as_bytes())?;
        }
    }
    Ok(())
}
