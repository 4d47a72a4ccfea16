use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use seaward_app::{Harness, HarnessConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "seaward",
    version,
    about = "Run the Seaward fishing harness and print a JSON report"
)]
struct Cli {
    /// JSON harness configuration; defaults are used when omitted.
    #[arg(short, long, env = "SEAWARD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the number of simulated days.
    #[arg(long)]
    days: Option<u32>,

    /// Override the RNG seed.
    #[arg(long, env = "SEAWARD_SEED")]
    seed: Option<u64>,

    /// Override the number of fishers.
    #[arg(long)]
    fishers: Option<usize>,

    /// Write the report here instead of stdout.
    #[arg(short, long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(
        days = config.world.days,
        seed = ?config.world.rng_seed,
        fishers = config.world.fisher_count,
        "starting Seaward harness"
    );

    let mut harness = Harness::new(config)?;
    let report = harness.run()?;
    let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
    match &cli.report {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            HarnessConfig::from_json(&text)?
        }
        None => HarnessConfig::default(),
    };
    if let Some(days) = cli.days {
        config.world.days = days;
    }
    if let Some(seed) = cli.seed {
        config.world.rng_seed = Some(seed);
    }
    if let Some(fishers) = cli.fishers {
        config.world.fisher_count = fishers;
    }
    Ok(config)
}
