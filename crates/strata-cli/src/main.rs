//! Strata CLI - inspect and run join-result assembly scenarios

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use strata_cli::{run_scenario, Scenario, ScenarioRunner};

#[derive(Parser)]
#[command(name = "strata")]
#[command(version)]
#[command(about = "Strata - join-result assembly for continuous queries", long_about = None)]
struct Cli {
    /// Log level, overriding the scenario's `logging.level`
    #[arg(long, global = true, env = "STRATA_LOG")]
    log_level: Option<Level>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the assembly plan of a scenario's join
    Plan {
        /// Path to the scenario file (YAML or TOML)
        file: PathBuf,
    },

    /// Run every pass of a scenario and print the assembled rows
    Run {
        /// Path to the scenario file (YAML or TOML)
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = match &cli.command {
        Commands::Plan { file } | Commands::Run { file } => file,
    };
    let scenario =
        Scenario::load(file).with_context(|| format!("loading {}", file.display()))?;

    let level = match cli.log_level {
        Some(level) => level,
        None => scenario
            .logging
            .level
            .parse::<Level>()
            .with_context(|| format!("invalid log level '{}'", scenario.logging.level))?,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Plan { .. } => {
            let runner = ScenarioRunner::new(&scenario)?;
            print!("{}", runner.plan());
        }
        Commands::Run { .. } => {
            for row in run_scenario(&scenario)? {
                println!("{}", row);
            }
        }
    }

    Ok(())
}
