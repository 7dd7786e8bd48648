//! Strata CLI library - scenario loading and execution
//!
//! The `strata` binary is a thin shell over these modules so the scenario
//! handling can be tested without spawning processes.

pub mod runner;
pub mod scenario;

use std::path::Path;

use anyhow::Result;

pub use runner::{NamedEvent, ScenarioRunner, DEFAULT_PARTITION};
pub use scenario::{LoggingConfig, MatchDecl, PassDecl, Scenario, ScenarioError, ScenarioFormat};

/// Load a scenario and render its assembly plan
pub fn plan_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let scenario = Scenario::load(path)?;
    let runner = ScenarioRunner::new(&scenario)?;
    Ok(runner.plan())
}

/// Run an already loaded scenario, returning the rows of all passes rendered
/// one per line
pub fn run_scenario(scenario: &Scenario) -> Result<Vec<String>> {
    let mut runner = ScenarioRunner::new(scenario)?;
    let results = runner.run_all(scenario)?;
    Ok(results
        .iter()
        .flat_map(|rows| rows.iter().map(|row| row.to_string()))
        .collect())
}
