//! Headless runner for substrate scenarios.
//!
//! The engine itself lives in `substratum_core`; this crate loads scenario
//! files, drives a space through time and writes sampled traces.

/// JSON and CSV trace writers
pub mod output;
/// Scenario driver
pub mod runner;

pub use output::{write_trace, Format};
pub use runner::{run_scenario, Trace};

use anyhow::Context;
use std::path::Path;
use substratum_core::ScenarioConfig;

/// Reads and validates a scenario file.
pub fn load_scenario(path: &Path) -> anyhow::Result<ScenarioConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    ScenarioConfig::from_toml(&content)
        .with_context(|| format!("invalid scenario {}", path.display()))
}
