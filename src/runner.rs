//! Headless scenario driver.
//!
//! Builds a [`Space`] from a [`ScenarioConfig`], applies scheduled boluses,
//! steps it to the configured duration and samples concentrations into a
//! [`Trace`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use substratum_core::config::BolusConfig;
use substratum_core::{NodeHandle, ScenarioConfig, Space};

/// Tolerance, in units of the step, for deciding a scheduled time was reached.
const TIME_EPS: f64 = 1e-9;

/// Sampled time series of one run. Column 0 is always `time`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Trace {
    pub fingerprint: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub steps: u64,
    pub warnings: u64,
}

impl Trace {
    /// Values of one named column, in sample order.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }
}

enum Series {
    Mean(String),
    Mass(String),
    Node { handle: NodeHandle, substrate: String },
}

struct Runner<'a> {
    config: &'a ScenarioConfig,
    space: Space,
    handles: Vec<NodeHandle>,
    series: Vec<Series>,
    columns: Vec<String>,
}

impl<'a> Runner<'a> {
    fn new(config: &'a ScenarioConfig) -> anyhow::Result<Self> {
        let (space, handles) = config.build_space()?;

        let mut series = Vec::new();
        let mut columns = vec!["time".to_string()];
        for substrate in &config.substrates {
            columns.push(format!("{}.mean", substrate.name));
            series.push(Series::Mean(substrate.name.clone()));
            columns.push(format!("{}.mass", substrate.name));
            series.push(Series::Mass(substrate.name.clone()));
        }
        for (index, (node, &handle)) in config.nodes.iter().zip(&handles).enumerate() {
            let label = node.label_or(index);
            for substrate in node.substrates.keys() {
                columns.push(format!("{label}.{substrate}"));
                series.push(Series::Node {
                    handle,
                    substrate: substrate.clone(),
                });
            }
        }

        Ok(Self {
            config,
            space,
            handles,
            series,
            columns,
        })
    }

    fn sample(&self, time: f64) -> anyhow::Result<Vec<f64>> {
        let mut row = Vec::with_capacity(self.series.len() + 1);
        row.push(time);
        for entry in &self.series {
            row.push(match entry {
                Series::Mean(name) => self.space.get_concentration(name, None)?,
                Series::Mass(name) => self.space.field(name)?.total_mass(),
                Series::Node { handle, substrate } => {
                    self.space.node_concentration(*handle, substrate)?
                }
            });
        }
        Ok(row)
    }

    fn apply_bolus(&mut self, bolus: &BolusConfig) -> anyhow::Result<()> {
        match (bolus.node, &bolus.position) {
            (Some(index), _) => {
                let handle = *self
                    .handles
                    .get(index)
                    .with_context(|| format!("bolus refers to missing node {index}"))?;
                self.space
                    .set_node_concentration(handle, &bolus.substrate, bolus.value)?;
            }
            (None, Some(position)) => {
                self.space
                    .set_level_at(&bolus.substrate, position, bolus.value)?;
            }
            (None, None) => self.space.set_level(&bolus.substrate, bolus.value)?,
        }
        tracing::info!(
            substrate = %bolus.substrate,
            value = bolus.value,
            at_s = bolus.at.as_seconds(),
            "Bolus applied"
        );
        Ok(())
    }

    fn run(mut self) -> anyhow::Result<Trace> {
        let config = self.config;
        let run = &config.run;
        let dt = run.dt.as_seconds();
        let duration = run.duration.as_seconds();
        let sample_every = run.sample_every.as_seconds();
        let eps = TIME_EPS * dt;

        let mut boluses: Vec<&BolusConfig> = run.boluses.iter().collect();
        boluses.sort_by(|a, b| a.at.as_seconds().total_cmp(&b.at.as_seconds()));
        let mut pending = boluses.into_iter().peekable();

        let mut rows = Vec::new();
        let mut time = 0.0;
        let mut next_sample = 0.0;
        let mut steps = 0u64;

        loop {
            let finished = time + eps >= duration;
            // Time left over from a substrate interval that does not divide
            // the duration is stepped before the last sample.
            if finished && self.space.flush().context("final step failed")?.is_some() {
                steps += 1;
            }
            while let Some(bolus) = pending.next_if(|b| b.at.as_seconds() <= time + eps) {
                self.apply_bolus(bolus)?;
            }
            if time + eps >= next_sample {
                rows.push(self.sample(time)?);
                next_sample += sample_every;
            }
            if finished {
                break;
            }

            let h = dt.min(duration - time);
            let stepped = self
                .space
                .advance(h)
                .with_context(|| format!("step at t = {time} s failed"))?;
            if stepped.is_some() {
                steps += 1;
            }
            time = if duration - (time + h) <= eps {
                duration
            } else {
                time + h
            };
        }

        let warnings = self.space.metrics().warning_total();
        tracing::info!(
            steps,
            samples = rows.len(),
            warnings,
            simulated_s = time,
            "Scenario finished"
        );
        Ok(Trace {
            fingerprint: config.fingerprint(),
            columns: self.columns,
            rows,
            steps,
            warnings,
        })
    }
}

/// Runs a validated scenario to completion.
pub fn run_scenario(config: &ScenarioConfig) -> anyhow::Result<Trace> {
    Runner::new(config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECAY: &str = r#"
        [space]
        geometry = { kind = "homogeneous", volume = 2.0 }

        [[substrates]]
        name = "x"
        decay_coefficient = 0.1
        initial_level = 1.0

        [run]
        duration = { value = 10 }
        dt = { value = 1 }
        sample_every = { value = 5 }
    "#;

    #[test]
    fn test_samples_at_interval() {
        let config = ScenarioConfig::from_toml(DECAY).unwrap();
        let trace = run_scenario(&config).unwrap();
        assert_eq!(trace.columns, vec!["time", "x.mean", "x.mass"]);
        assert_eq!(trace.column("time").unwrap(), vec![0.0, 5.0, 10.0]);
        assert_eq!(trace.steps, 10);
        let last = trace.column("x.mean").unwrap()[2];
        assert!((last - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_bolus_applied_mid_run() {
        let mut config = ScenarioConfig::from_toml(DECAY).unwrap();
        config.substrates[0].decay_coefficient = 0.0;
        config.run.boluses.push(BolusConfig {
            at: substratum_data::Interval::new(5.0, substratum_data::TimeUnit::Sec),
            substrate: "x".into(),
            value: 3.0,
            node: None,
            position: None,
        });
        let trace = run_scenario(&config).unwrap();
        assert_eq!(trace.column("x.mean").unwrap(), vec![1.0, 3.0, 3.0]);
    }

    #[test]
    fn test_interval_remainder_is_stepped_before_last_sample() {
        let mut config = ScenarioConfig::from_toml(DECAY).unwrap();
        config.space.substrate_interval =
            Some(substratum_data::Interval::new(4.0, substratum_data::TimeUnit::Sec));
        let trace = run_scenario(&config).unwrap();
        // Updates at 4 s and 8 s, then the 2 s remainder at the end.
        assert_eq!(trace.steps, 3);
        let mean = trace.column("x.mean").unwrap();
        assert_eq!(mean[0], 1.0);
        assert!((mean[1] - (-0.4f64).exp()).abs() < 1e-12);
        assert!((mean[2] - (-1.0f64).exp()).abs() < 1e-12);
    }
}
