//! Scenario configuration.
//!
//! Strongly-typed structures that map to a scenario TOML file. A scenario
//! describes one space, the substrates registered on it, the nodes bound to
//! them and how long to run.
//!
//! ## Example scenario
//!
//! ```toml
//! [space]
//! geometry = { kind = "homogeneous", volume = 2.7e7 }
//!
//! [[substrates]]
//! name = "drug"
//! diffusion_coefficient = 0.0
//! decay_coefficient = 0.0
//!
//! [[nodes]]
//! label = "depot"
//! volume = 2.7e6
//! substrates.drug = { type = "flux", passive_rate = 1e-3 }
//!
//! [run]
//! duration = { value = 5, unit = "day" }
//! dt = { value = 30, unit = "sec" }
//! sample_every = { value = 1, unit = "hour" }
//!
//! [[run.boluses]]
//! at = { value = 0 }
//! substrate = "drug"
//! node = 0
//! value = 1.0e6
//! ```

use crate::field::SubstrateParams;
use crate::node::{Node, NodeHandle};
use crate::space::Space;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use substratum_data::{
    BindingMode, Boundary, DecayKinetics, ExchangeParams, Geometry, Interval, TimeUnit,
};

/// Geometry and boundary of the simulated space.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SpaceConfig {
    pub geometry: Geometry,
    pub boundary: Boundary,
    /// Minimum simulated time between substrate updates. Absent means every step.
    pub substrate_interval: Option<Interval>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubstrateConfig {
    pub name: String,
    #[serde(default)]
    pub diffusion_coefficient: f64,
    #[serde(default)]
    pub decay_coefficient: f64,
    #[serde(default)]
    pub decay: DecayKinetics,
    /// Uniform concentration the field starts at.
    #[serde(default)]
    pub initial_level: f64,
}

impl SubstrateConfig {
    #[must_use]
    pub fn params(&self) -> SubstrateParams {
        SubstrateParams::new(self.diffusion_coefficient, self.decay_coefficient, self.decay)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeConfig {
    #[serde(default)]
    pub label: Option<String>,
    pub volume: f64,
    #[serde(default)]
    pub position: Option<Vec<usize>>,
    #[serde(default)]
    pub mode: BindingMode,
    /// Exchange parameters per substrate name. The node is bound to each.
    pub substrates: BTreeMap<String, ExchangeParams>,
}

impl NodeConfig {
    #[must_use]
    pub fn label_or(&self, index: usize) -> String {
        self.label.clone().unwrap_or_else(|| format!("node{index}"))
    }

    #[must_use]
    pub fn to_node(&self) -> Node {
        let node = Node::new(self.volume);
        let node = match &self.position {
            Some(position) => node.at(position.clone()),
            None => node,
        };
        self.substrates
            .iter()
            .fold(node, |node, (name, params)| node.with_substrate(name.clone(), *params))
    }
}

/// An instantaneous override applied once simulated time reaches `at`.
///
/// With `node` set the node's internal pool (or setpoint) is replaced; with
/// `position` set one lattice cell is; otherwise the whole field is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BolusConfig {
    #[serde(default)]
    pub at: Interval,
    pub substrate: String,
    pub value: f64,
    #[serde(default)]
    pub node: Option<usize>,
    #[serde(default)]
    pub position: Option<Vec<usize>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub duration: Interval,
    pub dt: Interval,
    pub sample_every: Interval,
    pub boluses: Vec<BolusConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration: Interval::new(1.0, TimeUnit::Day),
            dt: Interval::new(30.0, TimeUnit::Sec),
            sample_every: Interval::new(1.0, TimeUnit::Hour),
            boluses: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ScenarioConfig {
    pub space: SpaceConfig,
    pub substrates: Vec<SubstrateConfig>,
    pub nodes: Vec<NodeConfig>,
    pub run: RunConfig,
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl ScenarioConfig {
    /// Validates all scenario parameters.
    ///
    /// Returns `Ok(())` if all parameters are valid, or `Err` with a
    /// description of the first validation failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        // Space validation
        match &self.space.geometry {
            Geometry::Homogeneous { volume } => {
                anyhow::ensure!(positive(*volume), "Space volume must be positive");
            }
            Geometry::Lattice { shape, spacing } => {
                anyhow::ensure!(!shape.is_empty(), "Lattice needs at least one axis");
                anyhow::ensure!(
                    shape.iter().all(|&n| n > 0),
                    "Lattice extents must be positive"
                );
                anyhow::ensure!(positive(*spacing), "Lattice spacing must be positive");
            }
        }
        if let Boundary::Fixed { value } = self.space.boundary {
            anyhow::ensure!(
                non_negative(value),
                "Boundary concentration must be non-negative"
            );
        }
        if let Some(interval) = self.space.substrate_interval {
            anyhow::ensure!(
                non_negative(interval.as_seconds()),
                "Substrate interval must be non-negative"
            );
        }

        // Substrate validation
        let mut names = HashSet::new();
        for substrate in &self.substrates {
            anyhow::ensure!(
                !substrate.name.trim().is_empty(),
                "Substrate name must not be empty"
            );
            anyhow::ensure!(
                names.insert(substrate.name.as_str()),
                "Duplicate substrate '{}'",
                substrate.name
            );
            substrate.params().validate()?;
            anyhow::ensure!(
                non_negative(substrate.initial_level),
                "Initial level of '{}' must be non-negative",
                substrate.name
            );
        }

        // Node validation
        let dimensions = self.space.geometry.dimensions();
        for (index, node) in self.nodes.iter().enumerate() {
            anyhow::ensure!(
                positive(node.volume),
                "Node {index} volume must be positive"
            );
            anyhow::ensure!(
                !node.substrates.is_empty(),
                "Node {index} declares no substrates"
            );
            for name in node.substrates.keys() {
                anyhow::ensure!(
                    names.contains(name.as_str()),
                    "Node {index} refers to unknown substrate '{name}'"
                );
            }
            if dimensions > 0 {
                anyhow::ensure!(
                    node.position.as_ref().map(Vec::len) == Some(dimensions),
                    "Node {index} needs a {dimensions}-dimensional position"
                );
            }
        }

        // Run validation
        anyhow::ensure!(positive(self.run.dt.as_seconds()), "Time step must be positive");
        anyhow::ensure!(
            non_negative(self.run.duration.as_seconds()),
            "Duration must be non-negative"
        );
        anyhow::ensure!(
            positive(self.run.sample_every.as_seconds()),
            "Sample interval must be positive"
        );
        for bolus in &self.run.boluses {
            anyhow::ensure!(
                names.contains(bolus.substrate.as_str()),
                "Bolus refers to unknown substrate '{}'",
                bolus.substrate
            );
            anyhow::ensure!(non_negative(bolus.value), "Bolus value must be non-negative");
            anyhow::ensure!(
                non_negative(bolus.at.as_seconds()),
                "Bolus time must be non-negative"
            );
            if let Some(node) = bolus.node {
                anyhow::ensure!(
                    node < self.nodes.len(),
                    "Bolus refers to node {node}, only {} configured",
                    self.nodes.len()
                );
                anyhow::ensure!(
                    self.nodes[node].substrates.contains_key(&bolus.substrate),
                    "Bolus node {node} does not exchange '{}'",
                    bolus.substrate
                );
            }
        }

        Ok(())
    }

    /// Parses and validates a scenario.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Identifies the physical setup. Run length and sampling do not count.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.space).as_bytes());
        hasher.update(format!("{:?}", self.substrates).as_bytes());
        hasher.update(format!("{:?}", self.nodes).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Builds the space with every substrate registered and every node bound.
    ///
    /// Node handles are returned in configuration order.
    pub fn build_space(&self) -> anyhow::Result<(Space, Vec<NodeHandle>)> {
        self.validate()?;
        let interval = self
            .space
            .substrate_interval
            .map_or(0.0, |i| i.as_seconds());
        let mut space = Space::new(self.space.geometry.clone(), self.space.boundary)?
            .with_substrate_interval(interval);

        for substrate in &self.substrates {
            space.add_substrate_with(&substrate.name, substrate.params())?;
            if substrate.initial_level > 0.0 {
                space.set_level(&substrate.name, substrate.initial_level)?;
            }
        }

        let mut handles = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let handle = space.add_node(node.to_node());
            space.bind_declared(handle, node.mode)?;
            handles.push(handle);
        }

        tracing::info!(
            substrates = self.substrates.len(),
            nodes = handles.len(),
            fingerprint = %self.fingerprint(),
            "Space built"
        );
        Ok((space, handles))
    }
}
