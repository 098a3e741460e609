//! One named substrate's complete state and its per-step pipeline.
//!
//! `step(dt)` runs decay, then diffusion, then node exchange, always in that
//! order: bulk processes act on the field first and localized exchange then
//! corrects for sources and sinks. The new grid is built on a private copy
//! and swapped in only when every stage succeeded, so readers never observe
//! a half-finished step.

use crate::decay;
use crate::diffusion;
use crate::error::{Result, StepReport, SubstrateError};
use crate::grid::Grid;
use crate::node::{NodeHandle, NodeStore};
use crate::transport;
use serde::{Deserialize, Serialize};
use substratum_data::{BindingMode, Boundary, DecayKinetics, Geometry};

/// Physical parameters a substrate is registered with.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct SubstrateParams {
    pub diffusion_coefficient: f64,
    pub decay_coefficient: f64,
    #[serde(default)]
    pub decay: DecayKinetics,
}

impl SubstrateParams {
    #[must_use]
    pub fn new(diffusion_coefficient: f64, decay_coefficient: f64, decay: DecayKinetics) -> Self {
        Self {
            diffusion_coefficient,
            decay_coefficient,
            decay,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let coefficients = [
            ("diffusion coefficient", self.diffusion_coefficient),
            ("decay coefficient", self.decay_coefficient),
        ];
        for (label, value) in coefficients {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SubstrateError::configuration(format!(
                    "{label} must be non-negative, got {value}"
                )));
            }
        }
        if let DecayKinetics::MichaelisMenten { km } = self.decay {
            if !(km.is_finite() && km >= 0.0) {
                return Err(SubstrateError::configuration(format!(
                    "Michaelis-Menten constant must be non-negative, got {km}"
                )));
            }
        }
        Ok(())
    }
}

/// Serializable view of a field for logging collaborators.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    pub name: String,
    pub time: f64,
    pub shape: Vec<usize>,
    pub total_mass: f64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SubstrateField {
    name: String,
    params: SubstrateParams,
    boundary: Boundary,
    grid: Grid,
    static_nodes: Vec<NodeHandle>,
    dynamic_nodes: Vec<NodeHandle>,
    time: f64,
}

impl SubstrateField {
    pub fn new(
        name: impl Into<String>,
        params: SubstrateParams,
        geometry: &Geometry,
        boundary: Boundary,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SubstrateError::configuration("substrate name must not be empty"));
        }
        params.validate()?;
        if let Boundary::Fixed { value } = boundary {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SubstrateError::configuration(format!(
                    "boundary concentration must be non-negative, got {value}"
                )));
            }
        }
        Ok(Self {
            name,
            params,
            boundary,
            grid: Grid::from_geometry(geometry)?,
            static_nodes: Vec::new(),
            dynamic_nodes: Vec::new(),
            time: 0.0,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &SubstrateParams {
        &self.params
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Simulated time this field has been stepped through.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Registers a node with this field.
    ///
    /// The node must declare exchange parameters for this substrate and, on a
    /// lattice, sit inside it.
    pub fn bind_node(
        &mut self,
        handle: NodeHandle,
        mode: BindingMode,
        nodes: &NodeStore,
    ) -> Result<()> {
        let node = nodes.require(handle)?;
        node.validate_for(&self.name)?;
        transport::cell_of(&self.grid, node.position.as_deref())?;
        if self.is_bound(handle) {
            return Err(SubstrateError::configuration(format!(
                "node {} is already bound to '{}'",
                node.id, self.name
            )));
        }
        match mode {
            BindingMode::Static => self.static_nodes.push(handle),
            BindingMode::Dynamic => self.dynamic_nodes.push(handle),
        }
        tracing::debug!(substrate = %self.name, node = %node.id, ?mode, "Node bound");
        Ok(())
    }

    /// Removes a node from either registry. Returns whether it was bound.
    pub fn unbind_node(&mut self, handle: NodeHandle) -> bool {
        let before = self.static_nodes.len() + self.dynamic_nodes.len();
        self.static_nodes.retain(|&h| h != handle);
        self.dynamic_nodes.retain(|&h| h != handle);
        before != self.static_nodes.len() + self.dynamic_nodes.len()
    }

    pub fn clear_dynamic_nodes(&mut self) {
        self.dynamic_nodes.clear();
    }

    #[must_use]
    pub fn is_bound(&self, handle: NodeHandle) -> bool {
        self.static_nodes.contains(&handle) || self.dynamic_nodes.contains(&handle)
    }

    /// Bound nodes in exchange order: static first, then dynamic, each in
    /// registration order.
    pub fn bound_nodes(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.static_nodes
            .iter()
            .chain(self.dynamic_nodes.iter())
            .copied()
    }

    /// Advances the field by `dt`: decay, diffusion, then node exchange.
    pub fn step(&mut self, dt: f64, nodes: &mut NodeStore) -> Result<StepReport> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(SubstrateError::configuration(format!(
                "time step must be non-negative, got {dt}"
            )));
        }

        let dropped = self.prune_removed(nodes);
        if dropped > 0 {
            tracing::debug!(substrate = %self.name, dropped, "Dropped handles of removed nodes");
        }

        let mut next = self.grid.clone();
        let mut report = decay::apply(
            &mut next,
            self.params.decay_coefficient,
            dt,
            self.params.decay,
            &self.name,
        );
        diffusion::apply(&mut next, self.params.diffusion_coefficient, dt, self.boundary);
        let order: Vec<NodeHandle> = self.bound_nodes().collect();
        report.merge(transport::apply(&mut next, nodes, &order, &self.name, dt)?);

        self.grid = next;
        self.time += dt;
        tracing::debug!(
            substrate = %self.name,
            dt,
            time = self.time,
            total_mass = self.grid.total_mass(),
            "Substrate step"
        );
        Ok(report)
    }

    fn prune_removed(&mut self, nodes: &NodeStore) -> usize {
        let before = self.static_nodes.len() + self.dynamic_nodes.len();
        self.static_nodes.retain(|&h| nodes.contains(h));
        self.dynamic_nodes.retain(|&h| nodes.contains(h));
        before - self.static_nodes.len() - self.dynamic_nodes.len()
    }

    /// Concentration at a lattice position, or the scalar for non-spatial fields.
    pub fn query(&self, position: Option<&[usize]>) -> Result<f64> {
        self.grid.read(position)
    }

    /// Instantaneously sets the whole field to `value` (bolus events).
    pub fn set_level(&mut self, value: f64) -> Result<()> {
        check_level(value)?;
        self.grid.write(None, value)
    }

    /// Instantaneously sets one cell to `value`.
    pub fn set_level_at(&mut self, position: &[usize], value: f64) -> Result<()> {
        check_level(value)?;
        self.grid.write(Some(position), value)
    }

    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.grid.total_mass()
    }

    #[must_use]
    pub fn mean_concentration(&self) -> f64 {
        self.grid.mean()
    }

    #[must_use]
    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            name: self.name.clone(),
            time: self.time,
            shape: self.grid.shape().to_vec(),
            total_mass: self.grid.total_mass(),
            values: self.grid.values().to_vec(),
        }
    }
}

fn check_level(value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SubstrateError::configuration(format!(
            "concentration must be non-negative, got {value}"
        )))
    }
}
