//! The space facade used by agents, events and the driving loop.
//!
//! A [`Space`] owns its substrate fields and the node arena. External
//! collaborators register substrates and nodes, inject boluses, query
//! concentrations and drive time forward through `step` or `advance`.

use crate::clock::UpdateClock;
use crate::error::{Result, StepReport, SubstrateError};
use crate::field::{FieldSnapshot, SubstrateField, SubstrateParams};
use crate::grid::Grid;
use crate::metrics::StepMetrics;
use crate::node::{Node, NodeHandle, NodeStore};
use std::time::Instant;
use substratum_data::{BindingMode, Boundary, DecayKinetics, ExchangeParams, Geometry};

#[derive(Debug)]
pub struct Space {
    geometry: Geometry,
    boundary: Boundary,
    fields: Vec<SubstrateField>,
    nodes: NodeStore,
    clock: UpdateClock,
    metrics: StepMetrics,
}

impl Space {
    pub fn new(geometry: Geometry, boundary: Boundary) -> Result<Self> {
        Grid::from_geometry(&geometry)?;
        Ok(Self {
            geometry,
            boundary,
            fields: Vec::new(),
            nodes: NodeStore::new(),
            clock: UpdateClock::default(),
            metrics: StepMetrics::new(),
        })
    }

    /// Perfectly mixed space of the given volume.
    pub fn homogeneous(volume: f64) -> Result<Self> {
        Self::new(Geometry::Homogeneous { volume }, Boundary::NoFlux)
    }

    /// Lattice space with reflective boundaries.
    pub fn lattice(shape: &[usize], spacing: f64) -> Result<Self> {
        Self::new(
            Geometry::Lattice {
                shape: shape.to_vec(),
                spacing,
            },
            Boundary::NoFlux,
        )
    }

    /// Sets how much simulated time `advance` accumulates before stepping.
    #[must_use]
    pub fn with_substrate_interval(mut self, seconds: f64) -> Self {
        self.clock = UpdateClock::new(seconds);
        self
    }

    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[must_use]
    pub fn metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    pub fn add_substrate(
        &mut self,
        name: &str,
        diffusion_coefficient: f64,
        decay_coefficient: f64,
        decay: DecayKinetics,
    ) -> Result<()> {
        self.add_substrate_with(
            name,
            SubstrateParams::new(diffusion_coefficient, decay_coefficient, decay),
        )
    }

    pub fn add_substrate_with(&mut self, name: &str, params: SubstrateParams) -> Result<()> {
        if self.fields.iter().any(|f| f.name() == name) {
            return Err(SubstrateError::configuration(format!(
                "substrate '{name}' is already registered"
            )));
        }
        let field = SubstrateField::new(name, params, &self.geometry, self.boundary)?;
        tracing::info!(
            substrate = name,
            diffusion = params.diffusion_coefficient,
            decay = params.decay_coefficient,
            kinetics = params.decay.label(),
            "Substrate registered"
        );
        self.fields.push(field);
        Ok(())
    }

    pub fn substrate_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(SubstrateField::name)
    }

    pub fn field(&self, name: &str) -> Result<&SubstrateField> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| SubstrateError::UnknownSubstrate(name.to_string()))
    }

    fn field_mut(&mut self, name: &str) -> Result<&mut SubstrateField> {
        self.fields
            .iter_mut()
            .find(|f| f.name() == name)
            .ok_or_else(|| SubstrateError::UnknownSubstrate(name.to_string()))
    }

    /// Hands a node to the space. It takes part in no exchange until bound.
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        self.nodes.insert(node)
    }

    /// Unbinds the node from every field and returns it.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Option<Node> {
        for field in &mut self.fields {
            field.unbind_node(handle);
        }
        self.nodes.remove(handle)
    }

    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    pub fn add_static_substrate_node(
        &mut self,
        substrate: &str,
        handle: NodeHandle,
    ) -> Result<()> {
        self.bind(substrate, handle, BindingMode::Static)
    }

    pub fn add_dynamic_substrate_node(
        &mut self,
        substrate: &str,
        handle: NodeHandle,
    ) -> Result<()> {
        self.bind(substrate, handle, BindingMode::Dynamic)
    }

    pub fn bind(&mut self, substrate: &str, handle: NodeHandle, mode: BindingMode) -> Result<()> {
        let Self { fields, nodes, .. } = self;
        let field = fields
            .iter_mut()
            .find(|f| f.name() == substrate)
            .ok_or_else(|| SubstrateError::UnknownSubstrate(substrate.to_string()))?;
        field.bind_node(handle, mode, nodes)
    }

    /// Binds a node to every substrate it declares exchange parameters for.
    pub fn bind_declared(&mut self, handle: NodeHandle, mode: BindingMode) -> Result<()> {
        let mut declared: Vec<String> = self
            .nodes
            .require(handle)?
            .substrate_info
            .keys()
            .cloned()
            .collect();
        declared.sort();
        for substrate in declared {
            self.bind(&substrate, handle, mode)?;
        }
        Ok(())
    }

    pub fn unbind(&mut self, substrate: &str, handle: NodeHandle) -> Result<bool> {
        Ok(self.field_mut(substrate)?.unbind_node(handle))
    }

    pub fn clear_dynamic_nodes(&mut self) {
        for field in &mut self.fields {
            field.clear_dynamic_nodes();
        }
    }

    pub fn get_concentration(&self, substrate: &str, position: Option<&[usize]>) -> Result<f64> {
        self.field(substrate)?.query(position)
    }

    pub fn set_level(&mut self, substrate: &str, value: f64) -> Result<()> {
        self.field_mut(substrate)?.set_level(value)
    }

    pub fn set_level_at(&mut self, substrate: &str, position: &[usize], value: f64) -> Result<()> {
        self.field_mut(substrate)?.set_level_at(position, value)
    }

    /// Internal concentration of a flux node, or the setpoint of a fixed node.
    pub fn node_concentration(&self, handle: NodeHandle, substrate: &str) -> Result<f64> {
        let node = self.nodes.require(handle)?;
        node.exchange(substrate)
            .map(ExchangeParams::concentration)
            .ok_or_else(|| {
                SubstrateError::configuration(format!(
                    "node {} has no substrate info for '{substrate}'",
                    node.id
                ))
            })
    }

    /// Overrides a node's internal pool (flux) or setpoint (fixed).
    pub fn set_node_concentration(
        &mut self,
        handle: NodeHandle,
        substrate: &str,
        value: f64,
    ) -> Result<()> {
        if !(value.is_finite() && value >= 0.0) {
            return Err(SubstrateError::configuration(format!(
                "concentration must be non-negative, got {value}"
            )));
        }
        let node = self.nodes.require_mut(handle)?;
        let id = node.id;
        match node.exchange_mut(substrate) {
            Some(ExchangeParams::Flux(params)) => params.concentration = value,
            Some(ExchangeParams::Fixed { setpoint }) => *setpoint = value,
            None => {
                return Err(SubstrateError::configuration(format!(
                    "node {id} has no substrate info for '{substrate}'"
                )))
            }
        }
        Ok(())
    }

    /// Steps every substrate by `dt`, in registration order.
    pub fn step(&mut self, dt: f64) -> Result<StepReport> {
        let started = Instant::now();
        let mut report = StepReport::default();
        for field in &mut self.fields {
            report.merge(field.step(dt, &mut self.nodes)?);
        }
        self.metrics.record_step(dt, started.elapsed(), &report);
        Ok(report)
    }

    /// Moves the substrate clock forward and steps with the accumulated time
    /// once the substrate interval is reached.
    pub fn advance(&mut self, dt: f64) -> Result<Option<StepReport>> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(SubstrateError::configuration(format!(
                "time step must be non-negative, got {dt}"
            )));
        }
        match self.clock.advance(dt) {
            Some(elapsed) => self.step(elapsed).map(Some),
            None => Ok(None),
        }
    }

    /// Steps any time still pending on the substrate clock.
    pub fn flush(&mut self) -> Result<Option<StepReport>> {
        match self.clock.take() {
            Some(elapsed) => self.step(elapsed).map(Some),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<FieldSnapshot> {
        self.fields.iter().map(SubstrateField::snapshot).collect()
    }
}
