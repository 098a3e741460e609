use serde::{Deserialize, Serialize};

/// Spontaneous decay law of a substrate. Fixed when the substrate is registered.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecayKinetics {
    /// `dc/dt = -k*c`
    #[default]
    FirstOrder,
    /// `dc/dt = -k*c^2`
    SecondOrder,
    /// `dc/dt = -k*c/(km+c)`
    MichaelisMenten { km: f64 },
}

impl DecayKinetics {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            DecayKinetics::FirstOrder => "first_order",
            DecayKinetics::SecondOrder => "second_order",
            DecayKinetics::MichaelisMenten { .. } => "michaelis_menten",
        }
    }
}

/// Rate-governed exchange parameters of a flux-type node.
///
/// `concentration` is the node's internal pool; the three rates are
/// passive transport, active secretion (release) and active uptake.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxParams {
    pub concentration: f64,
    pub passive_rate: f64,
    pub secretion_rate: f64,
    pub uptake_rate: f64,
}

impl FluxParams {
    #[must_use]
    pub fn passive(passive_rate: f64) -> Self {
        Self {
            passive_rate,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_concentration(mut self, concentration: f64) -> Self {
        self.concentration = concentration;
        self
    }

    #[must_use]
    pub fn with_secretion(mut self, secretion_rate: f64) -> Self {
        self.secretion_rate = secretion_rate;
        self
    }

    #[must_use]
    pub fn with_uptake(mut self, uptake_rate: f64) -> Self {
        self.uptake_rate = uptake_rate;
        self
    }

    /// True when every rate is zero, i.e. the node is inert.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.passive_rate == 0.0 && self.secretion_rate == 0.0 && self.uptake_rate == 0.0
    }
}

/// How a node interacts with one substrate field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeParams {
    /// Pins the field at the node's location to `setpoint`.
    Fixed { setpoint: f64 },
    /// Exchanges mass with the field through the compartment ODEs.
    Flux(FluxParams),
}

impl ExchangeParams {
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, ExchangeParams::Fixed { .. })
    }

    /// Internal concentration for flux nodes, setpoint for fixed nodes.
    #[must_use]
    pub fn concentration(&self) -> f64 {
        match self {
            ExchangeParams::Fixed { setpoint } => *setpoint,
            ExchangeParams::Flux(p) => p.concentration,
        }
    }
}

/// Lifetime class of a node's registration with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// Lives as long as the field.
    #[default]
    Static,
    /// Added and removed by external collaborators (e.g. agents).
    Dynamic,
}

/// Behaviour of the diffusion solver at the outer faces of the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Boundary {
    /// Reflective, zero-flux faces. Conserves mass.
    #[default]
    NoFlux,
    /// Ghost cells outside the lattice are held at `value`.
    Fixed { value: f64 },
}

/// Spatial structure of a simulation space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    /// Perfectly mixed space; each substrate is a single scalar.
    Homogeneous { volume: f64 },
    /// Regular lattice with uniform spacing along every axis.
    Lattice { shape: Vec<usize>, spacing: f64 },
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry::Homogeneous { volume: 1.0 }
    }
}

impl Geometry {
    #[must_use]
    pub fn is_spatial(&self) -> bool {
        matches!(self, Geometry::Lattice { .. })
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        match self {
            Geometry::Homogeneous { .. } => 0,
            Geometry::Lattice { shape, .. } => shape.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Ms,
    #[default]
    Sec,
    Min,
    Hour,
    Day,
    Week,
}

impl TimeUnit {
    /// Length of one unit in seconds.
    #[must_use]
    pub fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Ms => 1e-3,
            TimeUnit::Sec => 1.0,
            TimeUnit::Min => 60.0,
            TimeUnit::Hour => 3_600.0,
            TimeUnit::Day => 86_400.0,
            TimeUnit::Week => 604_800.0,
        }
    }

    #[must_use]
    pub fn convert(value: f64, from: TimeUnit, to: TimeUnit) -> f64 {
        value * from.seconds() / to.seconds()
    }
}

/// A duration expressed in a chosen unit, as it appears in scenario files.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Interval {
    pub value: f64,
    #[serde(default)]
    pub unit: TimeUnit,
}

impl Interval {
    #[must_use]
    pub fn new(value: f64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    #[must_use]
    pub fn as_seconds(&self) -> f64 {
        self.value * self.unit.seconds()
    }
}
