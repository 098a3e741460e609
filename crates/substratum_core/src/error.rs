//! Error and warning types for the substrate engine.
//!
//! Errors are fatal for the call that produced them. Numerical warnings are
//! not errors: the engine clamps, keeps going and reports them through
//! [`StepReport`] and `tracing`.

use crate::node::NodeHandle;
use thiserror::Error;

/// Main error type for substrate engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubstrateError {
    /// Invalid or duplicate registration, missing substrate info, bad parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A position outside the lattice, or of the wrong dimensionality
    #[error("Position {position:?} is out of bounds for grid shape {shape:?}")]
    OutOfBounds {
        position: Vec<usize>,
        shape: Vec<usize>,
    },

    /// No substrate registered under this name
    #[error("Unknown substrate: {0}")]
    UnknownSubstrate(String),

    /// The handle does not refer to a live node
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeHandle),
}

impl SubstrateError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    #[must_use]
    pub fn out_of_bounds(position: &[usize], shape: &[usize]) -> Self {
        Self::OutOfBounds {
            position: position.to_vec(),
            shape: shape.to_vec(),
        }
    }

    /// True for errors a caller may recover from without rebuilding the space.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SubstrateError::OutOfBounds { .. } | SubstrateError::UnknownNode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SubstrateError>;

/// Non-fatal numerical events raised while stepping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericalWarning {
    /// A value came out negative and was clamped to zero.
    NegativeClamped { stage: Stage, value: f64 },
    /// `k*dt` exceeds `km`; the implicit Michaelis-Menten step loses accuracy.
    MichaelisMentenStiff { rate_dt: f64, km: f64 },
    /// The closed quadratic root was unusable; first-order decay was applied instead.
    MichaelisMentenFallback { concentration: f64 },
    /// The step is long compared with the fastest node exchange rate.
    TransportStiff { node: NodeHandle, ratio: f64 },
}

impl NumericalWarning {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            NumericalWarning::NegativeClamped { .. } => "negative_clamped",
            NumericalWarning::MichaelisMentenStiff { .. } => "michaelis_menten_stiff",
            NumericalWarning::MichaelisMentenFallback { .. } => "michaelis_menten_fallback",
            NumericalWarning::TransportStiff { .. } => "transport_stiff",
        }
    }

    pub(crate) fn emit(&self, substrate: &str) {
        tracing::warn!(substrate, kind = self.kind(), detail = ?self, "Numerical warning");
    }
}

/// Stage of the per-step pipeline a warning originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decay,
    Diffusion,
    Transport,
}

/// Outcome of one substrate step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub warnings: Vec<NumericalWarning>,
}

impl StepReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn merge(&mut self, other: StepReport) {
        self.warnings.extend(other.warnings);
    }

    pub(crate) fn push(&mut self, substrate: &str, warning: NumericalWarning) {
        warning.emit(substrate);
        self.warnings.push(warning);
    }
}
