//! # Substratum Core
//!
//! The substrate concentration engine: named, diffusible, decaying chemical
//! fields living in a space and exchanging mass with point-like nodes.
//!
//! This crate contains:
//! - A dense N-dimensional grid (or a single scalar for well-mixed spaces)
//! - Exact first/second order and implicit Michaelis-Menten decay
//! - Locally one-dimensional implicit diffusion with Thomas-algorithm line solves
//! - Backward Euler node exchange that conserves mass and stays non-negative
//! - Metrics collection and structured logging
//!
//! ## Pipeline
//!
//! Every substrate step applies decay, then diffusion, then node exchange.
//! A step is computed on a private copy and swapped in only on success.
//!
//! ## Example
//!
//! ```
//! use substratum_core::{Node, Space};
//! use substratum_data::{DecayKinetics, FluxParams};
//!
//! let mut space = Space::homogeneous(2.7e7).unwrap();
//! space.add_substrate("drug", 0.0, 0.0, DecayKinetics::FirstOrder).unwrap();
//!
//! let depot = space.add_node(Node::new(2.7e6).with_flux("drug", FluxParams::passive(1e-3)));
//! space.add_static_substrate_node("drug", depot).unwrap();
//! space.set_node_concentration(depot, "drug", 1.0e6).unwrap();
//!
//! space.step(30.0).unwrap();
//! assert!(space.get_concentration("drug", None).unwrap() > 0.0);
//! ```

/// Substrate update interval accumulation
pub mod clock;
/// Scenario configuration loaded from TOML
pub mod config;
/// Decay kinetics applied cell by cell
pub mod decay;
/// LOD implicit diffusion solver
pub mod diffusion;
/// Error and numerical warning types
pub mod error;
/// One substrate's state and its step pipeline
pub mod field;
/// Dense concentration storage
pub mod grid;
/// Step counters and structured logging
pub mod metrics;
/// Nodes and the generational node arena
pub mod node;
/// Space facade for agents, events and the driving loop
pub mod space;
/// Node <-> field exchange integrator
pub mod transport;

pub use config::ScenarioConfig;
pub use error::{NumericalWarning, Result, StepReport, SubstrateError};
pub use field::{FieldSnapshot, SubstrateField, SubstrateParams};
pub use grid::Grid;
pub use metrics::{init_logging, StepMetrics};
pub use node::{Node, NodeHandle, NodeStore};
pub use space::Space;
