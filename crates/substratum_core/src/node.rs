//! Point sources and sinks exchanging substrate with a field.
//!
//! Nodes live in a [`NodeStore`] owned by the space. Fields never own nodes;
//! they keep [`NodeHandle`]s in their registries and drop them on explicit
//! unbind. A handle carries a generation so a slot reused after removal is
//! never mistaken for the node that used to live there.

use crate::error::{Result, SubstrateError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use substratum_data::{ExchangeParams, FluxParams};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

/// A point compartment with a virtual volume and per-substrate exchange
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub volume: f64,
    /// Lattice cell the node sits in. Ignored by non-spatial fields.
    pub position: Option<Vec<usize>>,
    pub substrate_info: HashMap<String, ExchangeParams>,
}

impl Node {
    #[must_use]
    pub fn new(volume: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            volume,
            position: None,
            substrate_info: HashMap::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, position: impl Into<Vec<usize>>) -> Self {
        self.position = Some(position.into());
        self
    }

    #[must_use]
    pub fn with_substrate(mut self, name: impl Into<String>, params: ExchangeParams) -> Self {
        self.substrate_info.insert(name.into(), params);
        self
    }

    #[must_use]
    pub fn with_flux(self, name: impl Into<String>, params: FluxParams) -> Self {
        self.with_substrate(name, ExchangeParams::Flux(params))
    }

    #[must_use]
    pub fn with_fixed(self, name: impl Into<String>, setpoint: f64) -> Self {
        self.with_substrate(name, ExchangeParams::Fixed { setpoint })
    }

    #[must_use]
    pub fn exchange(&self, substrate: &str) -> Option<&ExchangeParams> {
        self.substrate_info.get(substrate)
    }

    pub fn exchange_mut(&mut self, substrate: &str) -> Option<&mut ExchangeParams> {
        self.substrate_info.get_mut(substrate)
    }

    /// Checks the parameters this node declares for `substrate`.
    pub fn validate_for(&self, substrate: &str) -> Result<&ExchangeParams> {
        let params = self.exchange(substrate).ok_or_else(|| {
            SubstrateError::configuration(format!(
                "node {} has no substrate info for '{substrate}'",
                self.id
            ))
        })?;
        if !(self.volume.is_finite() && self.volume > 0.0) {
            return Err(SubstrateError::configuration(format!(
                "node {} volume must be positive, got {}",
                self.id, self.volume
            )));
        }
        let values: Vec<(&str, f64)> = match params {
            ExchangeParams::Fixed { setpoint } => vec![("setpoint", *setpoint)],
            ExchangeParams::Flux(p) => vec![
                ("concentration", p.concentration),
                ("passive_rate", p.passive_rate),
                ("secretion_rate", p.secretion_rate),
                ("uptake_rate", p.uptake_rate),
            ],
        };
        for (label, value) in values {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SubstrateError::configuration(format!(
                    "node {} {label} for '{substrate}' must be non-negative, got {value}",
                    self.id
                )));
            }
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Generational arena of nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl NodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeHandle {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, handle: NodeHandle) -> Option<Node> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(node)
    }

    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn require(&self, handle: NodeHandle) -> Result<&Node> {
        self.get(handle).ok_or(SubstrateError::UnknownNode(handle))
    }

    pub fn require_mut(&mut self, handle: NodeHandle) -> Result<&mut Node> {
        self.get_mut(handle).ok_or(SubstrateError::UnknownNode(handle))
    }

    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.get(handle).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
