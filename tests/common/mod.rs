pub mod macros;

use substratum_core::field::SubstrateParams;
use substratum_core::{Node, NodeHandle, Space};
use substratum_data::{Boundary, DecayKinetics, ExchangeParams, Geometry};

#[allow(dead_code)]
pub struct SpaceBuilder {
    geometry: Geometry,
    boundary: Boundary,
    substrates: Vec<(String, SubstrateParams, f64)>,
    nodes: Vec<Node>,
}

#[allow(dead_code)]
impl SpaceBuilder {
    pub fn homogeneous(volume: f64) -> Self {
        Self {
            geometry: Geometry::Homogeneous { volume },
            boundary: Boundary::NoFlux,
            substrates: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn lattice(shape: &[usize], spacing: f64) -> Self {
        Self {
            geometry: Geometry::Lattice {
                shape: shape.to_vec(),
                spacing,
            },
            ..Self::homogeneous(1.0)
        }
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_substrate(mut self, name: &str, diffusion: f64, decay: f64) -> Self {
        self.substrates.push((
            name.to_string(),
            SubstrateParams::new(diffusion, decay, DecayKinetics::FirstOrder),
            0.0,
        ));
        self
    }

    pub fn with_kinetics(mut self, name: &str, decay: f64, kinetics: DecayKinetics) -> Self {
        self.substrates.push((
            name.to_string(),
            SubstrateParams::new(0.0, decay, kinetics),
            0.0,
        ));
        self
    }

    pub fn with_level(mut self, level: f64) -> Self {
        if let Some(last) = self.substrates.last_mut() {
            last.2 = level;
        }
        self
    }

    /// Node bound statically to every substrate it declares.
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn build(self) -> (Space, Vec<NodeHandle>) {
        let mut space = Space::new(self.geometry, self.boundary).unwrap();
        for (name, params, level) in &self.substrates {
            space.add_substrate_with(name, *params).unwrap();
            space.set_level(name, *level).unwrap();
        }
        let handles = self
            .nodes
            .into_iter()
            .map(|node| {
                let handle = space.add_node(node);
                space
                    .bind_declared(handle, substratum_data::BindingMode::Static)
                    .unwrap();
                handle
            })
            .collect();
        (space, handles)
    }
}

/// Mass in the field plus the internal pools of flux-type nodes.
#[allow(dead_code)]
pub fn system_mass(space: &Space, substrate: &str, nodes: &[NodeHandle]) -> f64 {
    let field = space.field(substrate).unwrap().total_mass();
    let pools: f64 = nodes
        .iter()
        .filter_map(|&h| {
            let node = space.node(h)?;
            match node.exchange(substrate)? {
                ExchangeParams::Flux(p) => Some(node.volume * p.concentration),
                ExchangeParams::Fixed { .. } => None,
            }
        })
        .sum();
    field + pools
}

/// Classic fourth-order Runge-Kutta integration of `dc/dt = f(c)`.
#[allow(dead_code)]
pub fn rk4<F: Fn(f64) -> f64>(f: F, c0: f64, t: f64, steps: usize) -> f64 {
    let h = t / steps as f64;
    let mut c = c0;
    for _ in 0..steps {
        let k1 = f(c);
        let k2 = f(c + 0.5 * h * k1);
        let k3 = f(c + 0.5 * h * k2);
        let k4 = f(c + h * k3);
        c += h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
    }
    c
}
