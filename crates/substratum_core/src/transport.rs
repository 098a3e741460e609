//! Node <-> field mass exchange.
//!
//! A flux-type node and the field region it sits in form a compartment pair
//! (N, F) obeying
//!
//! ```text
//! vN dcN/dt =  kp(cF - cN) + ku*cF - kr*cN
//! vF dcF/dt = -kp(cF - cN) - ku*cF + kr*cN
//! ```
//!
//! Each step solves the backward Euler discretisation of this pair as a 2x2
//! linear system. Nodes sharing a region are applied one after another in
//! registration order. Fixed-type nodes pin the field last.

use crate::error::{NumericalWarning, Result, Stage, StepReport, SubstrateError};
use crate::grid::Grid;
use crate::node::{NodeHandle, NodeStore};
use std::collections::BTreeMap;
use substratum_data::{ExchangeParams, FluxParams};

/// Above this value of `dt*(kp + max(kr, ku))*(1/vN + 1/vF)` a step is
/// flagged as long relative to the exchange time scale.
pub const STIFFNESS_THRESHOLD: f64 = 1.0;

/// One backward Euler step of the compartment pair.
///
/// Returns the new `(cN, cF)`. Total mass `vN*cN + vF*cF` is conserved
/// exactly in exact arithmetic, and non-negative inputs give non-negative
/// outputs.
#[must_use]
pub fn implicit_exchange(
    c_node: f64,
    c_field: f64,
    v_node: f64,
    v_field: f64,
    params: &FluxParams,
    dt: f64,
) -> (f64, f64) {
    let a = dt / v_node;
    let b = dt / v_field;
    // Coefficients of cN and cF in the exchange flux into the node.
    let p = params.passive_rate + params.secretion_rate;
    let q = params.passive_rate + params.uptake_rate;
    let det = 1.0 + a * p + b * q;
    let node = (c_node * (1.0 + b * q) + a * q * c_field) / det;
    let field = (c_field * (1.0 + a * p) + b * p * c_node) / det;
    (node, field)
}

#[must_use]
pub fn stiffness_ratio(v_node: f64, v_field: f64, params: &FluxParams, dt: f64) -> f64 {
    let fastest = params.passive_rate + params.secretion_rate.max(params.uptake_rate);
    dt * fastest * (1.0 / v_node + 1.0 / v_field)
}

enum Action {
    Flux { handle: NodeHandle, cell: usize },
    Pin { cell: usize, setpoint: f64 },
}

/// Applies every node in `order` to the grid.
///
/// All handles, substrate entries and positions are checked before anything
/// is mutated, so a failing call leaves grid and nodes untouched.
pub fn apply(
    grid: &mut Grid,
    nodes: &mut NodeStore,
    order: &[NodeHandle],
    substrate: &str,
    dt: f64,
) -> Result<StepReport> {
    let mut report = StepReport::default();
    let actions = plan(grid, nodes, order, substrate)?;
    let v_field = grid.cell_volume();

    let mut pins: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for action in actions {
        match action {
            Action::Flux { handle, cell } => {
                let node = nodes.require_mut(handle)?;
                let v_node = node.volume;
                let Some(ExchangeParams::Flux(params)) = node.exchange_mut(substrate) else {
                    continue;
                };
                if params.is_inert() {
                    continue;
                }

                let ratio = stiffness_ratio(v_node, v_field, params, dt);
                if ratio > STIFFNESS_THRESHOLD {
                    report.push(
                        substrate,
                        NumericalWarning::TransportStiff { node: handle, ratio },
                    );
                }

                let c_field = grid.values()[cell];
                let (mut c_node, mut c_field) =
                    implicit_exchange(params.concentration, c_field, v_node, v_field, params, dt);
                for value in [&mut c_node, &mut c_field] {
                    if *value < 0.0 {
                        report.push(
                            substrate,
                            NumericalWarning::NegativeClamped {
                                stage: Stage::Transport,
                                value: *value,
                            },
                        );
                        *value = 0.0;
                    }
                }
                params.concentration = c_node;
                grid.values_mut()[cell] = c_field;
            }
            Action::Pin { cell, setpoint } => {
                let entry = pins.entry(cell).or_insert((0.0, 0));
                entry.0 += setpoint;
                entry.1 += 1;
            }
        }
    }

    // Fixed nodes act last and override any flux contribution on their cell.
    for (cell, (sum, count)) in pins {
        grid.values_mut()[cell] = sum / count as f64;
    }
    Ok(report)
}

fn plan(
    grid: &Grid,
    nodes: &NodeStore,
    order: &[NodeHandle],
    substrate: &str,
) -> Result<Vec<Action>> {
    order
        .iter()
        .map(|&handle| {
            let node = nodes.require(handle)?;
            // Nodes stay mutable after binding, so re-check them every step.
            let params = node.validate_for(substrate)?;
            let cell = cell_of(grid, node.position.as_deref())?;
            Ok(match params {
                ExchangeParams::Fixed { setpoint } => Action::Pin {
                    cell,
                    setpoint: *setpoint,
                },
                ExchangeParams::Flux(_) => Action::Flux { handle, cell },
            })
        })
        .collect()
}

/// Grid cell a node exchanges with. Non-spatial grids always use the scalar.
pub(crate) fn cell_of(grid: &Grid, position: Option<&[usize]>) -> Result<usize> {
    if !grid.is_spatial() {
        return Ok(0);
    }
    match position {
        Some(position) if position.len() != grid.shape().len() => {
            Err(SubstrateError::configuration(format!(
                "node position {position:?} does not match a {}-dimensional grid",
                grid.shape().len()
            )))
        }
        Some(position) => grid.index(position),
        None => Err(SubstrateError::configuration(
            "node bound to a spatial field has no position",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn test_exchange_conserves_mass() {
        let params = FluxParams::passive(0.4).with_secretion(0.1).with_uptake(0.3);
        let (v_n, v_f) = (2.0, 7.0);
        let (n, f) = implicit_exchange(5.0, 1.0, v_n, v_f, &params, 3.0);
        let before = v_n * 5.0 + v_f * 1.0;
        assert!((v_n * n + v_f * f - before).abs() < 1e-12);
        assert!(n >= 0.0 && f >= 0.0);
    }

    #[test]
    fn test_exchange_satisfies_backward_euler() {
        let params = FluxParams::passive(0.2).with_uptake(0.05);
        let (c_n, c_f, v_n, v_f, dt) = (1.0, 4.0, 3.0, 10.0, 2.5);
        let (n, f) = implicit_exchange(c_n, c_f, v_n, v_f, &params, dt);
        let flux = params.passive_rate * (f - n) + params.uptake_rate * f
            - params.secretion_rate * n;
        assert!((v_n * (n - c_n) - dt * flux).abs() < 1e-12);
        assert!((v_f * (f - c_f) + dt * flux).abs() < 1e-12);
    }

    #[test]
    fn test_inert_node_changes_nothing() {
        let mut grid = Grid::scalar(10.0).unwrap();
        grid.fill(2.0);
        let mut nodes = NodeStore::new();
        let h = nodes.insert(
            Node::new(1.0).with_flux("x", FluxParams::default().with_concentration(9.0)),
        );
        apply(&mut grid, &mut nodes, &[h], "x", 100.0).unwrap();
        assert_eq!(grid.values(), &[2.0]);
        assert_eq!(nodes.get(h).unwrap().exchange("x").unwrap().concentration(), 9.0);
    }

    #[test]
    fn test_fixed_nodes_average_on_scalar_field() {
        let mut grid = Grid::scalar(10.0).unwrap();
        let mut nodes = NodeStore::new();
        let a = nodes.insert(Node::new(1.0).with_fixed("x", 1.0));
        let b = nodes.insert(Node::new(1.0).with_fixed("x", 4.0));
        apply(&mut grid, &mut nodes, &[a, b], "x", 1.0).unwrap();
        assert_eq!(grid.values(), &[2.5]);
    }

    #[test]
    fn test_fixed_pin_overrides_flux_on_same_cell() {
        let mut grid = Grid::lattice(&[3], 1.0).unwrap();
        let mut nodes = NodeStore::new();
        let pin = nodes.insert(Node::new(1.0).at(vec![1]).with_fixed("x", 0.5));
        let src = nodes.insert(
            Node::new(1.0)
                .at(vec![1])
                .with_flux("x", FluxParams::passive(1.0).with_concentration(10.0)),
        );
        apply(&mut grid, &mut nodes, &[pin, src], "x", 1.0).unwrap();
        assert_eq!(grid.read(Some(&[1])).unwrap(), 0.5);
        assert!(nodes.get(src).unwrap().exchange("x").unwrap().concentration() < 10.0);
    }

    #[test]
    fn test_invalid_position_leaves_state_untouched() {
        let mut grid = Grid::lattice(&[3], 1.0).unwrap();
        let mut nodes = NodeStore::new();
        let ok = nodes.insert(
            Node::new(1.0)
                .at(vec![0])
                .with_flux("x", FluxParams::passive(1.0).with_concentration(1.0)),
        );
        let bad = nodes.insert(Node::new(1.0).at(vec![5]).with_fixed("x", 1.0));
        assert!(apply(&mut grid, &mut nodes, &[ok, bad], "x", 1.0).is_err());
        assert_eq!(grid.values(), &[0.0, 0.0, 0.0]);
        assert_eq!(nodes.get(ok).unwrap().exchange("x").unwrap().concentration(), 1.0);
    }

    #[test]
    fn test_stiff_step_is_reported() {
        let mut grid = Grid::scalar(1.0).unwrap();
        let mut nodes = NodeStore::new();
        let h = nodes.insert(
            Node::new(1.0).with_flux("x", FluxParams::passive(1.0).with_concentration(1.0)),
        );
        let report = apply(&mut grid, &mut nodes, &[h], "x", 10.0).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind(), "transport_stiff");
        // Implicit step still lands between the two initial values.
        let c = grid.values()[0];
        assert!(c > 0.0 && c < 1.0);
    }

    #[test]
    fn test_node_edited_after_binding_is_rechecked() {
        let mut grid = Grid::scalar(1.0).unwrap();
        grid.fill(2.0);
        let mut nodes = NodeStore::new();
        let h = nodes.insert(
            Node::new(1.0).with_flux("x", FluxParams::passive(1.0).with_concentration(1.0)),
        );
        nodes.get_mut(h).unwrap().volume = 0.0;
        assert!(matches!(
            apply(&mut grid, &mut nodes, &[h], "x", 1.0),
            Err(SubstrateError::Configuration(_))
        ));
        assert_eq!(grid.values(), &[2.0]);

        let node = nodes.get_mut(h).unwrap();
        node.volume = 1.0;
        if let Some(ExchangeParams::Flux(params)) = node.exchange_mut("x") {
            params.passive_rate = f64::NAN;
        }
        assert!(apply(&mut grid, &mut nodes, &[h], "x", 1.0).is_err());
        assert_eq!(grid.values(), &[2.0]);
    }

    #[test]
    fn test_shared_cell_applies_nodes_in_order() {
        let first = FluxParams::passive(0.5).with_concentration(8.0);
        let second = FluxParams::passive(0.2).with_uptake(0.3);
        let (v_field, v_a, v_b, dt) = (4.0, 1.0, 2.0, 1.5);
        let run = |forward: bool| {
            let mut grid = Grid::scalar(v_field).unwrap();
            grid.fill(1.0);
            let mut nodes = NodeStore::new();
            let a = nodes.insert(Node::new(v_a).with_flux("x", first));
            let b = nodes.insert(Node::new(v_b).with_flux("x", second));
            let order = if forward { [a, b] } else { [b, a] };
            apply(&mut grid, &mut nodes, &order, "x", dt).unwrap();
            grid.values()[0]
        };

        let (_, after_a) = implicit_exchange(8.0, 1.0, v_a, v_field, &first, dt);
        let (_, expected) = implicit_exchange(0.0, after_a, v_b, v_field, &second, dt);
        assert_eq!(run(true), expected);

        let (_, after_b) = implicit_exchange(0.0, 1.0, v_b, v_field, &second, dt);
        let (_, reversed) = implicit_exchange(8.0, after_b, v_a, v_field, &first, dt);
        assert_eq!(run(false), reversed);
        assert!((run(true) - run(false)).abs() > 1e-6);
    }
}
