//! Locally one-dimensional (LOD) implicit diffusion solver.
//!
//! Each axis is swept in turn with a backward Euler step of the full `dt`,
//! which turns every 1-D line along that axis into an independent
//! tridiagonal system:
//!
//! ```text
//! -r*c'[i-1] + (1 + 2r)*c'[i] - r*c'[i+1] = c[i],   r = D*dt/dx^2
//! ```
//!
//! The scheme is unconditionally stable and keeps non-negative data
//! non-negative. Axes are sequential (each sweep reads the previous one's
//! result); the lines inside one sweep are solved in parallel.
//!
//! With [`Boundary::NoFlux`] every column of the system sums to one, so the
//! total mass is conserved up to rounding.

use crate::grid::Grid;
use rayon::prelude::*;
use substratum_data::Boundary;

/// Thomas algorithm for a tridiagonal system. `sub[0]` and `sup[n-1]` are
/// ignored. `diag` and `rhs` are used as scratch and the solution is left
/// in `rhs`.
pub fn solve_tridiagonal(sub: &[f64], diag: &mut [f64], sup: &[f64], rhs: &mut [f64]) {
    let n = diag.len();
    if n == 0 {
        return;
    }
    for i in 1..n {
        let w = sub[i] / diag[i - 1];
        diag[i] -= w * sup[i - 1];
        rhs[i] -= w * rhs[i - 1];
    }
    rhs[n - 1] /= diag[n - 1];
    for i in (0..n - 1).rev() {
        rhs[i] = (rhs[i] - sup[i] * rhs[i + 1]) / diag[i];
    }
}

/// Solves one backward Euler diffusion line in place.
fn implicit_line(line: &mut [f64], r: f64, boundary: Boundary) {
    let n = line.len();
    if n == 0 {
        return;
    }
    let off = vec![-r; n];
    let mut diag = vec![1.0 + 2.0 * r; n];
    match boundary {
        Boundary::NoFlux => {
            // Ghost cell mirrors the edge cell, cancelling one neighbour term.
            diag[0] -= r;
            diag[n - 1] -= r;
        }
        Boundary::Fixed { value } => {
            line[0] += r * value;
            line[n - 1] += r * value;
        }
    }
    solve_tridiagonal(&off, &mut diag, &off, line);
}

/// Advances the grid by `dt` under diffusion coefficient `coefficient`.
///
/// A non-spatial grid, a zero coefficient or a zero step is left untouched.
pub fn apply(grid: &mut Grid, coefficient: f64, dt: f64, boundary: Boundary) {
    if !grid.is_spatial() || coefficient == 0.0 || dt == 0.0 {
        return;
    }
    let r = coefficient * dt / (grid.spacing() * grid.spacing());
    let shape = grid.shape().to_vec();
    let strides = grid.strides();

    for axis in 0..shape.len() {
        let extent = shape[axis];
        if extent < 2 && matches!(boundary, Boundary::NoFlux) {
            continue;
        }
        sweep_axis(grid.values_mut(), &shape, &strides, axis, r, boundary);
        tracing::trace!(axis, extent, r, "LOD sweep");
    }
}

fn sweep_axis(
    values: &mut [f64],
    shape: &[usize],
    strides: &[usize],
    axis: usize,
    r: f64,
    boundary: Boundary,
) {
    let extent = shape[axis];
    let stride = strides[axis];
    let starts = line_starts(shape, strides, axis);

    let current: &[f64] = values;
    let solved: Vec<Vec<f64>> = starts
        .par_iter()
        .map(|&start| {
            let mut line: Vec<f64> = (0..extent).map(|i| current[start + i * stride]).collect();
            implicit_line(&mut line, r, boundary);
            line
        })
        .collect();

    for (start, line) in starts.iter().zip(solved) {
        for (i, v) in line.into_iter().enumerate() {
            values[start + i * stride] = v;
        }
    }
}

/// Flat offsets of the first cell of every line running along `axis`.
fn line_starts(shape: &[usize], strides: &[usize], axis: usize) -> Vec<usize> {
    let mut starts = vec![0usize];
    for (other, (&extent, &stride)) in shape.iter().zip(strides).enumerate() {
        if other == axis {
            continue;
        }
        starts = starts
            .iter()
            .flat_map(|&base| (0..extent).map(move |i| base + i * stride))
            .collect();
    }
    starts
}
