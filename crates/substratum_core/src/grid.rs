//! Concentration state store.
//!
//! A [`Grid`] is either a regular N-dimensional lattice or, for spaces without
//! spatial structure, a single-element container holding the whole-field
//! scalar. Every solver reads and writes through the same interface so none
//! of them branch on "is this space spatial".

use crate::error::{Result, SubstrateError};
use serde::{Deserialize, Serialize};
use substratum_data::Geometry;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Grid {
    /// Lattice extent per axis, row-major with the last axis contiguous.
    /// Empty for a non-spatial space.
    shape: Vec<usize>,
    spacing: f64,
    cell_volume: f64,
    values: Vec<f64>,
}

impl Grid {
    /// Single-scalar store for a perfectly mixed space of the given volume.
    pub fn scalar(volume: f64) -> Result<Self> {
        if !(volume.is_finite() && volume > 0.0) {
            return Err(SubstrateError::configuration(format!(
                "space volume must be positive, got {volume}"
            )));
        }
        Ok(Self {
            shape: Vec::new(),
            spacing: 0.0,
            cell_volume: volume,
            values: vec![0.0],
        })
    }

    /// Zero-initialised lattice with uniform spacing `dx`.
    pub fn lattice(shape: &[usize], spacing: f64) -> Result<Self> {
        if shape.is_empty() || shape.contains(&0) {
            return Err(SubstrateError::configuration(format!(
                "lattice shape must be non-empty with positive extents, got {shape:?}"
            )));
        }
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(SubstrateError::configuration(format!(
                "grid spacing must be positive, got {spacing}"
            )));
        }
        let len = shape.iter().product();
        Ok(Self {
            shape: shape.to_vec(),
            spacing,
            cell_volume: spacing.powi(shape.len() as i32),
            values: vec![0.0; len],
        })
    }

    pub fn from_geometry(geometry: &Geometry) -> Result<Self> {
        match geometry {
            Geometry::Homogeneous { volume } => Self::scalar(*volume),
            Geometry::Lattice { shape, spacing } => Self::lattice(shape, *spacing),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_spatial(&self) -> bool {
        !self.shape.is_empty()
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Volume represented by one stored value (the whole space when non-spatial).
    #[must_use]
    pub fn cell_volume(&self) -> f64 {
        self.cell_volume
    }

    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.cell_volume * self.values.len() as f64
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Flat-buffer stride of each axis.
    #[must_use]
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.shape.len()];
        for axis in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        strides
    }

    /// Flat index of a lattice position. Non-spatial grids ignore the position.
    pub fn index(&self, position: &[usize]) -> Result<usize> {
        if !self.is_spatial() {
            return Ok(0);
        }
        if position.len() != self.shape.len() {
            return Err(SubstrateError::out_of_bounds(position, &self.shape));
        }
        let mut idx = 0;
        for (&p, &extent) in position.iter().zip(&self.shape) {
            if p >= extent {
                return Err(SubstrateError::out_of_bounds(position, &self.shape));
            }
            idx = idx * extent + p;
        }
        Ok(idx)
    }

    /// Concentration at `location`. `None` reads the volume-weighted mean,
    /// which for a non-spatial grid is the scalar itself.
    pub fn read(&self, location: Option<&[usize]>) -> Result<f64> {
        match location {
            Some(position) => Ok(self.values[self.index(position)?]),
            None => Ok(self.mean()),
        }
    }

    /// Overwrites one cell, or every cell when `location` is `None`.
    pub fn write(&mut self, location: Option<&[usize]>, value: f64) -> Result<()> {
        match location {
            Some(position) => {
                let idx = self.index(position)?;
                self.values[idx] = value;
            }
            None => self.fill(value),
        }
        Ok(())
    }

    pub fn fill(&mut self, value: f64) {
        self.values.iter_mut().for_each(|v| *v = value);
    }

    /// Concentration integrated over volume.
    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.values.iter().sum::<f64>() * self.cell_volume
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}
