//! Dense in-memory backend
//!
//! Metric terms and fields are plain `Array2<f64>` values; every operation
//! is synchronous and blocking. Intended for grids small enough to fit
//! fully in memory. The default boundary policy is periodic wraparound.

use super::{forward_diff, GridBackend};
use crate::boundary::BoundaryPolicy;
use crate::errors::{GridError, Result};
use crate::loader::read_dense;
use ndarray::{Array2, Axis};
use std::path::Path;

/// Backend operating on dense in-memory arrays
#[derive(Debug, Clone, Copy)]
pub struct DenseBackend {
    boundary: BoundaryPolicy,
}

impl DenseBackend {
    pub fn new(boundary: BoundaryPolicy) -> Self {
        Self { boundary }
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }
}

impl Default for DenseBackend {
    /// Periodic wraparound, the historical dense-array behaviour
    fn default() -> Self {
        Self::new(BoundaryPolicy::Periodic)
    }
}

impl GridBackend for DenseBackend {
    type Array = Array2<f64>;

    fn load(&self, path: &Path, varname: &str) -> Result<Array2<f64>> {
        read_dense(path, varname)
    }

    fn diff_i(&self, q: &Array2<f64>) -> Result<Array2<f64>> {
        forward_diff(&q.view(), Axis(1), self.boundary)
    }

    fn diff_j(&self, q: &Array2<f64>) -> Result<Array2<f64>> {
        forward_diff(&q.view(), Axis(0), self.boundary)
    }

    fn divide(&self, num: &Array2<f64>, den: &Array2<f64>) -> Result<Array2<f64>> {
        if num.dim() != den.dim() {
            return Err(GridError::ShapeMismatch {
                var: "divide".to_string(),
                expected: num.dim(),
                actual: den.dim(),
            });
        }
        Ok(num / den)
    }

    fn zeros(&self, shape: (usize, usize)) -> Array2<f64> {
        Array2::zeros(shape)
    }

    fn shape(&self, a: &Array2<f64>) -> (usize, usize) {
        a.dim()
    }

    fn materialize(&self, a: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(a.clone())
    }
}
