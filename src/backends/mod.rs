//! Array backend abstraction for grid operators
//!
//! The grid machinery is written against one trait, [`GridBackend`], with
//! three implementations:
//!
//! - [`dense::DenseBackend`]: plain in-memory `ndarray` arrays, synchronous
//! - [`chunked::ChunkedBackend`]: chunk-overlap-aware operators evaluated in
//!   parallel on the rayon pool, forced at every call
//! - [`lazy::LazyBackend`]: label-indexed deferred expressions, evaluated
//!   only through [`GridBackend::materialize`]
//!
//! Whether a backend's results are eager or deferred is part of the typed
//! contract: `diff_i`/`diff_j`/`divide` return the backend's own array
//! representation, and `materialize` is the single explicit point at which
//! a concrete dense array is produced.

pub mod chunked;
pub mod dense;
pub mod lazy;

use crate::boundary::BoundaryPolicy;
use crate::errors::Result;
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use std::path::Path;

/// Backend-specific array representation and difference primitives
pub trait GridBackend {
    /// Array representation this backend operates on
    type Array: Clone + std::fmt::Debug;

    /// Load a variable from a coordinate file in this representation
    fn load(&self, path: &Path, varname: &str) -> Result<Self::Array>;

    /// Forward difference `q(i+1) - q(i)` along the last (i) axis
    fn diff_i(&self, q: &Self::Array) -> Result<Self::Array>;

    /// Forward difference `q(j+1) - q(j)` along the second-to-last (j) axis
    fn diff_j(&self, q: &Self::Array) -> Result<Self::Array>;

    /// Elementwise division, used to scale differences by metric terms
    fn divide(&self, num: &Self::Array, den: &Self::Array) -> Result<Self::Array>;

    /// An all-zero array of the given shape in this representation
    fn zeros(&self, shape: (usize, usize)) -> Self::Array;

    /// The 2D shape, available without forcing evaluation
    fn shape(&self, a: &Self::Array) -> (usize, usize);

    /// Force evaluation into a concrete dense array
    ///
    /// Cheap for the dense and chunked backends (their results are already
    /// concrete); for the lazy backend this is the only point at which the
    /// expression graph is evaluated and data is read.
    fn materialize(&self, a: &Self::Array) -> Result<Array2<f64>>;
}

/// `q` shifted by -1 along `axis`, the vacated edge filled per `boundary`
///
/// The forward difference of every backend is `shifted_forward(q) - q`.
pub(crate) fn shifted_forward(
    q: &ArrayView2<f64>,
    axis: Axis,
    boundary: BoundaryPolicy,
) -> Result<Array2<f64>> {
    let tail = match axis {
        Axis(0) => q.slice(ndarray::s![1.., ..]),
        _ => q.slice(ndarray::s![.., 1..]),
    };
    let edge = match boundary {
        BoundaryPolicy::Periodic => match axis {
            Axis(0) => q.slice(ndarray::s![..1, ..]).to_owned(),
            _ => q.slice(ndarray::s![.., ..1]).to_owned(),
        },
        policy => {
            let edge_shape = match axis {
                Axis(0) => (1, q.ncols()),
                _ => (q.nrows(), 1),
            };
            Array2::from_elem(edge_shape, policy.fill_value())
        }
    };

    Ok(concatenate(axis, &[tail, edge.view()])?)
}

/// Forward difference `q(+1) - q` along `axis` with the given boundary
pub(crate) fn forward_diff(
    q: &ArrayView2<f64>,
    axis: Axis,
    boundary: BoundaryPolicy,
) -> Result<Array2<f64>> {
    Ok(&shifted_forward(q, axis, boundary)? - q)
}
