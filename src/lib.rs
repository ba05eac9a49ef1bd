//! nemogrid: NEMO model grid metrics and differential operators
//!
//! A Rust library for working with NEMO-style ocean model grids stored in
//! NetCDF coordinate files. nemogrid loads the six horizontal metric terms
//! (cell widths in two directions at the T, U and V staggered positions)
//! and provides a staggered centered-difference gradient operator that
//! works identically across three array backends.
//!
//! ## Key Features
//!
//! - **Dense backend**: plain in-memory `ndarray` arrays for grids that
//!   fit in memory, synchronous computation
//! - **Chunked backend**: chunk-overlap-aware operators evaluated in
//!   parallel on the Rayon thread pool, sourced from memory or straight
//!   from the on-disk variable
//! - **Lazy backend**: label-indexed deferred expressions for out-of-core
//!   datasets, evaluated only when explicitly materialized
//! - **Explicit boundary policy**: periodic, zero-pad or NaN edge fill,
//!   selectable per grid instead of an accident of the backend
//! - **Checked invariants**: all six metrics must agree on one 2D shape,
//!   validated at load time
//!
//! ## Module Organization
//!
//! - [`grid`]: the [`grid::ModelGrid`] type, the gradient operator and
//!   tagged-configuration construction
//! - [`backends`]: the [`backends::GridBackend`] trait and its three
//!   implementations
//! - [`loader`]: backend kinds, chunk specifications and metric loading
//! - [`boundary`]: the boundary policy for differences at the domain edge
//! - [`metadata`]: coordinate file inspection
//! - [`parallel`]: Rayon thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nemogrid::prelude::*;
//! use ndarray::Array2;
//! use std::path::Path;
//!
//! // Open a grid with the dense backend
//! let grid = ModelGrid::open(Path::new("coordinates.nc"), DenseBackend::default()).unwrap();
//!
//! // Gradient of a field defined on the T grid
//! let sst = Array2::<f64>::zeros(grid.shape());
//! let (gx, gy) = grid.gradient(&sst).unwrap();
//!
//! // Or select the backend from configuration
//! let config = GridConfig::from_kind_str("chunked-from-file")
//!     .unwrap()
//!     .with_chunks(ChunkSpec::new(500, 500));
//! let grid = open_grid(Path::new("coordinates.nc"), config).unwrap();
//! ```

// Core modules
pub mod backends;
pub mod boundary;
pub mod errors;
pub mod grid;
pub mod loader;
pub mod metadata;
pub mod parallel;

// Direct re-exports for the public API
pub use boundary::BoundaryPolicy;
pub use errors::{GridError, Result};
pub use grid::{open_grid, AnyGrid, GridConfig, ModelGrid, HORIZONTAL_METRICS};
pub use loader::{BackendKind, ChunkSpec, GridArray, MetricLoader};

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::backends::chunked::{ChunkSource, ChunkedArray, ChunkedBackend};
    pub use crate::backends::dense::DenseBackend;
    pub use crate::backends::lazy::{LazyArray, LazyBackend};
    pub use crate::backends::GridBackend;
    pub use crate::boundary::BoundaryPolicy;
    pub use crate::errors::{GridError, Result};
    pub use crate::grid::{open_grid, AnyGrid, GridConfig, ModelGrid};
    pub use crate::loader::{BackendKind, ChunkSpec, GridArray, MetricLoader};
    pub use crate::parallel::ParallelConfig;
}
