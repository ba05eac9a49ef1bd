//! Model grid metrics and differential operators
//!
//! A [`ModelGrid`] owns the six horizontal metric terms of a NEMO-style
//! grid (cell widths in both directions at the T, U and V staggered
//! positions) and implements the staggered centered gradient on top of a
//! [`GridBackend`]. Metrics are loaded once at construction and are
//! immutable afterwards, so a grid can be shared freely between readers.
//!
//! Backends are selected either statically (instantiate `ModelGrid` with a
//! concrete backend) or through a tagged [`GridConfig`] via [`open_grid`],
//! which yields an [`AnyGrid`].

use crate::backends::chunked::{ChunkSource, ChunkedArray, ChunkedBackend};
use crate::backends::dense::DenseBackend;
use crate::backends::lazy::{LazyArray, LazyBackend};
use crate::backends::GridBackend;
use crate::boundary::BoundaryPolicy;
use crate::errors::{GridError, Result};
use crate::loader::{BackendKind, ChunkSpec};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// The six horizontal metric variables of a NEMO coordinate file
pub const HORIZONTAL_METRICS: [&str; 6] = ["e1t", "e2t", "e1u", "e2u", "e1v", "e2v"];

/// A grid with loaded horizontal metrics over backend `B`
#[derive(Debug, Clone)]
pub struct ModelGrid<B: GridBackend> {
    backend: B,
    coordfile: PathBuf,
    shape: (usize, usize),
    e1t: B::Array,
    e2t: B::Array,
    e1u: B::Array,
    e2u: B::Array,
    e1v: B::Array,
    e2v: B::Array,
}

impl<B: GridBackend> ModelGrid<B> {
    /// Load the six horizontal metrics from a coordinate file
    ///
    /// All six metrics must share one 2D shape; the grid transitions once,
    /// irrevocably, from unloaded to loaded here.
    ///
    /// # Errors
    ///
    /// Propagates load errors (missing file or variable) and returns
    /// [`GridError::ShapeMismatch`] if the metric shapes disagree.
    pub fn open(coordfile: &Path, backend: B) -> Result<Self> {
        let load = |var: &str| backend.load(coordfile, var);

        let e1t = load("e1t")?;
        let e2t = load("e2t")?;
        let e1u = load("e1u")?;
        let e2u = load("e2u")?;
        let e1v = load("e1v")?;
        let e2v = load("e2v")?;

        let shape = backend.shape(&e1t);
        for (name, metric) in [
            ("e2t", &e2t),
            ("e1u", &e1u),
            ("e2u", &e2u),
            ("e1v", &e1v),
            ("e2v", &e2v),
        ] {
            let actual = backend.shape(metric);
            if actual != shape {
                return Err(GridError::ShapeMismatch {
                    var: name.to_string(),
                    expected: shape,
                    actual,
                });
            }
        }

        Ok(Self {
            backend,
            coordfile: coordfile.to_path_buf(),
            shape,
            e1t,
            e2t,
            e1u,
            e2u,
            e1v,
            e2v,
        })
    }

    /// The common 2D shape of the metric arrays
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Path of the coordinate file the metrics were loaded from
    pub fn coordfile(&self) -> &Path {
        &self.coordfile
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn e1t(&self) -> &B::Array {
        &self.e1t
    }

    pub fn e2t(&self) -> &B::Array {
        &self.e2t
    }

    pub fn e1u(&self) -> &B::Array {
        &self.e1u
    }

    pub fn e2u(&self) -> &B::Array {
        &self.e2u
    }

    pub fn e1v(&self) -> &B::Array {
        &self.e1v
    }

    pub fn e2v(&self) -> &B::Array {
        &self.e2v
    }

    /// Staggered centered gradient of a scalar field
    ///
    /// Input is defined on the T (cell-centre) grid; the output pair is
    /// `(d_i q / e1u, d_j q / e2v)` on the U and V (cell-face) grids.
    /// Written only in terms of the backend's difference primitives, so
    /// evaluation semantics (eager or deferred) follow the backend.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] if the field shape differs from
    /// the grid shape, and propagates backend evaluation errors.
    pub fn gradient(&self, field: &B::Array) -> Result<(B::Array, B::Array)> {
        let actual = self.backend.shape(field);
        if actual != self.shape {
            return Err(GridError::ShapeMismatch {
                var: "field".to_string(),
                expected: self.shape,
                actual,
            });
        }

        let gx = self
            .backend
            .divide(&self.backend.diff_i(field)?, &self.e1u)?;
        let gy = self
            .backend
            .divide(&self.backend.diff_j(field)?, &self.e2v)?;
        Ok((gx, gy))
    }
}

/// Tagged configuration selecting a backend at run time
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub kind: BackendKind,
    pub chunks: Option<ChunkSpec>,
    pub boundary: Option<BoundaryPolicy>,
}

impl GridConfig {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            chunks: None,
            boundary: None,
        }
    }

    /// Parse the backend kind from a configuration string
    ///
    /// # Errors
    ///
    /// Returns [`GridError::UnknownBackend`] for an unrecognized kind.
    pub fn from_kind_str(kind: &str) -> Result<Self> {
        Ok(Self::new(kind.parse()?))
    }

    pub fn with_chunks(mut self, chunks: ChunkSpec) -> Self {
        self.chunks = Some(chunks);
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.boundary = Some(boundary);
        self
    }
}

/// A grid over any of the supported backends
#[derive(Debug, Clone)]
pub enum AnyGrid {
    Dense(ModelGrid<DenseBackend>),
    Chunked(ModelGrid<ChunkedBackend>),
    Lazy(ModelGrid<LazyBackend>),
}

/// Open a grid with the backend selected by `config`
///
/// When no boundary policy is configured each backend keeps its historical
/// default: periodic for dense, zero padding for chunked, NaN edge fill for
/// lazy.
///
/// # Errors
///
/// Propagates metric load errors and the shape-consistency check of
/// [`ModelGrid::open`].
pub fn open_grid(coordfile: &Path, config: GridConfig) -> Result<AnyGrid> {
    match config.kind {
        BackendKind::Dense => {
            let boundary = config.boundary.unwrap_or(BoundaryPolicy::Periodic);
            let grid = ModelGrid::open(coordfile, DenseBackend::new(boundary))?;
            Ok(AnyGrid::Dense(grid))
        }
        BackendKind::ChunkedFromDense | BackendKind::ChunkedFromFile => {
            let source = match config.kind {
                BackendKind::ChunkedFromDense => ChunkSource::Memory,
                _ => ChunkSource::File,
            };
            let boundary = config.boundary.unwrap_or(BoundaryPolicy::ZeroPad);
            let chunks = config.chunks.unwrap_or_default();
            let grid = ModelGrid::open(coordfile, ChunkedBackend::new(chunks, source, boundary))?;
            Ok(AnyGrid::Chunked(grid))
        }
        BackendKind::Lazy => {
            let boundary = config.boundary.unwrap_or(BoundaryPolicy::EdgeFill);
            let grid = ModelGrid::open(coordfile, LazyBackend::new(config.chunks, boundary))?;
            Ok(AnyGrid::Lazy(grid))
        }
    }
}

impl AnyGrid {
    /// The common 2D shape of the metric arrays
    pub fn shape(&self) -> (usize, usize) {
        match self {
            AnyGrid::Dense(g) => g.shape(),
            AnyGrid::Chunked(g) => g.shape(),
            AnyGrid::Lazy(g) => g.shape(),
        }
    }

    /// Gradient of a dense field, materialized regardless of backend
    ///
    /// Convenience for callers that hold plain arrays: the field is adapted
    /// to the variant's representation and the result is forced into dense
    /// arrays.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ModelGrid::gradient`] plus any materialization
    /// error of the backend.
    pub fn gradient_dense(&self, field: &Array2<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
        match self {
            AnyGrid::Dense(g) => {
                let (gx, gy) = g.gradient(field)?;
                Ok((gx, gy))
            }
            AnyGrid::Chunked(g) => {
                let wrapped = ChunkedArray::from_array(field.clone(), g.backend().chunks());
                let (gx, gy) = g.gradient(&wrapped)?;
                Ok((gx.to_dense()?, gy.to_dense()?))
            }
            AnyGrid::Lazy(g) => {
                let dims = g.e1u().dims();
                let wrapped =
                    LazyArray::from_array(field.clone(), [dims[0].as_str(), dims[1].as_str()]);
                let (gx, gy) = g.gradient(&wrapped)?;
                Ok((gx.materialize()?, gy.materialize()?))
            }
        }
    }
}
