//! Metric loading from NetCDF coordinate files
//!
//! This module provides the loader used by every grid backend: given a file
//! path and a variable name it returns the variable in one of four array
//! representations (dense in-memory, chunked from a resident array, chunked
//! directly from the on-disk variable, or lazy and label-indexed). The
//! representation is fixed at loader construction and reused for every load
//! call.

use crate::backends::chunked::ChunkedArray;
use crate::backends::lazy::LazyArray;
use crate::errors::{GridError, Result};
use ndarray::{Array2, ArrayD, Ix2};
use std::path::Path;
use std::str::FromStr;

/// Which array representation a loader produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Read the full variable into a dense in-memory array
    Dense,

    /// Read the full variable into memory, then wrap it as a chunked array
    ChunkedFromDense,

    /// Chunked array over the on-disk variable, tiles read on demand
    ChunkedFromFile,

    /// Lazy label-indexed array; no data read until materialization
    Lazy,
}

impl BackendKind {
    /// Configuration-string name of this kind
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Dense => "dense",
            BackendKind::ChunkedFromDense => "chunked-from-dense",
            BackendKind::ChunkedFromFile => "chunked-from-file",
            BackendKind::Lazy => "lazy",
        }
    }
}

impl FromStr for BackendKind {
    type Err = GridError;

    /// Parse a backend kind from its configuration string
    ///
    /// # Errors
    ///
    /// Returns [`GridError::UnknownBackend`] for any unrecognized kind; there
    /// is no silent fallback.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dense" => Ok(BackendKind::Dense),
            "chunked-from-dense" => Ok(BackendKind::ChunkedFromDense),
            "chunked-from-file" => Ok(BackendKind::ChunkedFromFile),
            "lazy" => Ok(BackendKind::Lazy),
            other => Err(GridError::UnknownBackend {
                kind: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chunk sizes along the row (j) and column (i) axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    pub rows: usize,
    pub cols: usize,
}

impl ChunkSpec {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

impl Default for ChunkSpec {
    fn default() -> Self {
        Self {
            rows: 1000,
            cols: 1000,
        }
    }
}

/// A loaded variable in one of the supported array representations
#[derive(Debug, Clone)]
pub enum GridArray {
    Dense(Array2<f64>),
    Chunked(ChunkedArray),
    Lazy(LazyArray),
}

impl GridArray {
    /// The 2D shape of the variable, known without forcing evaluation
    pub fn shape(&self) -> (usize, usize) {
        match self {
            GridArray::Dense(a) => a.dim(),
            GridArray::Chunked(a) => a.shape(),
            GridArray::Lazy(a) => a.shape(),
        }
    }
}

/// Loader for horizontal metric variables
///
/// Immutable after construction: the backend kind and chunk specification
/// are fixed and reused for every `load` call.
#[derive(Debug, Clone)]
pub struct MetricLoader {
    kind: BackendKind,
    chunks: Option<ChunkSpec>,
}

impl MetricLoader {
    /// Create a loader for the given backend kind
    pub fn new(kind: BackendKind, chunks: Option<ChunkSpec>) -> Self {
        Self { kind, chunks }
    }

    /// Create a loader from a configuration string
    ///
    /// # Errors
    ///
    /// Returns [`GridError::UnknownBackend`] for an unrecognized kind.
    pub fn from_kind_str(kind: &str, chunks: Option<ChunkSpec>) -> Result<Self> {
        Ok(Self::new(kind.parse()?, chunks))
    }

    /// The configured backend kind
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Load a variable from `path` in the configured representation
    ///
    /// # Errors
    ///
    /// Propagates NetCDF errors for a missing file, and returns
    /// [`GridError::VariableNotFound`] when the variable is absent. I/O
    /// failures are fatal to the load call; there are no retries.
    pub fn load(&self, path: &Path, varname: &str) -> Result<GridArray> {
        let chunks = self.chunks.unwrap_or_default();
        match self.kind {
            BackendKind::Dense => Ok(GridArray::Dense(read_dense(path, varname)?)),
            BackendKind::ChunkedFromDense => {
                let data = read_dense(path, varname)?;
                Ok(GridArray::Chunked(ChunkedArray::from_array(data, chunks)))
            }
            BackendKind::ChunkedFromFile => Ok(GridArray::Chunked(ChunkedArray::from_file(
                path, varname, chunks,
            )?)),
            BackendKind::Lazy => Ok(GridArray::Lazy(LazyArray::open(path, varname, self.chunks)?)),
        }
    }
}

/// Layout of a NetCDF variable reduced to its two horizontal axes
///
/// Coordinate files often store metrics as `(t, y, x)` with a singleton time
/// axis; this records where the two non-singleton axes sit in the on-disk
/// shape, together with their dimension names.
#[derive(Debug, Clone)]
pub(crate) struct VarLayout {
    pub shape: Vec<usize>,
    pub row_axis: usize,
    pub col_axis: usize,
    pub row_dim: String,
    pub col_dim: String,
}

impl VarLayout {
    pub fn from_var(var: &netcdf::Variable, varname: &str) -> Result<Self> {
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let names: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();

        let horizontal: Vec<usize> = shape
            .iter()
            .enumerate()
            .filter_map(|(i, &len)| (len > 1).then(|| i))
            .collect();

        if horizontal.len() != 2 || shape.len() > 4 {
            return Err(GridError::NotTwoDimensional {
                var: varname.to_string(),
                shape,
            });
        }

        Ok(Self {
            row_axis: horizontal[0],
            col_axis: horizontal[1],
            row_dim: names[horizontal[0]].clone(),
            col_dim: names[horizontal[1]].clone(),
            shape,
        })
    }

    pub fn rows(&self) -> usize {
        self.shape[self.row_axis]
    }

    pub fn cols(&self) -> usize {
        self.shape[self.col_axis]
    }
}

/// Look up a variable, mapping absence to [`GridError::VariableNotFound`]
pub(crate) fn lookup_variable<'f>(
    file: &'f netcdf::File,
    varname: &str,
) -> Result<netcdf::Variable<'f>> {
    file.variable(varname)
        .ok_or_else(|| GridError::VariableNotFound {
            var: varname.to_string(),
        })
}

/// Read a full variable and squeeze it to a dense 2D array
pub(crate) fn read_dense(path: &Path, varname: &str) -> Result<Array2<f64>> {
    let file = netcdf::open(path)?;
    let var = lookup_variable(&file, varname)?;

    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let values = var.get_values::<f64, _>(..)?;
    let data = ArrayD::from_shape_vec(shape, values)?;

    squeeze_to_2d(data, varname)
}

/// Drop singleton axes and require exactly two dimensions to remain
pub(crate) fn squeeze_to_2d(data: ArrayD<f64>, varname: &str) -> Result<Array2<f64>> {
    let original_shape = data.shape().to_vec();
    let mut squeezed = data;

    let mut axis = 0;
    while axis < squeezed.ndim() {
        if squeezed.ndim() > 2 && squeezed.len_of(ndarray::Axis(axis)) == 1 {
            squeezed = squeezed.index_axis_move(ndarray::Axis(axis), 0);
        } else {
            axis += 1;
        }
    }

    squeezed
        .into_dimensionality::<Ix2>()
        .map_err(|_| GridError::NotTwoDimensional {
            var: varname.to_string(),
            shape: original_shape,
        })
}

/// Read a rectangular block of a variable's horizontal plane
///
/// `rows`/`cols` index the two horizontal axes of `layout`; any leading or
/// trailing singleton axes are pinned to index 0.
pub(crate) fn read_block(
    var: &netcdf::Variable,
    layout: &VarLayout,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
) -> Result<Array2<f64>> {
    let block_shape = (rows.len(), cols.len());
    let mut extents: Vec<std::ops::Range<usize>> = layout.shape.iter().map(|_| 0..1).collect();
    extents[layout.row_axis] = rows;
    extents[layout.col_axis] = cols;

    let values = match extents.len() {
        2 => var.get_values::<f64, _>((extents[0].clone(), extents[1].clone()))?,
        3 => var.get_values::<f64, _>((
            extents[0].clone(),
            extents[1].clone(),
            extents[2].clone(),
        ))?,
        4 => var.get_values::<f64, _>((
            extents[0].clone(),
            extents[1].clone(),
            extents[2].clone(),
            extents[3].clone(),
        ))?,
        _ => {
            return Err(GridError::NotTwoDimensional {
                var: var.name().to_string(),
                shape: layout.shape.clone(),
            })
        }
    };

    Ok(Array2::from_shape_vec(block_shape, values)?)
}
