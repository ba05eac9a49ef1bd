//! Chunked-parallel backend
//!
//! A [`ChunkedArray`] splits a 2D variable into tiles according to a
//! [`ChunkSpec`]. Its core operation, [`ChunkedArray::map_overlap`], extends
//! every tile by a halo of neighbouring values, applies an operator to each
//! padded tile on the rayon thread pool, trims the halo and reassembles the
//! result. Halo values past the domain edge follow the configured
//! [`BoundaryPolicy`].
//!
//! Tiles can be sourced from a resident in-memory array or directly from
//! the on-disk NetCDF variable. File-backed tile reads happen sequentially
//! up front (the NetCDF layer is not thread-safe); rayon parallelism covers
//! tile evaluation only.
//!
//! Every difference call forces evaluation: the caller always receives a
//! concrete array, never a pending computation.

use super::{forward_diff, GridBackend};
use crate::boundary::BoundaryPolicy;
use crate::errors::{GridError, Result};
use crate::loader::{lookup_variable, read_block, read_dense, ChunkSpec, VarLayout};
use ndarray::{s, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Where tile data comes from
#[derive(Debug, Clone)]
enum ChunkStore {
    /// Fully materialized in memory; parallelism is logical only
    Resident(Array2<f64>),

    /// Backed by an on-disk variable, tiles read on demand
    File {
        path: PathBuf,
        varname: String,
        layout: VarLayout,
    },
}

/// A 2D array evaluated tile by tile
#[derive(Debug, Clone)]
pub struct ChunkedArray {
    store: ChunkStore,
    chunks: ChunkSpec,
    shape: (usize, usize),
}

/// Extent of one tile within the domain
#[derive(Debug, Clone, Copy)]
struct Tile {
    r0: usize,
    r1: usize,
    c0: usize,
    c1: usize,
}

impl ChunkedArray {
    /// Wrap an already-resident array with a chunk specification
    pub fn from_array(data: Array2<f64>, chunks: ChunkSpec) -> Self {
        let shape = data.dim();
        Self {
            store: ChunkStore::Resident(data),
            chunks,
            shape,
        }
    }

    /// Build a chunked array over an on-disk variable without materializing
    /// it; only dimension metadata is read here
    ///
    /// # Errors
    ///
    /// Propagates NetCDF errors for a missing file and returns
    /// [`GridError::VariableNotFound`] when the variable is absent.
    pub fn from_file(path: &Path, varname: &str, chunks: ChunkSpec) -> Result<Self> {
        let file = netcdf::open(path)?;
        let var = lookup_variable(&file, varname)?;
        let layout = VarLayout::from_var(&var, varname)?;
        let shape = (layout.rows(), layout.cols());

        Ok(Self {
            store: ChunkStore::File {
                path: path.to_path_buf(),
                varname: varname.to_string(),
                layout,
            },
            chunks,
            shape,
        })
    }

    /// An all-zero resident chunked array
    pub fn zeros(shape: (usize, usize), chunks: ChunkSpec) -> Self {
        Self::from_array(Array2::zeros(shape), chunks)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn chunks(&self) -> ChunkSpec {
        self.chunks
    }

    /// Materialize the full array in memory
    pub fn to_dense(&self) -> Result<Array2<f64>> {
        match &self.store {
            ChunkStore::Resident(data) => Ok(data.clone()),
            ChunkStore::File { path, varname, .. } => read_dense(path, varname),
        }
    }

    /// Apply `f` to every tile extended by `depth` halo cells per side,
    /// trim the halos and reassemble
    ///
    /// Halo values come from neighbouring tiles; past the domain edge the
    /// boundary policy decides (wraparound, zero, or NaN). Evaluation is
    /// forced: the returned array is resident.
    pub fn map_overlap<F>(&self, f: F, depth: usize, boundary: BoundaryPolicy) -> Result<ChunkedArray>
    where
        F: Fn(ArrayView2<f64>) -> Result<Array2<f64>> + Sync,
    {
        let (ny, nx) = self.shape;
        let tiles = self.tiles();
        let padded = self.read_padded_tiles(&tiles, depth, boundary)?;

        let results: Vec<Array2<f64>> = padded
            .par_iter()
            .map(|block| f(block.view()))
            .collect::<Result<Vec<_>>>()?;

        let mut out = Array2::zeros((ny, nx));
        for (tile, result) in tiles.iter().zip(&results) {
            let (h, w) = (tile.r1 - tile.r0, tile.c1 - tile.c0);
            out.slice_mut(s![tile.r0..tile.r1, tile.c0..tile.c1])
                .assign(&result.slice(s![depth..depth + h, depth..depth + w]));
        }

        Ok(ChunkedArray::from_array(out, self.chunks))
    }

    fn tiles(&self) -> Vec<Tile> {
        let (ny, nx) = self.shape;
        let rows = self.chunks.rows.max(1);
        let cols = self.chunks.cols.max(1);

        let mut tiles = Vec::new();
        for r0 in (0..ny).step_by(rows) {
            for c0 in (0..nx).step_by(cols) {
                tiles.push(Tile {
                    r0,
                    r1: (r0 + rows).min(ny),
                    c0,
                    c1: (c0 + cols).min(nx),
                });
            }
        }
        tiles
    }

    /// Read each tile with its halo, sequentially
    fn read_padded_tiles(
        &self,
        tiles: &[Tile],
        depth: usize,
        boundary: BoundaryPolicy,
    ) -> Result<Vec<Array2<f64>>> {
        match &self.store {
            ChunkStore::Resident(data) => tiles
                .iter()
                .map(|tile| {
                    assemble_padded(*tile, depth, boundary, self.shape, &mut |rows, cols| {
                        Ok(data.slice(s![rows, cols]).to_owned())
                    })
                })
                .collect(),
            ChunkStore::File {
                path,
                varname,
                layout,
            } => {
                let file = netcdf::open(path)?;
                let var = lookup_variable(&file, varname)?;
                tiles
                    .iter()
                    .map(|tile| {
                        assemble_padded(*tile, depth, boundary, self.shape, &mut |rows, cols| {
                            read_block(&var, layout, rows, cols)
                        })
                    })
                    .collect()
            }
        }
    }
}

/// Build one padded tile, pulling in-domain pieces through `read`
///
/// Out-of-domain cells keep the policy's fill value; for the periodic
/// policy every cell maps back into the domain, possibly in several
/// wrapped segments per axis.
fn assemble_padded(
    tile: Tile,
    depth: usize,
    boundary: BoundaryPolicy,
    shape: (usize, usize),
    read: &mut dyn FnMut(Range<usize>, Range<usize>) -> Result<Array2<f64>>,
) -> Result<Array2<f64>> {
    let (ny, nx) = shape;
    let d = depth as isize;
    let h = tile.r1 - tile.r0 + 2 * depth;
    let w = tile.c1 - tile.c0 + 2 * depth;
    let periodic = boundary == BoundaryPolicy::Periodic;

    let mut padded = Array2::from_elem((h, w), boundary.fill_value());

    let row_segs = axis_segments(tile.r0 as isize - d, tile.r1 as isize + d, ny, periodic);
    let col_segs = axis_segments(tile.c0 as isize - d, tile.c1 as isize + d, nx, periodic);

    for (row_off, row_range) in &row_segs {
        for (col_off, col_range) in &col_segs {
            let block = read(row_range.clone(), col_range.clone())?;
            padded
                .slice_mut(s![
                    *row_off..*row_off + row_range.len(),
                    *col_off..*col_off + col_range.len()
                ])
                .assign(&block);
        }
    }

    Ok(padded)
}

/// Split the padded extent `[start, end)` into contiguous in-domain runs
///
/// Returns `(offset into the padded extent, domain index range)` pairs.
/// Without periodicity the extent is clipped to the domain (at most one
/// run); with periodicity indices wrap, one run per crossing of the domain
/// edge.
fn axis_segments(
    start: isize,
    end: isize,
    len: usize,
    periodic: bool,
) -> Vec<(usize, Range<usize>)> {
    let n = len as isize;
    if n == 0 {
        return Vec::new();
    }

    if !periodic {
        let lo = start.max(0);
        let hi = end.min(n);
        if lo >= hi {
            return Vec::new();
        }
        return vec![((lo - start) as usize, lo as usize..hi as usize)];
    }

    let mut segments = Vec::new();
    let mut pos = start;
    while pos < end {
        let wrapped = pos.rem_euclid(n);
        let run = (end - pos).min(n - wrapped);
        segments.push((
            (pos - start) as usize,
            wrapped as usize..(wrapped + run) as usize,
        ));
        pos += run;
    }
    segments
}

/// Whether the chunked loader materializes the variable before chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSource {
    /// Read the full variable into memory, then chunk it
    Memory,

    /// Chunk the on-disk variable directly
    File,
}

/// Backend evaluating differences tile by tile on the rayon pool
#[derive(Debug, Clone, Copy)]
pub struct ChunkedBackend {
    chunks: ChunkSpec,
    source: ChunkSource,
    boundary: BoundaryPolicy,
}

/// Halo width needed by the forward difference
const DIFF_DEPTH: usize = 1;

impl ChunkedBackend {
    pub fn new(chunks: ChunkSpec, source: ChunkSource, boundary: BoundaryPolicy) -> Self {
        Self {
            chunks,
            source,
            boundary,
        }
    }

    pub fn chunks(&self) -> ChunkSpec {
        self.chunks
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    fn diff(&self, q: &ChunkedArray, axis: Axis) -> Result<ChunkedArray> {
        // Within a padded tile the correct neighbour values sit in the
        // halo, so a plain wrapping shift is enough: the only cells whose
        // neighbour wraps around the tile are halo cells, trimmed after
        // evaluation.
        q.map_overlap(
            |block| forward_diff(&block, axis, BoundaryPolicy::Periodic),
            DIFF_DEPTH,
            self.boundary,
        )
    }
}

impl Default for ChunkedBackend {
    /// File-sourced tiles with zero padding at the domain edge, the
    /// historical chunked-array behaviour
    fn default() -> Self {
        Self::new(ChunkSpec::default(), ChunkSource::File, BoundaryPolicy::ZeroPad)
    }
}

impl GridBackend for ChunkedBackend {
    type Array = ChunkedArray;

    fn load(&self, path: &Path, varname: &str) -> Result<ChunkedArray> {
        match self.source {
            ChunkSource::Memory => Ok(ChunkedArray::from_array(
                read_dense(path, varname)?,
                self.chunks,
            )),
            ChunkSource::File => ChunkedArray::from_file(path, varname, self.chunks),
        }
    }

    fn diff_i(&self, q: &ChunkedArray) -> Result<ChunkedArray> {
        self.diff(q, Axis(1))
    }

    fn diff_j(&self, q: &ChunkedArray) -> Result<ChunkedArray> {
        self.diff(q, Axis(0))
    }

    fn divide(&self, num: &ChunkedArray, den: &ChunkedArray) -> Result<ChunkedArray> {
        if num.shape() != den.shape() {
            return Err(GridError::ShapeMismatch {
                var: "divide".to_string(),
                expected: num.shape(),
                actual: den.shape(),
            });
        }
        let num = num.to_dense()?;
        let den = den.to_dense()?;
        Ok(ChunkedArray::from_array(&num / &den, self.chunks))
    }

    fn zeros(&self, shape: (usize, usize)) -> ChunkedArray {
        ChunkedArray::zeros(shape, self.chunks)
    }

    fn shape(&self, a: &ChunkedArray) -> (usize, usize) {
        a.shape()
    }

    fn materialize(&self, a: &ChunkedArray) -> Result<Array2<f64>> {
        a.to_dense()
    }
}
