//! Centralized error handling for nemogrid
//!
//! This module provides structured error types so that configuration
//! mistakes, missing data and inconsistent coordinate files surface with
//! useful context instead of a generic `Box<dyn Error>`.

use std::fmt;

/// Main error type for nemogrid operations
#[derive(Debug)]
pub enum GridError {
    /// NetCDF file operation errors, propagated unchanged
    NetCDF(netcdf::Error),

    /// I/O operation errors
    Io(std::io::Error),

    /// Variable not found in a coordinate file
    VariableNotFound { var: String },

    /// Unrecognized backend kind supplied to the loader configuration
    UnknownBackend { kind: String },

    /// Metric or field arrays with inconsistent shapes
    ShapeMismatch {
        var: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A variable that does not reduce to two dimensions after squeezing
    /// singleton axes
    NotTwoDimensional { var: String, shape: Vec<usize> },

    /// Label-based shift along a dimension name the array does not carry
    DimensionNotFound { dim: String, dims: Vec<String> },

    /// Thread pool configuration error
    ThreadPool(String),

    /// Array shape or dimension error from ndarray
    Shape(ndarray::ShapeError),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::NetCDF(e) => write!(f, "NetCDF error: {}", e),
            GridError::Io(e) => write!(f, "I/O error: {}", e),
            GridError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in file", var)
            }
            GridError::UnknownBackend { kind } => write!(
                f,
                "Unknown backend kind '{}' (expected one of: dense, \
                 chunked-from-dense, chunked-from-file, lazy)",
                kind
            ),
            GridError::ShapeMismatch {
                var,
                expected,
                actual,
            } => write!(
                f,
                "Shape mismatch for '{}': expected {:?}, got {:?}",
                var, expected, actual
            ),
            GridError::NotTwoDimensional { var, shape } => write!(
                f,
                "Variable '{}' is not two-dimensional after squeezing (shape {:?})",
                var, shape
            ),
            GridError::DimensionNotFound { dim, dims } => write!(
                f,
                "Dimension '{}' not found (array dimensions: [{}])",
                dim,
                dims.join(", ")
            ),
            GridError::ThreadPool(msg) => write!(f, "Thread pool error: {}", msg),
            GridError::Shape(e) => write!(f, "Array error: {}", e),
        }
    }
}

impl std::error::Error for GridError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GridError::NetCDF(e) => Some(e),
            GridError::Io(e) => Some(e),
            GridError::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for GridError {
    fn from(error: netcdf::Error) -> Self {
        GridError::NetCDF(error)
    }
}

impl From<std::io::Error> for GridError {
    fn from(error: std::io::Error) -> Self {
        GridError::Io(error)
    }
}

impl From<ndarray::ShapeError> for GridError {
    fn from(error: ndarray::ShapeError) -> Self {
        GridError::Shape(error)
    }
}

/// Result type alias for nemogrid operations
pub type Result<T> = std::result::Result<T, GridError>;
