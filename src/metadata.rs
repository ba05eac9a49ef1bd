//! Coordinate file inspection
//!
//! Helpers for checking what a NEMO coordinate file actually contains
//! before committing to a grid backend: which of the six horizontal metric
//! variables are present, their dimension names and shapes.

use crate::errors::Result;
use crate::grid::HORIZONTAL_METRICS;
use std::path::Path;

/// Dimensions and shape of one metric variable
#[derive(Debug, Clone)]
pub struct MetricInfo {
    pub name: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
}

/// Summary of the horizontal metrics found in a coordinate file
#[derive(Debug, Clone)]
pub struct CoordFileSummary {
    pub path: String,
    pub metrics: Vec<MetricInfo>,
    pub missing: Vec<String>,
}

impl CoordFileSummary {
    /// Whether all six horizontal metrics are present
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Print the summary to stdout
    pub fn print(&self) {
        println!("📂 Coordinate file: {}", self.path);
        println!("==============================");
        for metric in &self.metrics {
            println!(
                "   {} ({}) shape: ({})",
                metric.name,
                metric.dimensions.join(", "),
                metric
                    .shape
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(" × ")
            );
        }
        if self.missing.is_empty() {
            println!("✅ All horizontal metrics present");
        } else {
            println!("⚠ Missing metrics: [{}]", self.missing.join(", "));
        }
    }
}

/// Inspect a coordinate file for the six horizontal metric variables
///
/// Missing variables are reported in the summary rather than treated as an
/// error; a missing *file* still fails.
///
/// # Errors
///
/// Propagates the NetCDF error if the file cannot be opened.
pub fn summarize_coordfile(path: &Path) -> Result<CoordFileSummary> {
    let file = netcdf::open(path)?;

    let mut metrics = Vec::new();
    let mut missing = Vec::new();

    for name in HORIZONTAL_METRICS {
        match file.variable(name) {
            Some(var) => metrics.push(MetricInfo {
                name: name.to_string(),
                dimensions: var
                    .dimensions()
                    .iter()
                    .map(|d| d.name().to_string())
                    .collect(),
                shape: var.dimensions().iter().map(|d| d.len()).collect(),
            }),
            None => missing.push(name.to_string()),
        }
    }

    Ok(CoordFileSummary {
        path: path.display().to_string(),
        metrics,
        missing,
    })
}
