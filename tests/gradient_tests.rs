//! Gradient operator tests across all grid backends
//!
//! Exercises grid construction from coordinate files and the staggered
//! centered gradient: constant fields, the unit impulse scenario,
//! cross-backend agreement and the lazy backend's deferred evaluation.

use ndarray::{Array2, Array3};
use netcdf::create;
use nemogrid::prelude::*;
use nemogrid::HORIZONTAL_METRICS;
use std::path::Path;
use tempfile::tempdir;

/// Write a coordinate file with constant metrics (value chosen per metric
/// name) stored as (t, y, x), plus a 2D field variable "sst"
fn create_coord_file(
    path: &Path,
    ny: usize,
    nx: usize,
    metric_value: impl Fn(&str) -> f64,
    sst: &Array2<f64>,
) -> Result<()> {
    let mut file = create(path)?;
    file.add_dimension("t", 1)?;
    file.add_dimension("y", ny)?;
    file.add_dimension("x", nx)?;

    for name in HORIZONTAL_METRICS {
        let mut var = file.add_variable::<f64>(name, &["t", "y", "x"])?;
        let data = Array3::from_elem((1, ny, nx), metric_value(name));
        var.put(data.view(), ..)?;
    }

    let mut var = file.add_variable::<f64>("sst", &["y", "x"])?;
    var.put(sst.view(), ..)?;

    Ok(())
}

/// A coordinate file with all six metrics equal to 1.0
fn create_unit_coord_file(path: &Path, ny: usize, nx: usize, sst: &Array2<f64>) -> Result<()> {
    create_coord_file(path, ny, nx, |_| 1.0, sst)
}

#[test]
fn test_grid_open_records_shape() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 10, 12, &Array2::zeros((10, 12)))?;

    let grid = ModelGrid::open(&path, DenseBackend::default())?;
    assert_eq!(grid.shape(), (10, 12));
    assert_eq!(grid.coordfile(), path.as_path());
    assert_eq!(grid.e1t().dim(), (10, 12));
    assert_eq!(grid.e2v().dim(), (10, 12));
    assert_eq!(grid.e1u()[[3, 4]], 1.0);

    Ok(())
}

#[test]
fn test_constant_field_zero_gradient_dense() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 10, 10, &Array2::zeros((10, 10)))?;

    let grid = ModelGrid::open(&path, DenseBackend::default())?;
    let field = Array2::from_elem((10, 10), 3.5);
    let (gx, gy) = grid.gradient(&field)?;

    // Periodic boundary: exactly zero everywhere, edges included
    assert!(gx.iter().all(|&v| v == 0.0));
    assert!(gy.iter().all(|&v| v == 0.0));

    Ok(())
}

#[test]
fn test_constant_field_zero_gradient_chunked() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 10, 10, &Array2::zeros((10, 10)))?;

    let backend = ChunkedBackend::new(
        ChunkSpec::new(4, 4),
        ChunkSource::File,
        BoundaryPolicy::ZeroPad,
    );
    let grid = ModelGrid::open(&path, backend)?;
    let field = ChunkedArray::from_array(Array2::from_elem((10, 10), 3.5), ChunkSpec::new(4, 4));
    let (gx, gy) = grid.gradient(&field)?;
    let gx = grid.backend().materialize(&gx)?;
    let gy = grid.backend().materialize(&gy)?;

    // Zero padding: interior is zero, the last column/row sees the pad
    for j in 0..10 {
        for i in 0..10 {
            if i < 9 {
                assert_eq!(gx[[j, i]], 0.0);
            } else {
                assert_eq!(gx[[j, i]], -3.5);
            }
            if j < 9 {
                assert_eq!(gy[[j, i]], 0.0);
            } else {
                assert_eq!(gy[[j, i]], -3.5);
            }
        }
    }

    Ok(())
}

#[test]
fn test_constant_field_zero_gradient_lazy() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 10, 10, &Array2::from_elem((10, 10), 3.5))?;

    let grid = ModelGrid::open(&path, LazyBackend::default())?;
    let field = LazyArray::open(&path, "sst", None)?;
    let (gx, gy) = grid.gradient(&field)?;
    let gx = gx.materialize()?;
    let gy = gy.materialize()?;

    // Edge fill: interior is zero, the last column/row is missing
    for j in 0..10 {
        for i in 0..10 {
            if i < 9 {
                assert_eq!(gx[[j, i]], 0.0);
            } else {
                assert!(gx[[j, i]].is_nan());
            }
            if j < 9 {
                assert_eq!(gy[[j, i]], 0.0);
            } else {
                assert!(gy[[j, i]].is_nan());
            }
        }
    }

    Ok(())
}

#[test]
fn test_impulse_gradient_dense() -> Result<()> {
    // Unit metrics of shape (10, 10), unit impulse at (5, 5): the gradient
    // is zero everywhere except the impulse cell and its forward
    // neighbours along each axis
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 10, 10, &Array2::zeros((10, 10)))?;

    let grid = ModelGrid::open(&path, DenseBackend::default())?;
    let mut field = Array2::zeros((10, 10));
    field[[5, 5]] = 1.0;
    let (gx, gy) = grid.gradient(&field)?;

    for j in 0..10 {
        for i in 0..10 {
            let expected_gx = match (j, i) {
                (5, 4) => 1.0,
                (5, 5) => -1.0,
                _ => 0.0,
            };
            let expected_gy = match (j, i) {
                (4, 5) => 1.0,
                (5, 5) => -1.0,
                _ => 0.0,
            };
            assert_eq!(gx[[j, i]], expected_gx, "gx at ({j},{i})");
            assert_eq!(gy[[j, i]], expected_gy, "gy at ({j},{i})");
        }
    }

    Ok(())
}

#[test]
fn test_impulse_gradient_scaled_metrics() -> Result<()> {
    // Differences are divided by e1u and e2v respectively
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    let metric_value = |name: &str| match name {
        "e1u" => 2.0,
        "e2v" => 4.0,
        _ => 1.0,
    };
    create_coord_file(&path, 10, 10, metric_value, &Array2::zeros((10, 10)))?;

    let grid = ModelGrid::open(&path, DenseBackend::default())?;
    let mut field = Array2::zeros((10, 10));
    field[[5, 5]] = 1.0;
    let (gx, gy) = grid.gradient(&field)?;

    assert_eq!(gx[[5, 4]], 0.5);
    assert_eq!(gx[[5, 5]], -0.5);
    assert_eq!(gy[[4, 5]], 0.25);
    assert_eq!(gy[[5, 5]], -0.25);

    Ok(())
}

#[test]
fn test_gradient_output_shapes_match_metrics() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 7, 11, &Array2::zeros((7, 11)))?;

    let grid = ModelGrid::open(&path, DenseBackend::default())?;
    let field = Array2::from_shape_fn((7, 11), |(j, i)| (j + 2 * i) as f64);
    let (gx, gy) = grid.gradient(&field)?;

    assert_eq!(gx.dim(), grid.e1u().dim());
    assert_eq!(gy.dim(), grid.e2v().dim());
    assert_eq!(gx.dim(), grid.shape());

    Ok(())
}

#[test]
fn test_lazy_gradient_defers_io() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    let sst = Array2::from_shape_fn((10, 10), |(j, i)| (j * 10 + i) as f64);
    create_unit_coord_file(&path, 10, 10, &sst)?;

    let grid = ModelGrid::open(&path, LazyBackend::default())?;
    let field = LazyArray::open(&path, "sst", None)?;

    // Building the gradient allocates expression nodes only
    let (gx, _gy) = grid.gradient(&field)?;
    assert!(gx.node_count() >= 5);
    assert_eq!(gx.shape(), (10, 10));

    // With the backing file gone, graph construction still succeeds:
    // nothing before materialize touches the data
    std::fs::remove_file(&path)?;
    let (gx, gy) = grid.gradient(&field)?;
    assert!(gx.materialize().is_err());
    assert!(gy.materialize().is_err());

    Ok(())
}

#[test]
fn test_all_backends_agree_under_one_policy() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 10, 10, &Array2::zeros((10, 10)))?;

    let field = Array2::from_shape_fn((10, 10), |(j, i)| ((j * j) as f64) * 0.5 - (i as f64));

    let dense_grid = open_grid(
        &path,
        GridConfig::new(BackendKind::Dense).with_boundary(BoundaryPolicy::ZeroPad),
    )?;
    let (expected_gx, expected_gy) = dense_grid.gradient_dense(&field)?;

    for kind in [
        BackendKind::ChunkedFromDense,
        BackendKind::ChunkedFromFile,
        BackendKind::Lazy,
    ] {
        let config = GridConfig::new(kind)
            .with_chunks(ChunkSpec::new(3, 4))
            .with_boundary(BoundaryPolicy::ZeroPad);
        let grid = open_grid(&path, config)?;
        let (gx, gy) = grid.gradient_dense(&field)?;

        for j in 0..10 {
            for i in 0..10 {
                assert_eq!(gx[[j, i]], expected_gx[[j, i]], "{} gx at ({j},{i})", kind);
                assert_eq!(gy[[j, i]], expected_gy[[j, i]], "{} gy at ({j},{i})", kind);
            }
        }
    }

    Ok(())
}

#[test]
fn test_open_grid_selects_variant() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 6, 6, &Array2::zeros((6, 6)))?;

    let grid = open_grid(&path, GridConfig::new(BackendKind::Dense))?;
    assert!(matches!(grid, AnyGrid::Dense(_)));
    assert_eq!(grid.shape(), (6, 6));

    let grid = open_grid(&path, GridConfig::new(BackendKind::ChunkedFromFile))?;
    assert!(matches!(grid, AnyGrid::Chunked(_)));

    let grid = open_grid(&path, GridConfig::new(BackendKind::Lazy))?;
    assert!(matches!(grid, AnyGrid::Lazy(_)));

    Ok(())
}

#[test]
fn test_metric_shape_mismatch_detected_at_open() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("broken.nc");

    {
        let mut file = create(&path)?;
        file.add_dimension("y", 5)?;
        file.add_dimension("y2", 6)?;
        file.add_dimension("x", 5)?;

        for name in HORIZONTAL_METRICS {
            let dims: [&str; 2] = if name == "e2v" { ["y2", "x"] } else { ["y", "x"] };
            let rows = if name == "e2v" { 6 } else { 5 };
            let mut var = file.add_variable::<f64>(name, &dims)?;
            var.put(Array2::from_elem((rows, 5), 1.0).view(), ..)?;
        }
    }

    let result = ModelGrid::open(&path, DenseBackend::default());
    match result {
        Err(GridError::ShapeMismatch {
            var,
            expected,
            actual,
        }) => {
            assert_eq!(var, "e2v");
            assert_eq!(expected, (5, 5));
            assert_eq!(actual, (6, 5));
        }
        other => panic!("Expected ShapeMismatch, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_missing_metric_variable_fails_open() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("partial.nc");

    {
        let mut file = create(&path)?;
        file.add_dimension("y", 4)?;
        file.add_dimension("x", 4)?;
        for name in HORIZONTAL_METRICS.iter().filter(|&&n| n != "e2u") {
            let mut var = file.add_variable::<f64>(name, &["y", "x"])?;
            var.put(Array2::from_elem((4, 4), 1.0).view(), ..)?;
        }
    }

    let result = ModelGrid::open(&path, DenseBackend::default());
    match result {
        Err(GridError::VariableNotFound { var }) => assert_eq!(var, "e2u"),
        other => panic!("Expected VariableNotFound, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_field_shape_mismatch_rejected() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 8, 8, &Array2::zeros((8, 8)))?;

    let grid = ModelGrid::open(&path, DenseBackend::default())?;
    let field = Array2::zeros((8, 9));
    let result = grid.gradient(&field);
    match result {
        Err(GridError::ShapeMismatch { var, .. }) => assert_eq!(var, "field"),
        other => panic!("Expected ShapeMismatch, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_grid_is_shareable_across_threads() -> Result<()> {
    // Metrics are set once at construction and never mutated, so
    // concurrent gradient calls need no locking
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("coords.nc");
    create_unit_coord_file(&path, 10, 10, &Array2::zeros((10, 10)))?;

    let grid = ModelGrid::open(&path, DenseBackend::default())?;
    let field = Array2::from_shape_fn((10, 10), |(j, i)| (j + i) as f64);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| grid.gradient(&field).map(|(gx, _)| gx)))
            .collect();
        for handle in handles {
            let gx = handle.join().expect("thread panicked")?;
            assert_eq!(gx.dim(), (10, 10));
        }
        Ok::<_, GridError>(())
    })?;

    Ok(())
}
