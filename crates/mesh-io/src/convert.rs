//! Mesh → dataset conversion.
//!
//! Every mesh variant becomes a [`Dataset`] with `x`, `y`, `z` coordinate
//! variables and one data variable per field. Field arrays are laid out
//! `(z, y, x)` so that their C-order flattening is the mesh's x-fastest
//! point (or cell) order. Cell data also gets `x_cell`, `y_cell`, `z_cell`
//! coordinates holding the cell centers.

use ndarray::{Array1, ArrayD, IxDyn};

use cf_mesh::{
    Buffer, DataLocation, Mesh, MeshGeometry, RectilinearGrid, StructuredGrid, UniformGrid,
};
use mesh_common::{Dataset, MeshError, MeshResult, Variable};

use crate::DATA_COPY_TARGET;

/// Convert a mesh into a labeled dataset.
///
/// Rectilinear coordinates and contiguous shared fields keep sharing memory
/// with the mesh. Uniform coordinates are generated. Structured points are
/// copied into per-axis arrays.
pub fn mesh_to_dataset(mesh: &Mesh) -> MeshResult<Dataset> {
    let dataset = match &mesh.geometry {
        MeshGeometry::Uniform(grid) => uniform_to_dataset(mesh, grid)?,
        MeshGeometry::Rectilinear(grid) => rectilinear_to_dataset(mesh, grid)?,
        MeshGeometry::Structured(grid) => structured_to_dataset(mesh, grid)?,
    };
    Ok(dataset
        .with_attr("mesh_kind", mesh.kind().as_str())
        .with_attr("data_location", mesh.data_location.as_str()))
}

fn uniform_to_dataset(mesh: &Mesh, grid: &UniformGrid) -> MeshResult<Dataset> {
    let mut dataset = Dataset::new();
    for (axis, name) in ["x", "y", "z"].into_iter().enumerate() {
        let values = grid.axis_coordinates(axis).to_vec();
        dataset.add_coord(Variable::coordinate(name, values))?;
    }
    if mesh.data_location == DataLocation::CellData {
        let [nx, ny, nz] = grid.extent.dimensions();
        for (axis, n) in [nx, ny, nz].into_iter().enumerate() {
            let centers = (0..n.saturating_sub(1).max(1))
                .map(|i| {
                    let offset = if n > 1 { i as f64 + 0.5 } else { 0.0 };
                    grid.origin[axis] + offset * grid.spacing[axis]
                })
                .collect();
            dataset.add_coord(Variable::coordinate(cell_name(axis), centers))?;
        }
    }
    add_fields(&mut dataset, mesh, ["z", "y", "x"])?;
    Ok(dataset)
}

fn cell_name(axis: usize) -> &'static str {
    ["x_cell", "y_cell", "z_cell"][axis]
}

fn rectilinear_to_dataset(mesh: &Mesh, grid: &RectilinearGrid) -> MeshResult<Dataset> {
    let mut dataset = Dataset::new();
    for (axis, name) in ["x", "y", "z"].into_iter().enumerate() {
        let values = grid.axis(axis).clone().into_shared().into_dyn();
        dataset.add_coord(Variable::from_shared(name, vec![name.to_string()], values)?)?;
    }
    if mesh.data_location == DataLocation::CellData {
        for axis in 0..3 {
            let bounds = grid.axis(axis).view();
            let centers = if bounds.len() > 1 {
                bounds.windows(2).into_iter().map(|w| 0.5 * (w[0] + w[1])).collect()
            } else {
                bounds.to_vec()
            };
            dataset.add_coord(Variable::coordinate(cell_name(axis), centers))?;
        }
    }
    add_fields(&mut dataset, mesh, ["z", "y", "x"])?;
    Ok(dataset)
}

fn structured_to_dataset(mesh: &Mesh, grid: &StructuredGrid) -> MeshResult<Dataset> {
    tracing::warn!(
        target: DATA_COPY_TARGET,
        points = grid.points.nrows(),
        "Structured grid conversion duplicates data; coordinates are not shared with the mesh"
    );

    let [nx, ny, nz] = grid.extent.dimensions();
    let dims = vec!["zi".to_string(), "yi".to_string(), "xi".to_string()];
    let mut dataset = Dataset::new();
    for (axis, name) in ["x", "y", "z"].into_iter().enumerate() {
        let values = grid
            .points
            .column(axis)
            .to_owned()
            .into_shape_with_order(IxDyn(&[nz, ny, nx]))?;
        dataset.add_coord(Variable::new(name, dims.clone(), values)?)?;
    }
    if mesh.data_location == DataLocation::CellData {
        let cell_dims: Vec<String> = dims.iter().map(|d| format!("{}_cell", d)).collect();
        for axis in 0..3 {
            let centers = structured_cell_centers(grid, axis)?;
            dataset.add_coord(Variable::new(cell_name(axis), cell_dims.clone(), centers)?)?;
        }
    }
    add_fields(&mut dataset, mesh, ["zi", "yi", "xi"])?;
    Ok(dataset)
}

/// Mean of each cell's corner points along one axis, shaped `(zc, yc, xc)`.
fn structured_cell_centers(grid: &StructuredGrid, axis: usize) -> MeshResult<ArrayD<f64>> {
    let [nx, ny, nz] = grid.extent.dimensions();
    let cells = |n: usize| n.saturating_sub(1).max(1);
    let corners = |n: usize| if n > 1 { 2 } else { 1 };
    let (cx, cy, cz) = (cells(nx), cells(ny), cells(nz));
    let count = (corners(nx) * corners(ny) * corners(nz)) as f64;

    let mut centers = Vec::with_capacity(cx * cy * cz);
    for k in 0..cz {
        for j in 0..cy {
            for i in 0..cx {
                let mut sum = 0.0;
                for dk in 0..corners(nz) {
                    for dj in 0..corners(ny) {
                        for di in 0..corners(nx) {
                            let index = grid.point_index(i + di, j + dj, k + dk);
                            sum += grid.points[[index, axis]];
                        }
                    }
                }
                centers.push(sum / count);
            }
        }
    }
    Ok(ArrayD::from_shape_vec(IxDyn(&[cz, cy, cx]), centers)?)
}

/// Add every mesh field as a `(z, y, x)` data variable.
///
/// Cell data uses `<name>_cell` dimensions, one shorter than the point
/// dimensions (flat axes stay 1). A field holding a whole multiple of the
/// expected length gains a trailing `component` dimension.
fn add_fields(dataset: &mut Dataset, mesh: &Mesh, names: [&str; 3]) -> MeshResult<()> {
    let [nx, ny, nz] = mesh.dimensions();
    let (shape, dims): (Vec<usize>, Vec<String>) = match mesh.data_location {
        DataLocation::PointData => (
            vec![nz, ny, nx],
            names.iter().map(|n| n.to_string()).collect(),
        ),
        DataLocation::CellData => (
            [nz, ny, nx].iter().map(|n| n.saturating_sub(1).max(1)).collect(),
            names.iter().map(|n| format!("{}_cell", n)).collect(),
        ),
    };

    let expected: usize = shape.iter().product();
    for (name, buffer) in &mesh.fields {
        let len = buffer.len();
        if expected == 0 || len % expected != 0 {
            return Err(MeshError::invalid_metadata(format!(
                "field '{}' has {} values for {} {}",
                name, len, expected, mesh.data_location
            )));
        }

        let mut field_shape = shape.clone();
        let mut field_dims = dims.clone();
        if len > expected {
            field_shape.push(len / expected);
            field_dims.push("component".to_string());
        }
        let data = reshape(buffer, &field_shape)?;
        dataset.add_data_var(Variable::from_shared(name.clone(), field_dims, data)?)?;
    }
    Ok(())
}

/// Reshape a flat buffer, sharing it when it is contiguous.
fn reshape(buffer: &Buffer, shape: &[usize]) -> MeshResult<ndarray::ArcArray<f64, IxDyn>> {
    match buffer {
        Buffer::Shared(values) if values.is_standard_layout() => {
            Ok(values.clone().into_shape_with_order(IxDyn(shape))?)
        }
        _ => Ok(ArrayD::from_shape_vec(IxDyn(shape), buffer.to_vec())?.into_shared()),
    }
}

/// Expand a uniform grid into a rectilinear grid with explicit axes.
///
/// Fields are carried across as-is, so shared payloads stay shared.
pub fn image_to_rectilinear(mesh: &Mesh) -> MeshResult<Mesh> {
    let grid = match &mesh.geometry {
        MeshGeometry::Uniform(grid) => grid,
        other => {
            return Err(MeshError::not_supported(format!(
                "image to rectilinear conversion of a {} grid",
                other.kind()
            )))
        }
    };

    let axis = |i: usize| Buffer::Owned(Array1::from(grid.axis_coordinates(i).to_vec()));
    let rectilinear = RectilinearGrid {
        x: axis(0),
        y: axis(1),
        z: axis(2),
        extent: grid.extent,
    };

    let mut output = Mesh::new(MeshGeometry::Rectilinear(rectilinear), mesh.data_location);
    output.fields = mesh.fields.clone();
    Ok(output)
}
