//! Structured (explicit point) grid generators.
//!
//! Points are laid out k-outer, j-middle, i-inner. Each point is computed
//! independently, so the fill runs on the rayon pool when the configuration
//! allows it.

use ndarray::{Array1, Array2, ArrayViewMut1, Zip};

use mesh_common::{AxisWindow, MeshError, MeshResult};

use crate::config::MeshConfig;
use crate::coords::convert::point_insert;
use crate::coords::index_mapping::{CoordMapper, IndexMapper};
use crate::coords::parametric::{FormulaExtent, ParametricFormula};
use crate::coords::slicing::SlicedAxis;
use crate::coords::uniform::axis_point_bounds;
use crate::mesh::MeshContext;
use crate::types::{DataLocation, Extent, Mesh, MeshGeometry, StructuredGrid};

/// Geographic role of a mesh axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    Longitude,
    Latitude,
    Vertical,
    Unused,
}

/// Role of each mesh axis (x, y, z), following the reversed storage order.
///
/// An active dimension that is neither longitude nor latitude stands in for
/// the vertical when no vertical coordinate was found.
fn components(ctx: &MeshContext<'_>) -> [Component; 3] {
    let is = |dim: &str, role: &Option<String>| role.as_deref() == Some(dim);
    let mut components = [Component::Unused; 3];
    for (axis, dim) in ctx.dimensions.iter().rev().enumerate().take(3) {
        components[axis] = if is(dim, &ctx.roles.longitude) {
            Component::Longitude
        } else if is(dim, &ctx.roles.latitude) {
            Component::Latitude
        } else if is(dim, &ctx.roles.vertical) {
            Component::Vertical
        } else {
            Component::Unused
        };
    }

    if !components.contains(&Component::Vertical) {
        let stand_in = ctx
            .dimensions
            .iter()
            .rev()
            .take(3)
            .enumerate()
            .find(|(axis, _)| components[*axis] == Component::Unused)
            .map(|(axis, _)| axis);
        if let Some(axis) = stand_in {
            components[axis] = Component::Vertical;
        }
    }
    components
}

/// Point from per-axis values, routed through each axis's role.
#[inline]
fn to_point(config: &MeshConfig, components: &[Component; 3], values: [f64; 3]) -> [f64; 3] {
    let (mut lon, mut lat, mut z) = (0.0, 0.0, 0.0);
    for (component, value) in components.iter().zip(values) {
        match component {
            Component::Longitude => lon = value,
            Component::Latitude => lat = value,
            Component::Vertical => z = value,
            Component::Unused => {}
        }
    }
    point_insert(config.spherical, lon, lat, config.adjust_vertical(z))
}

/// Fill an `(n_points, 3)` array, `point(i, j, k)` giving each row.
fn fill_points<F>(extent: &Extent, parallel: bool, point: F) -> Array2<f64>
where
    F: Fn(usize, usize, usize) -> [f64; 3] + Sync,
{
    let [nx, ny, nz] = extent.dimensions();
    let mut points = Array2::zeros((nx * ny * nz, 3));
    if points.is_empty() {
        return points;
    }

    let fill = |index: usize, mut row: ArrayViewMut1<'_, f64>| {
        let i = index % nx;
        let j = (index / nx) % ny;
        let k = index / (nx * ny);
        let p = point(i, j, k);
        row[0] = p[0];
        row[1] = p[1];
        row[2] = p[2];
    };

    if parallel {
        tracing::debug!(
            points = points.nrows(),
            threads = rayon::current_num_threads(),
            "Filling structured points in parallel"
        );
        Zip::indexed(points.rows_mut()).par_for_each(fill);
    } else {
        Zip::indexed(points.rows_mut()).for_each(fill);
    }
    points
}

fn structured(points: Array2<f64>, extent: Extent, location: DataLocation) -> Mesh {
    Mesh::new(
        MeshGeometry::Structured(StructuredGrid { points, extent }),
        location,
    )
}

/// Structured cells from explicit coordinate bounds.
pub fn generate_bound_cells(ctx: &MeshContext<'_>) -> MeshResult<Mesh> {
    Err(MeshError::not_supported(format!(
        "structured grid from the cell bounds of '{}' and '{}'",
        ctx.roles.longitude.as_deref().unwrap_or("?"),
        ctx.roles.latitude.as_deref().unwrap_or("?"),
    )))
}

/// Structured grid whose cells are centered on uniformly spaced 1-D
/// coordinates. Point coordinates are the cell boundaries; data lives on cells.
pub fn generate_uniform_cells(ctx: &MeshContext<'_>) -> MeshResult<Mesh> {
    let mut bounds: [Array1<f64>; 3] = [
        Array1::zeros(1),
        Array1::zeros(1),
        Array1::zeros(1),
    ];
    let mut extent = Extent::default();

    for (axis, dim) in ctx.dimensions.iter().rev().enumerate().take(3) {
        let sliced = SlicedAxis::new(dim, ctx.dataset, ctx.slices)?;
        bounds[axis] = axis_point_bounds(sliced.values.view(), sliced.parent.view());
        extent.set_upper(axis, sliced.len());
    }

    let components = components(ctx);
    let config = ctx.config;
    let points = fill_points(&extent, config.parallel, |i, j, k| {
        to_point(config, &components, [bounds[0][i], bounds[1][j], bounds[2][k]])
    });

    Ok(structured(points, extent, DataLocation::CellData))
}

/// Structured grid with a point on every coordinate sample.
///
/// Directly usable 1-D coordinates are read as-is. Otherwise longitude and
/// latitude go through index mapping and the vertical through its parametric
/// formula (or index mapping when it has none).
pub fn generate_mesh_points(ctx: &MeshContext<'_>) -> MeshResult<Mesh> {
    if ctx.classification.coords_1d && ctx.classification.direct_coords {
        direct_points(ctx)
    } else {
        mapped_points(ctx)
    }
}

fn direct_points(ctx: &MeshContext<'_>) -> MeshResult<Mesh> {
    let mut values: [Array1<f64>; 3] = [
        Array1::zeros(1),
        Array1::zeros(1),
        Array1::zeros(1),
    ];
    let mut extent = Extent::default();

    for (axis, dim) in ctx.dimensions.iter().rev().enumerate().take(3) {
        let sliced = SlicedAxis::new(dim, ctx.dataset, ctx.slices)?;
        extent.set_upper(axis, sliced.len().saturating_sub(1));
        values[axis] = sliced.values.to_owned();
    }

    let components = components(ctx);
    let config = ctx.config;
    let points = fill_points(&extent, config.parallel, |i, j, k| {
        to_point(config, &components, [values[0][i], values[1][j], values[2][k]])
    });

    Ok(structured(points, extent, DataLocation::PointData))
}

/// Source of the vertical value at a global `(n, k, j, i)`.
enum VerticalSource {
    Formula(ParametricFormula),
    Mapped(IndexMapper),
    Flat,
}

impl VerticalSource {
    fn resolve(ctx: &MeshContext<'_>, windows: &[AxisWindow; 3]) -> MeshResult<Self> {
        let name = match ctx.roles.vertical.as_deref() {
            Some(name) => name,
            None => return Ok(VerticalSource::Flat),
        };

        let config = ctx.config;
        let formula =
            ParametricFormula::lookup(ctx.dataset, name, config.vertical_bias, config.vertical_scale)?;
        match formula {
            Some(formula) => {
                let last = |w: &AxisWindow| w.global(w.len.saturating_sub(1)) + 1;
                formula.check_extent(&FormulaExtent {
                    n: ctx.time_index + 1,
                    k: last(&windows[2]),
                    j: last(&windows[1]),
                    i: last(&windows[0]),
                })?;
                Ok(VerticalSource::Formula(formula))
            }
            None => Ok(VerticalSource::Mapped(IndexMapper::new(
                ctx.dataset,
                &ctx.dimensions,
                name,
            )?)),
        }
    }

    #[inline]
    fn value(&self, config: &MeshConfig, n: usize, i: usize, j: usize, k: usize) -> f64 {
        match self {
            VerticalSource::Formula(formula) => formula.evaluate(n, k, j, i),
            VerticalSource::Mapped(mapper) => config.adjust_vertical(mapper.value(i, j, k)),
            VerticalSource::Flat => config.adjust_vertical(0.0),
        }
    }
}

fn mapped_points(ctx: &MeshContext<'_>) -> MeshResult<Mesh> {
    let missing = || MeshError::invalid_metadata("longitude and latitude are required");
    let longitude = ctx.roles.longitude.as_deref().ok_or_else(missing)?;
    let latitude = ctx.roles.latitude.as_deref().ok_or_else(missing)?;

    let mut windows = [AxisWindow::full(1); 3];
    let mut extent = Extent::default();
    for (axis, dim) in ctx.dimensions.iter().rev().enumerate().take(3) {
        let size = ctx.dataset.dim_size(dim).ok_or_else(|| {
            MeshError::invalid_metadata(format!("unknown dimension '{}'", dim))
        })?;
        windows[axis] = ctx.slices.window(dim, size);
        extent.set_upper(axis, windows[axis].len.saturating_sub(1));
    }

    let mapper = CoordMapper::new(ctx.dataset, &ctx.dimensions, longitude, latitude)?;
    let vertical = VerticalSource::resolve(ctx, &windows)?;

    tracing::debug!(
        longitude = %mapper.longitude(),
        latitude = %mapper.latitude(),
        parametric = matches!(vertical, VerticalSource::Formula(_)),
        "Index-mapped structured grid"
    );

    let config = ctx.config;
    let n = ctx.time_index;
    let points = fill_points(&extent, config.parallel, |i, j, k| {
        let (gi, gj, gk) = (windows[0].global(i), windows[1].global(j), windows[2].global(k));
        let (lon, lat) = mapper.lon_lat(gi, gj, gk);
        let z = vertical.value(config, n, gi, gj, gk);
        point_insert(config.spherical, lon, lat, z)
    });

    Ok(structured(points, extent, DataLocation::PointData))
}
