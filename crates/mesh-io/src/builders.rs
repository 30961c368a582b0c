//! Dataset → mesh builders driven by explicitly named X/Y/Z arrays.
//!
//! Unlike [`cf_mesh::generate_mesh`], these builders do not inspect CF
//! metadata: the caller names the arrays to use for each axis and the
//! memory order used to flatten them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

use cf_mesh::{Buffer, DataLocation, Mesh, MeshGeometry, RectilinearGrid, StructuredGrid};
use mesh_common::{AxisAssignment, AxisRole, Dataset, MeshError, MeshResult, Variable};

use crate::DATA_COPY_TARGET;

const SPATIAL_ROLES: [AxisRole; 3] = [AxisRole::X, AxisRole::Y, AxisRole::Z];

/// Memory order used to flatten multi-dimensional arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayOrder {
    /// Row-major: the last index varies fastest.
    C,
    /// Column-major: the first index varies fastest.
    F,
}

impl FromStr for ArrayOrder {
    type Err = MeshError;

    /// Parse from string (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "C" => Ok(Self::C),
            "F" => Ok(Self::F),
            _ => Err(MeshError::invalid_metadata(format!(
                "unknown array order '{}', expected C or F",
                s
            ))),
        }
    }
}

impl fmt::Display for ArrayOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::C => write!(f, "C"),
            Self::F => write!(f, "F"),
        }
    }
}

/// Axis names and flattening options for the grid builders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridOptions {
    /// Arrays used for x, y and z. The time role is ignored.
    #[serde(default)]
    pub axes: AxisAssignment,

    /// Flattening order; each builder has its own default.
    #[serde(default)]
    pub order: Option<ArrayOrder>,

    /// Dimension of the field holding vector components.
    #[serde(default)]
    pub component: Option<String>,

    /// Per-array scale factors, keyed by array name.
    #[serde(default)]
    pub scales: BTreeMap<String, f64>,
}

impl GridOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_x(mut self, name: impl Into<String>) -> Self {
        self.axes.x = Some(name.into());
        self
    }

    pub fn with_y(mut self, name: impl Into<String>) -> Self {
        self.axes.y = Some(name.into());
        self
    }

    pub fn with_z(mut self, name: impl Into<String>) -> Self {
        self.axes.z = Some(name.into());
        self
    }

    pub fn with_order(mut self, order: ArrayOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_component(mut self, dim: impl Into<String>) -> Self {
        self.component = Some(dim.into());
        self
    }

    pub fn with_scale(mut self, name: impl Into<String>, scale: f64) -> Self {
        self.scales.insert(name.into(), scale);
        self
    }

    /// Number of spatial axes given a name.
    pub fn axis_count(&self) -> usize {
        SPATIAL_ROLES
            .iter()
            .filter(|role| self.axes.get(**role).is_some())
            .count()
    }

    fn scale(&self, name: &str) -> f64 {
        self.scales.get(name).copied().unwrap_or(1.0)
    }
}

/// Build a rectilinear grid from 1-D coordinate arrays and a point field.
///
/// Unscaled coordinates and a C-contiguous field share memory with the
/// dataset. Extracting a component dimension transposes the field into a
/// new buffer and emits a data-copy warning. Flattening defaults to C order.
pub fn rectilinear(dataset: &Dataset, field: &str, options: &GridOptions) -> MeshResult<Mesh> {
    let mut ndim = options.axis_count();
    if ndim < 1 {
        return Err(MeshError::invalid_metadata(
            "You must specify at least one dimension as X, Y, or Z.",
        ));
    }
    let order = options.order.unwrap_or(ArrayOrder::C);

    let mut coords = Vec::with_capacity(3);
    for role in SPATIAL_ROLES {
        let buffer = match options.axes.get(role) {
            Some(name) => {
                let values = dataset.dimension_values(name)?;
                let scale = options.scale(name);
                if scale == 1.0 {
                    Buffer::Shared(values)
                } else {
                    Buffer::Owned(values.mapv(|v| v * scale))
                }
            }
            None => Buffer::placeholder(),
        };
        coords.push(buffer);
    }
    let [x, y, z]: [Buffer; 3] = coords
        .try_into()
        .map_err(|_| MeshError::invalid_metadata("expected three coordinate axes"))?;
    let grid = RectilinearGrid::new(x, y, z);

    let variable = dataset.variable(field)?;
    if options.component.is_some() {
        ndim += 1;
    }
    if variable.ndim() != ndim {
        return Err(MeshError::dimension_mismatch(ndim, variable.ndim()));
    }

    let values = field_buffer(variable, order, options.component.as_deref())?;
    check_field_len(field, values.len(), grid.extent.point_count(), options.component.is_some())?;

    tracing::debug!(
        field,
        order = %order,
        dimensions = ?grid.extent.dimensions(),
        shared = values.is_shared(),
        "Built rectilinear grid"
    );

    let mut mesh = Mesh::new(MeshGeometry::Rectilinear(grid), DataLocation::PointData);
    mesh.fields.insert(field.to_string(), values);
    Ok(mesh)
}

/// Build a structured grid from coordinate arrays of any rank.
///
/// Lower-rank coordinate arrays are broadcast by dimension name against
/// the highest-rank one. Points are always a new buffer. Flattening
/// defaults to F order, in which the first array dimension becomes the
/// grid's fastest (i) axis.
pub fn structured(dataset: &Dataset, field: &str, options: &GridOptions) -> MeshResult<Mesh> {
    match options.axis_count() {
        0 => {
            return Err(MeshError::invalid_metadata(
                "You must specify at least two dimensions as X, Y, or Z.",
            ))
        }
        1 => {
            return Err(MeshError::invalid_metadata(
                "One dimensional structured grids should be rectilinear grids.",
            ))
        }
        _ => {}
    }
    let order = options.order.unwrap_or(ArrayOrder::F);

    let arrays: Vec<(usize, &Variable)> = SPATIAL_ROLES
        .iter()
        .enumerate()
        .filter_map(|(column, role)| options.axes.get(*role).map(|name| (column, name)))
        .map(|(column, name)| dataset.variable(name).map(|v| (column, v)))
        .collect::<MeshResult<_>>()?;

    // The first array of the highest rank fixes the grid shape.
    let mut target = arrays[0].1;
    for (_, variable) in &arrays[1..] {
        if variable.ndim() > target.ndim() {
            target = variable;
        }
    }
    if target.ndim() > 3 {
        return Err(MeshError::dimension_mismatch(options.axis_count(), target.ndim()));
    }

    let n_points = target.size();
    let mut points = ndarray::Array2::<f64>::zeros((n_points, 3));
    for (column, variable) in &arrays {
        let scale = options.scale(variable.name());
        let values = coerced_values(variable, target, order)?;
        for (dst, src) in points.column_mut(*column).iter_mut().zip(values) {
            *dst = src * scale;
        }
    }

    let mut dims = target.shape().to_vec();
    if order == ArrayOrder::C {
        dims.reverse();
    }
    dims.resize(3, 1);
    let extent = cf_mesh::Extent::from_upper([
        dims[0].saturating_sub(1),
        dims[1].saturating_sub(1),
        dims[2].saturating_sub(1),
    ]);

    // The grid spans the dimensions of the highest-rank coordinate array.
    let variable = dataset.variable(field)?;
    let ndim = target.ndim() + usize::from(options.component.is_some());
    if variable.ndim() != ndim {
        return Err(MeshError::dimension_mismatch(ndim, variable.ndim()));
    }

    let values = field_buffer(variable, order, options.component.as_deref())?;
    check_field_len(field, values.len(), n_points, options.component.is_some())?;

    tracing::debug!(
        field,
        order = %order,
        dimensions = ?extent.dimensions(),
        "Built structured grid"
    );

    let grid = StructuredGrid { points, extent };
    let mut mesh = Mesh::new(MeshGeometry::Structured(grid), DataLocation::PointData);
    mesh.fields.insert(field.to_string(), values);
    Ok(mesh)
}

/// A component field holds a whole multiple of the point count; any other
/// field holds exactly one value per point.
fn check_field_len(field: &str, len: usize, n_points: usize, component: bool) -> MeshResult<()> {
    let fits = if component {
        n_points > 0 && len % n_points == 0
    } else {
        len == n_points
    };
    if !fits {
        return Err(MeshError::invalid_metadata(format!(
            "field '{}' has {} values for {} points",
            field, len, n_points
        )));
    }
    Ok(())
}

/// Flatten an array view in the requested order.
fn ravel(view: ArrayViewD<'_, f64>, order: ArrayOrder) -> Vec<f64> {
    match order {
        ArrayOrder::C => view.iter().copied().collect(),
        ArrayOrder::F => view.reversed_axes().iter().copied().collect(),
    }
}

/// Flattened field values, shared with the dataset when possible.
fn field_buffer(
    variable: &Variable,
    order: ArrayOrder,
    component: Option<&str>,
) -> MeshResult<Buffer> {
    let data = variable.data();

    if let Some(component) = component {
        let axis = variable.axis_of(component).ok_or_else(|| {
            MeshError::invalid_metadata(format!(
                "field '{}' has no component dimension '{}'",
                variable.name(),
                component
            ))
        })?;
        let mut axes: Vec<usize> = (0..variable.ndim()).filter(|a| *a != axis).collect();
        if order == ArrayOrder::F {
            axes.reverse();
        }
        axes.push(axis);

        tracing::warn!(
            target: DATA_COPY_TARGET,
            field = variable.name(),
            component,
            "Made a copy of the multicomponent array; mesh data not shared with the dataset"
        );
        let permuted = data.view().permuted_axes(IxDyn(&axes));
        return Ok(Buffer::from(permuted.iter().copied().collect::<Vec<_>>()));
    }

    let shareable = data.is_standard_layout() && (order == ArrayOrder::C || data.ndim() <= 1);
    if shareable {
        let len = data.len();
        return Ok(Buffer::Shared(data.clone().into_shape_with_order(len)?));
    }
    Ok(Buffer::from(ravel(data.view(), order)))
}

/// Values of `variable` broadcast against `target` by dimension name and
/// flattened in `order`.
fn coerced_values(variable: &Variable, target: &Variable, order: ArrayOrder) -> MeshResult<Vec<f64>> {
    if variable.dims() == target.dims() {
        return Ok(ravel(variable.data().view(), order));
    }
    if variable.ndim() >= target.ndim() {
        return Err(MeshError::invalid_metadata(format!(
            "coordinate arrays '{}' {:?} and '{}' {:?} have incompatible shapes",
            variable.name(),
            variable.dims(),
            target.name(),
            target.dims()
        )));
    }

    // (position in target, own axis), sorted by target position.
    let mut placement = Vec::with_capacity(variable.ndim());
    for (axis, dim) in variable.dims().iter().enumerate() {
        let position = target.axis_of(dim).ok_or_else(|| {
            MeshError::invalid_metadata(format!(
                "cannot broadcast '{}': dimension '{}' is not a dimension of '{}'",
                variable.name(),
                dim,
                target.name()
            ))
        })?;
        placement.push((position, axis));
    }
    placement.sort_unstable();

    let axes: Vec<usize> = placement.iter().map(|(_, axis)| *axis).collect();
    let mut shape = vec![1; target.ndim()];
    for (position, axis) in &placement {
        shape[*position] = variable.shape()[*axis];
    }

    let permuted = variable.data().view().permuted_axes(IxDyn(&axes));
    let standard = permuted.as_standard_layout();
    let expanded = standard.view().into_shape_with_order(IxDyn(&shape))?;
    let broadcast = expanded.broadcast(IxDyn(target.shape())).ok_or_else(|| {
        MeshError::invalid_metadata(format!(
            "cannot broadcast '{}' to the shape of '{}'",
            variable.name(),
            target.name()
        ))
    })?;
    Ok(ravel(broadcast, order))
}
