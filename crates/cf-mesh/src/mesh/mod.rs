//! Mesh generation entry point and generator dispatch.
//!
//! [`generate_mesh`] builds a [`MeshContext`] (roles, active dimensions,
//! classification), walks [`DISPATCH_TABLE`] and runs the first generator
//! whose rule matches, then attaches the requested fields.

pub mod rectilinear;
pub mod structured;
pub mod uniform;

use std::fmt;

use ndarray::{ArcArray, Axis, Ix1, Slice};

use mesh_common::{AxisAssignment, Dataset, MeshError, MeshResult, SliceSpec, Variable};

use crate::config::MeshConfig;
use crate::coords::meta::{CoordinateClassification, CoordinateRoles};
use crate::types::{Buffer, Mesh};

/// Generator branches, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    /// Structured grid from cell bounds. Not supported.
    StructuredBounds,
    Uniform,
    /// Structured grid with cell-centered data on point boundaries.
    StructuredCells,
    Rectilinear,
    /// Structured grid through index mapping and parametric vertical formulas.
    StructuredPoints,
}

impl GeneratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::StructuredBounds => "structured_bounds",
            GeneratorKind::Uniform => "uniform",
            GeneratorKind::StructuredCells => "structured_cells",
            GeneratorKind::Rectilinear => "rectilinear",
            GeneratorKind::StructuredPoints => "structured_points",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the dispatch table.
pub struct DispatchRule {
    pub kind: GeneratorKind,
    /// Receives the classification and the spherical flag.
    pub matches: fn(&CoordinateClassification, bool) -> bool,
    pub generate: fn(&MeshContext<'_>) -> MeshResult<Mesh>,
}

fn has_bounds(c: &CoordinateClassification, _spherical: bool) -> bool {
    c.coords_has_bounds
}

fn planar_uniform(c: &CoordinateClassification, spherical: bool) -> bool {
    !spherical && c.uniform_spacing
}

fn uniform_horizontal_cells(c: &CoordinateClassification, _spherical: bool) -> bool {
    c.coords_1d && c.uniform_lat_lon && c.direct_coords
}

fn planar_1d(c: &CoordinateClassification, spherical: bool) -> bool {
    !spherical && c.coords_1d && c.direct_coords
}

fn always(_c: &CoordinateClassification, _spherical: bool) -> bool {
    true
}

/// First matching rule wins. Spherical output needs explicit points, so the
/// uniform and rectilinear rules only apply to planar requests.
pub static DISPATCH_TABLE: [DispatchRule; 5] = [
    DispatchRule {
        kind: GeneratorKind::StructuredBounds,
        matches: has_bounds,
        generate: structured::generate_bound_cells,
    },
    DispatchRule {
        kind: GeneratorKind::Uniform,
        matches: planar_uniform,
        generate: uniform::generate_mesh,
    },
    DispatchRule {
        kind: GeneratorKind::StructuredCells,
        matches: uniform_horizontal_cells,
        generate: structured::generate_uniform_cells,
    },
    DispatchRule {
        kind: GeneratorKind::Rectilinear,
        matches: planar_1d,
        generate: rectilinear::generate_mesh,
    },
    DispatchRule {
        kind: GeneratorKind::StructuredPoints,
        matches: always,
        generate: structured::generate_mesh_points,
    },
];

fn dispatch(classification: &CoordinateClassification, spherical: bool) -> &'static DispatchRule {
    DISPATCH_TABLE
        .iter()
        .find(|rule| (rule.matches)(classification, spherical))
        .unwrap_or(&DISPATCH_TABLE[DISPATCH_TABLE.len() - 1])
}

/// Generator branch for a classification.
pub fn select_generator(classification: &CoordinateClassification, spherical: bool) -> GeneratorKind {
    dispatch(classification, spherical).kind
}

/// Fields, slicing, axis overrides and configuration for one generation call.
#[derive(Debug, Clone, Default)]
pub struct MeshRequest {
    pub fields: Vec<String>,
    pub time_index: usize,
    pub slices: SliceSpec,
    pub assignment: AxisAssignment,
    pub config: MeshConfig,
}

impl MeshRequest {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_time_index(mut self, time_index: usize) -> Self {
        self.time_index = time_index;
        self
    }

    pub fn with_slices(mut self, slices: SliceSpec) -> Self {
        self.slices = slices;
        self
    }

    pub fn with_assignment(mut self, assignment: AxisAssignment) -> Self {
        self.assignment = assignment;
        self
    }

    pub fn with_config(mut self, config: MeshConfig) -> Self {
        self.config = config;
        self
    }
}

/// Everything a generator reads, resolved once per call.
#[derive(Debug)]
pub struct MeshContext<'a> {
    pub dataset: &'a Dataset,
    pub roles: CoordinateRoles,
    pub classification: CoordinateClassification,
    /// Storage-ordered dimensions of the first field, without time.
    pub dimensions: Vec<String>,
    /// Dimensions of the first field, with time.
    pub field_dims: Vec<String>,
    pub time_index: usize,
    pub slices: &'a SliceSpec,
    pub config: &'a MeshConfig,
}

impl<'a> MeshContext<'a> {
    pub fn new(dataset: &'a Dataset, request: &'a MeshRequest) -> MeshResult<Self> {
        request
            .config
            .validate()
            .map_err(|e| MeshError::invalid_metadata(format!("invalid mesh configuration: {}", e)))?;
        request.assignment.validate()?;
        request.slices.validate(dataset)?;

        let first = request
            .fields
            .first()
            .ok_or_else(|| MeshError::invalid_metadata("no field requested"))?;
        let field = dataset.variable(first)?;
        let field_dims = field.dims().to_vec();

        let mut roles = CoordinateRoles::detect(dataset).with_assignment(&request.assignment);
        if roles.longitude.is_none() || roles.latitude.is_none() {
            return Err(MeshError::invalid_metadata(
                "no longitude/latitude coordinates found; assign x and y explicitly",
            ));
        }

        let dimensions: Vec<String> = field_dims
            .iter()
            .filter(|d| Some(d.as_str()) != roles.time.as_deref())
            .cloned()
            .collect();

        match dimensions.len() {
            2 | 3 => {}
            1 => {
                return Err(MeshError::not_supported(format!(
                    "one-dimensional field '{}' needs an unstructured mesh",
                    first
                )))
            }
            rank => return Err(MeshError::dimension_mismatch(3, rank)),
        }

        if let Some(time) = roles.time.as_deref() {
            if let Some(size) = field
                .axis_of(time)
                .map(|axis| field.shape()[axis])
            {
                if request.time_index >= size {
                    return Err(MeshError::invalid_slice(
                        time,
                        format!("time index {} out of range for size {}", request.time_index, size),
                    ));
                }
            }
        }

        // A vertical coordinate the field does not span plays no part in its geometry.
        let spans = |name: &str| {
            dataset
                .get(name)
                .map(|v| v.dims().iter().all(|d| dimensions.contains(d)))
                .unwrap_or(false)
        };
        if let Some(vertical) = roles.vertical.clone() {
            if !spans(&vertical) {
                tracing::debug!(vertical = %vertical, "Vertical coordinate not spanned by field");
                roles.vertical = None;
            }
        }

        let classification =
            CoordinateClassification::compute(dataset, &roles, &dimensions, &request.slices)?;

        Ok(Self {
            dataset,
            roles,
            classification,
            dimensions,
            field_dims,
            time_index: request.time_index,
            slices: &request.slices,
            config: &request.config,
        })
    }

    pub fn spherical(&self) -> bool {
        self.config.spherical
    }

    pub fn generator(&self) -> GeneratorKind {
        select_generator(&self.classification, self.spherical())
    }

    /// Number of active dimensions (2 or 3).
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
}

/// Generate the mesh for the requested fields.
///
/// Fails without a partial result on any metadata, slicing or topology error.
pub fn generate_mesh(dataset: &Dataset, request: &MeshRequest) -> MeshResult<Mesh> {
    let ctx = MeshContext::new(dataset, request)?;
    let rule = dispatch(&ctx.classification, ctx.spherical());

    tracing::debug!(
        generator = %rule.kind,
        dimensions = ?ctx.dimensions,
        spherical = ctx.spherical(),
        "Selected mesh generator"
    );

    let mut mesh = (rule.generate)(&ctx)?;
    attach_fields(&ctx, &request.fields, &mut mesh)?;

    tracing::debug!(
        kind = %mesh.kind(),
        points = mesh.point_count(),
        fields = mesh.fields.len(),
        "Generated mesh"
    );

    Ok(mesh)
}

/// Attach every field sharing the first field's dimensions, at the requested
/// time index and slicing, flattened in C order.
pub fn attach_fields(ctx: &MeshContext<'_>, fields: &[String], mesh: &mut Mesh) -> MeshResult<()> {
    let expected = mesh.expected_field_len();
    for name in fields {
        let variable = ctx.dataset.variable(name)?;
        if variable.dims() != ctx.field_dims.as_slice() {
            tracing::warn!(
                field = %name,
                dims = ?variable.dims(),
                "Skipping field with different dimensions"
            );
            continue;
        }

        let buffer = field_payload(ctx, variable)?;
        if buffer.len() != expected {
            return Err(MeshError::invalid_metadata(format!(
                "field '{}' has {} values for a mesh expecting {} ({})",
                name,
                buffer.len(),
                expected,
                mesh.data_location
            )));
        }
        mesh.fields.insert(name.clone(), buffer);
    }
    Ok(())
}

fn field_payload(ctx: &MeshContext<'_>, variable: &Variable) -> MeshResult<Buffer> {
    let mut data = variable.data().clone();
    for (axis, dim) in variable.dims().iter().enumerate() {
        if Some(dim.as_str()) == ctx.roles.time.as_deref() {
            let t = ctx.time_index as isize;
            data.slice_axis_inplace(Axis(axis), Slice::new(t, Some(t + 1), 1));
        } else if let Some(entry) = ctx.slices.get(dim) {
            data.slice_axis_inplace(Axis(axis), entry.as_slice());
        }
    }

    let len = data.len();
    if data.is_standard_layout() {
        let flat: ArcArray<f64, Ix1> = data.into_shape_with_order(len)?;
        Ok(Buffer::Shared(flat))
    } else {
        Ok(Buffer::Owned(data.iter().copied().collect()))
    }
}
