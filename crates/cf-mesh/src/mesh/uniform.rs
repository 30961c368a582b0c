//! Uniform (image) grid generator.

use mesh_common::MeshResult;

use crate::coords::slicing::SlicedAxis;
use crate::coords::uniform::axis_origin_spacing;
use crate::mesh::MeshContext;
use crate::types::{DataLocation, Extent, Mesh, MeshGeometry, UniformGrid};

/// Image grid whose cells are centered on the coordinate samples.
///
/// Axes are filled innermost dimension first (x = last storage dimension).
/// Missing axes keep origin 0 and spacing 1.
pub fn generate_mesh(ctx: &MeshContext<'_>) -> MeshResult<Mesh> {
    let mut origin = [0.0; 3];
    let mut spacing = [1.0; 3];
    let mut extent = Extent::default();

    for (axis, dim) in ctx.dimensions.iter().rev().enumerate().take(3) {
        let sliced = SlicedAxis::new(dim, ctx.dataset, ctx.slices)?;
        let (o, s) = axis_origin_spacing(sliced.values.view(), sliced.parent.view());
        origin[axis] = o;
        spacing[axis] = s;
        extent.set_upper(axis, sliced.len());
    }

    let grid = UniformGrid {
        origin,
        spacing,
        extent,
    };
    Ok(Mesh::new(MeshGeometry::Uniform(grid), DataLocation::CellData))
}
