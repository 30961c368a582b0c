//! Rectilinear grid generator.

use mesh_common::MeshResult;

use crate::coords::slicing::slice_dimension;
use crate::mesh::MeshContext;
use crate::types::{Buffer, DataLocation, Mesh, MeshGeometry, RectilinearGrid};

/// Rectilinear grid with the sliced coordinate arrays as point coordinates.
///
/// Coordinate variables are shared with the dataset. Dimensions without a
/// coordinate variable get their index sequence. Missing axes hold `[0.0]`.
pub fn generate_mesh(ctx: &MeshContext<'_>) -> MeshResult<Mesh> {
    let mut axes = [Buffer::placeholder(), Buffer::placeholder(), Buffer::placeholder()];

    for (axis, dim) in ctx.dimensions.iter().rev().enumerate().take(3) {
        let values = slice_dimension(dim, ctx.dataset, ctx.slices)?;
        axes[axis] = if ctx.dataset.get(dim).is_some() {
            Buffer::Shared(values)
        } else {
            Buffer::Owned(values.into_owned())
        };
    }

    let [x, y, z] = axes;
    let grid = RectilinearGrid::new(x, y, z);
    Ok(Mesh::new(MeshGeometry::Rectilinear(grid), DataLocation::PointData))
}
