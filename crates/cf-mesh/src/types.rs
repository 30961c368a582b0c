//! Mesh output types.
//!
//! A [`Mesh`] is produced fresh by every generation call. Its numeric
//! buffers are either shared with the source dataset ([`Buffer::Shared`])
//! or freshly allocated ([`Buffer::Owned`]), so whether a result aliases the
//! dataset is visible in the type rather than left to convention.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArcArray, Array1, Array2, ArrayView1, Ix1};
use serde::{Deserialize, Serialize};

/// A 1-D numeric buffer, either aliasing a dataset array or owned by the mesh.
#[derive(Debug, Clone)]
pub enum Buffer {
    /// Shares its allocation with the array it was taken from.
    Shared(ArcArray<f64, Ix1>),
    /// Allocated for this mesh.
    Owned(Array1<f64>),
}

impl Buffer {
    /// Single-value placeholder used for unassigned axes.
    pub fn placeholder() -> Self {
        Buffer::Owned(Array1::zeros(1))
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::Shared(a) => a.len(),
            Buffer::Owned(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Buffer::Shared(_))
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        match self {
            Buffer::Shared(a) => a.view(),
            Buffer::Owned(a) => a.view(),
        }
    }

    /// Pointer to the first element, used to check memory sharing.
    pub fn as_ptr(&self) -> *const f64 {
        match self {
            Buffer::Shared(a) => a.as_ptr(),
            Buffer::Owned(a) => a.as_ptr(),
        }
    }

    /// The buffer as a shareable array. Shared buffers are returned without
    /// copying; owned buffers move into a new shared allocation.
    pub fn into_shared(self) -> ArcArray<f64, Ix1> {
        match self {
            Buffer::Shared(a) => a,
            Buffer::Owned(a) => a.into_shared(),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.view().to_vec()
    }

    /// Minimum and maximum, ignoring NaN. `None` when empty or all NaN.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        min_max(self.view().iter().copied())
    }
}

impl From<ArcArray<f64, Ix1>> for Buffer {
    fn from(array: ArcArray<f64, Ix1>) -> Self {
        Buffer::Shared(array)
    }
}

impl From<Array1<f64>> for Buffer {
    fn from(array: Array1<f64>) -> Self {
        Buffer::Owned(array)
    }
}

impl From<Vec<f64>> for Buffer {
    fn from(values: Vec<f64>) -> Self {
        Buffer::Owned(Array1::from_vec(values))
    }
}

pub(crate) fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Whether the payload aligns with mesh vertices or mesh cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLocation {
    PointData,
    CellData,
}

impl DataLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataLocation::PointData => "point_data",
            DataLocation::CellData => "cell_data",
        }
    }
}

impl fmt::Display for DataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index range `[xlo, xhi, ylo, yhi, zlo, zhi]`, both ends inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extent(pub [i64; 6]);

impl Extent {
    /// Extent starting at zero with the given upper bounds per axis.
    pub fn from_upper(upper: [usize; 3]) -> Self {
        Extent([0, upper[0] as i64, 0, upper[1] as i64, 0, upper[2] as i64])
    }

    /// Set the upper bound of one axis (0 = x, 1 = y, 2 = z).
    pub fn set_upper(&mut self, axis: usize, upper: usize) {
        self.0[axis * 2 + 1] = upper as i64;
    }

    pub fn upper(&self, axis: usize) -> usize {
        self.0[axis * 2 + 1].max(0) as usize
    }

    /// Number of points along each axis.
    pub fn dimensions(&self) -> [usize; 3] {
        let d = |axis: usize| (self.0[axis * 2 + 1] - self.0[axis * 2] + 1).max(0) as usize;
        [d(0), d(1), d(2)]
    }

    pub fn point_count(&self) -> usize {
        self.dimensions().iter().product()
    }

    /// Number of cells. Flat axes (one point) do not reduce the count.
    pub fn cell_count(&self) -> usize {
        let dims = self.dimensions();
        if dims.iter().any(|d| *d == 0) {
            return 0;
        }
        dims.iter().map(|d| (*d - 1).max(1)).product()
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = self.0;
        write!(
            f,
            "[{}, {}, {}, {}, {}, {}]",
            e[0], e[1], e[2], e[3], e[4], e[5]
        )
    }
}

/// Image grid: origin, constant spacing and extent.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformGrid {
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
    pub extent: Extent,
}

impl UniformGrid {
    /// Coordinates along one axis: `origin + spacing * v` for each index in the extent.
    pub fn axis_coordinates(&self, axis: usize) -> Array1<f64> {
        let lo = self.extent.0[axis * 2];
        let hi = self.extent.0[axis * 2 + 1];
        (lo..=hi)
            .map(|v| self.origin[axis] + self.spacing[axis] * v as f64)
            .collect()
    }
}

/// Outer product of three independent 1-D coordinate arrays.
#[derive(Debug, Clone)]
pub struct RectilinearGrid {
    pub x: Buffer,
    pub y: Buffer,
    pub z: Buffer,
    pub extent: Extent,
}

impl RectilinearGrid {
    /// Grid whose extent follows the coordinate lengths.
    pub fn new(x: Buffer, y: Buffer, z: Buffer) -> Self {
        let extent = Extent::from_upper([
            x.len().saturating_sub(1),
            y.len().saturating_sub(1),
            z.len().saturating_sub(1),
        ]);
        Self { x, y, z, extent }
    }

    pub fn axis(&self, axis: usize) -> &Buffer {
        match axis {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }
}

/// Explicit `(n_points, 3)` points in k-outer, j-middle, i-inner order.
#[derive(Debug, Clone)]
pub struct StructuredGrid {
    pub points: Array2<f64>,
    pub extent: Extent,
}

impl StructuredGrid {
    pub fn point(&self, index: usize) -> [f64; 3] {
        let row = self.points.row(index);
        [row[0], row[1], row[2]]
    }

    /// Flat point index of `(i, j, k)`.
    pub fn point_index(&self, i: usize, j: usize, k: usize) -> usize {
        let [nx, ny, _] = self.extent.dimensions();
        (k * ny + j) * nx + i
    }
}

/// Which of the three grid shapes a mesh has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshKind {
    Uniform,
    Rectilinear,
    Structured,
}

impl MeshKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeshKind::Uniform => "uniform",
            MeshKind::Rectilinear => "rectilinear",
            MeshKind::Structured => "structured",
        }
    }
}

impl fmt::Display for MeshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum MeshGeometry {
    Uniform(UniformGrid),
    Rectilinear(RectilinearGrid),
    Structured(StructuredGrid),
}

impl MeshGeometry {
    pub fn kind(&self) -> MeshKind {
        match self {
            MeshGeometry::Uniform(_) => MeshKind::Uniform,
            MeshGeometry::Rectilinear(_) => MeshKind::Rectilinear,
            MeshGeometry::Structured(_) => MeshKind::Structured,
        }
    }

    pub fn extent(&self) -> Extent {
        match self {
            MeshGeometry::Uniform(g) => g.extent,
            MeshGeometry::Rectilinear(g) => g.extent,
            MeshGeometry::Structured(g) => g.extent,
        }
    }

    /// Axis-aligned bounds `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    pub fn bounds(&self) -> [f64; 6] {
        let mut bounds = [0.0; 6];
        for axis in 0..3 {
            let range = match self {
                MeshGeometry::Uniform(g) => min_max(g.axis_coordinates(axis).iter().copied()),
                MeshGeometry::Rectilinear(g) => g.axis(axis).min_max(),
                MeshGeometry::Structured(g) => min_max(g.points.column(axis).iter().copied()),
            };
            if let Some((lo, hi)) = range {
                bounds[axis * 2] = lo;
                bounds[axis * 2 + 1] = hi;
            }
        }
        bounds
    }
}

/// Generated mesh plus its payload arrays.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: MeshGeometry,
    pub data_location: DataLocation,
    /// Payload arrays keyed by field name, associated per `data_location`.
    pub fields: BTreeMap<String, Buffer>,
}

impl Mesh {
    pub fn new(geometry: MeshGeometry, data_location: DataLocation) -> Self {
        Self {
            geometry,
            data_location,
            fields: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> MeshKind {
        self.geometry.kind()
    }

    pub fn extent(&self) -> Extent {
        self.geometry.extent()
    }

    /// Points per axis.
    pub fn dimensions(&self) -> [usize; 3] {
        self.extent().dimensions()
    }

    pub fn point_count(&self) -> usize {
        self.extent().point_count()
    }

    pub fn cell_count(&self) -> usize {
        self.extent().cell_count()
    }

    /// Number of payload values each field must carry.
    pub fn expected_field_len(&self) -> usize {
        match self.data_location {
            DataLocation::PointData => self.point_count(),
            DataLocation::CellData => self.cell_count(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Buffer> {
        self.fields.get(name)
    }

    pub fn summary(&self) -> MeshSummary {
        MeshSummary {
            kind: self.kind(),
            extent: self.extent(),
            dimensions: self.dimensions(),
            n_points: self.point_count(),
            n_cells: self.cell_count(),
            data_location: self.data_location,
            bounds: self.geometry.bounds(),
            fields: self
                .fields
                .iter()
                .map(|(name, buffer)| (name.clone(), buffer.len()))
                .collect(),
        }
    }
}

/// Serializable description of a mesh, without its buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSummary {
    pub kind: MeshKind,
    pub extent: Extent,
    pub dimensions: [usize; 3],
    pub n_points: usize,
    pub n_cells: usize,
    pub data_location: DataLocation,
    pub bounds: [f64; 6],
    pub fields: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_extent_counts() {
        let extent = Extent::from_upper([4, 2, 0]);
        assert_eq!(extent.dimensions(), [5, 3, 1]);
        assert_eq!(extent.point_count(), 15);
        assert_eq!(extent.cell_count(), 8);
        assert_eq!(extent.to_string(), "[0, 4, 0, 2, 0, 0]");
    }

    #[test]
    fn test_buffer_sharing() {
        let source = array![1.0, 2.0, 3.0].into_shared();
        let shared = Buffer::from(source.clone());
        assert!(shared.is_shared());
        assert_eq!(shared.as_ptr(), source.as_ptr());

        let owned = Buffer::from(vec![1.0, 2.0]);
        assert!(!owned.is_shared());
        assert_eq!(owned.min_max(), Some((1.0, 2.0)));
    }

    #[test]
    fn test_uniform_axis_coordinates() {
        let grid = UniformGrid {
            origin: [-0.5, 10.0, 0.0],
            spacing: [1.0, 2.0, 1.0],
            extent: Extent::from_upper([3, 1, 0]),
        };
        assert_eq!(grid.axis_coordinates(0).to_vec(), vec![-0.5, 0.5, 1.5, 2.5]);
        assert_eq!(grid.axis_coordinates(1).to_vec(), vec![10.0, 12.0]);
        assert_eq!(grid.axis_coordinates(2).to_vec(), vec![0.0]);
    }

    #[test]
    fn test_mesh_summary() {
        let grid = RectilinearGrid::new(
            Buffer::from(vec![0.0, 1.0, 3.0]),
            Buffer::from(vec![5.0, 6.0]),
            Buffer::placeholder(),
        );
        let mut mesh = Mesh::new(MeshGeometry::Rectilinear(grid), DataLocation::PointData);
        mesh.fields.insert("t".into(), Buffer::from(vec![0.0; 6]));

        let summary = mesh.summary();
        assert_eq!(summary.kind, MeshKind::Rectilinear);
        assert_eq!(summary.n_points, 6);
        assert_eq!(summary.bounds, [0.0, 3.0, 5.0, 6.0, 0.0, 0.0]);
        assert_eq!(summary.fields.get("t"), Some(&6));
        assert_eq!(mesh.expected_field_len(), 6);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["kind"], "rectilinear");
        assert_eq!(json["data_location"], "point_data");
    }
}
