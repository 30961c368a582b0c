//! Coordinate-to-Mesh Generation for CF Labeled Arrays
//!
//! This crate inspects the coordinate metadata of a labeled multi-dimensional
//! array (climate, ocean and atmosphere model output following the CF
//! conventions) and synthesizes the matching topological mesh:
//!
//! - **Uniform grids**: every active axis is evenly spaced (origin/spacing/extent)
//! - **Rectilinear grids**: independent, possibly uneven, 1-D axes
//! - **Structured grids**: explicit points for curvilinear coordinates,
//!   parametric vertical coordinates and spherical projection
//!
//! # Architecture
//!
//! ```text
//! Dataset + MeshRequest
//!      │
//!      ▼
//! CoordinateRoles::detect()          (longitude / latitude / vertical / time)
//!      │
//!      ▼
//! CoordinateClassification::compute()  (bounds, 1-D, uniform, direct)
//!      │
//!      ▼
//! select_generator()  ──► first matching rule of DISPATCH_TABLE
//!      │
//!      ├─► uniform::generate_mesh             (cell data)
//!      ├─► rectilinear::generate_mesh         (point data, zero-copy axes)
//!      ├─► structured::generate_uniform_cells (cell data on point bounds)
//!      └─► structured::generate_mesh_points   (index mapping + parametric z)
//!               │
//!               ▼
//!          Mesh { geometry, data_location, fields }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cf_mesh::{generate_mesh, MeshConfig, MeshRequest};
//!
//! let request = MeshRequest::new(["air"]).with_config(MeshConfig::default());
//! let mesh = generate_mesh(&dataset, &request)?;
//! println!("{} points as {}", mesh.point_count(), mesh.data_location);
//! ```

pub mod config;
pub mod coords;
pub mod mesh;
pub mod types;

// Re-export commonly used types at crate root
pub use config::MeshConfig;
pub use coords::convert::point_insert;
pub use coords::index_mapping::{CoordMapper, IndexMapper, Permutation};
pub use coords::meta::{CoordinateClassification, CoordinateRoles, CoordinateType};
pub use coords::parametric::{FormulaKind, FormulaTerms, ParametricFormula, VerticalFormula};
pub use coords::slicing::{slice_array, slice_dimension};
pub use coords::uniform::{cell_center_to_point, extract_uniform_info, is_uniform, UniformInfo};
pub use mesh::{generate_mesh, select_generator, GeneratorKind, MeshContext, MeshRequest};
pub use types::{
    Buffer, DataLocation, Extent, Mesh, MeshGeometry, MeshKind, MeshSummary, RectilinearGrid,
    StructuredGrid, UniformGrid,
};

pub use mesh_common::{MeshError, MeshResult};
