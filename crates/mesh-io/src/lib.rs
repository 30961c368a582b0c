//! Conversions between meshes and labeled datasets.
//!
//! - [`convert`]: mesh → dataset (the inverse of mesh generation) and
//!   image → rectilinear expansion
//! - [`builders`]: dataset → mesh from explicitly named X/Y/Z arrays
//! - [`format`]: suffix-keyed mesh file readers
//! - [`legacy`]: ASCII legacy `.vtk` reader and writer
//!
//! Paths that must copy data instead of sharing it emit a `warn` event on
//! the [`DATA_COPY_TARGET`] tracing target.

pub mod builders;
pub mod convert;
pub mod format;
pub mod legacy;

pub use builders::{rectilinear, structured, ArrayOrder, GridOptions};
pub use convert::{image_to_rectilinear, mesh_to_dataset};
pub use format::{guess_can_open, open_dataset, MeshFormat, MeshReader, ReaderRegistry};
pub use legacy::{read_legacy, write_legacy, write_legacy_file, LegacyVtkReader};

/// Tracing target for advisories about conversions that copy data.
pub const DATA_COPY_TARGET: &str = "data_copy";
