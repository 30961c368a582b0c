//! Common types shared by the CF mesh crates.
//!
//! The labeled-array data model (`Dataset`, `Variable`), axis role
//! assignment, slice specifications and the error taxonomy live here so the
//! mesh generators, the round-trip converters and the command-line tools
//! agree on a single vocabulary.

pub mod axis;
pub mod dataset;
pub mod error;
pub mod slice;

pub use axis::{AxisAssignment, AxisRole};
pub use dataset::{AttrValue, Attributes, Dataset, Variable};
pub use error::{MeshError, MeshResult};
pub use slice::{AxisWindow, SliceEntry, SliceRange, SliceSpec};
