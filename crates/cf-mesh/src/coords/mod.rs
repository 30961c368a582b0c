//! Coordinate utilities: uniformity, slicing, index mapping, parametric
//! vertical formulas and role classification.

pub mod convert;
pub mod index_mapping;
pub mod meta;
pub mod parametric;
pub mod slicing;
pub mod uniform;
