//! Apply a [`SliceSpec`] to coordinate and field arrays without copying.
//!
//! Slicing an [`ArcArray`] adjusts its view in place, so every result here
//! still shares the dataset's allocation.

use ndarray::{ArcArray, Axis, Ix1, IxDyn};

use mesh_common::{Dataset, MeshResult, SliceSpec, Variable};

/// Values of a variable with every matching slice entry applied.
///
/// Dimensions without an entry are returned whole. A cut keeps its axis with
/// a single sample.
pub fn slice_array(
    name: &str,
    dataset: &Dataset,
    slices: &SliceSpec,
) -> MeshResult<ArcArray<f64, IxDyn>> {
    let variable = dataset.variable(name)?;
    Ok(slice_variable(variable, slices))
}

/// Slice a variable's values along each of its dimensions.
pub fn slice_variable(variable: &Variable, slices: &SliceSpec) -> ArcArray<f64, IxDyn> {
    let mut data = variable.data().clone();
    for (axis, dim) in variable.dims().iter().enumerate() {
        if let Some(entry) = slices.get(dim) {
            data.slice_axis_inplace(Axis(axis), entry.as_slice());
        }
    }
    data
}

/// Sliced values along a dimension: its coordinate variable when it has one,
/// otherwise the index sequence.
pub fn slice_dimension(
    dim: &str,
    dataset: &Dataset,
    slices: &SliceSpec,
) -> MeshResult<ArcArray<f64, Ix1>> {
    let mut values = dataset.dimension_values(dim)?;
    if let Some(entry) = slices.get(dim) {
        values.slice_axis_inplace(Axis(0), entry.as_slice());
    }
    Ok(values)
}

/// A sliced dimension together with its unsliced parent values.
#[derive(Debug, Clone)]
pub struct SlicedAxis {
    pub name: String,
    pub values: ArcArray<f64, Ix1>,
    pub parent: ArcArray<f64, Ix1>,
}

impl SlicedAxis {
    pub fn new(dim: &str, dataset: &Dataset, slices: &SliceSpec) -> MeshResult<Self> {
        let parent = dataset.dimension_values(dim)?;
        let mut values = parent.clone();
        if let Some(entry) = slices.get(dim) {
            values.slice_axis_inplace(Axis(0), entry.as_slice());
        }
        Ok(Self {
            name: dim.to_string(),
            values,
            parent,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_common::SliceEntry;
    use ndarray::{Array, ArrayD};

    fn dataset() -> Dataset {
        let field = ArrayD::from_shape_vec(
            IxDyn(&[3, 4]),
            (0..12).map(|v| v as f64).collect(),
        )
        .unwrap();
        Dataset::new()
            .with_coord(Variable::coordinate("lat", vec![-10.0, 0.0, 10.0]))
            .unwrap()
            .with_coord(Variable::coordinate("lon", vec![0.0, 90.0, 180.0, 270.0]))
            .unwrap()
            .with_data_var(Variable::new("t", vec!["lat".into(), "lon".into()], field).unwrap())
            .unwrap()
    }

    #[test]
    fn test_unsliced_is_whole_array() {
        let ds = dataset();
        let lon = slice_array("lon", &ds, &SliceSpec::new()).unwrap();
        assert_eq!(lon.len(), 4);
        assert_eq!(lon.as_ptr(), ds.get("lon").unwrap().data().as_ptr());
    }

    #[test]
    fn test_range_and_cut() {
        let ds = dataset();
        let slices = SliceSpec::new()
            .with("lon", SliceEntry::range(1, 4, 2))
            .with("lat", SliceEntry::Index(2));

        let lon = slice_dimension("lon", &ds, &slices).unwrap();
        assert_eq!(lon.to_vec(), vec![90.0, 270.0]);

        let field = slice_array("t", &ds, &slices).unwrap();
        assert_eq!(field.shape(), &[1, 2]);
        assert_eq!(field[[0, 0]], 9.0);
        assert_eq!(field[[0, 1]], 11.0);
    }

    #[test]
    fn test_sliced_axis_keeps_parent() {
        let ds = dataset();
        let slices = SliceSpec::new().with("lat", SliceEntry::Index(1));
        let axis = SlicedAxis::new("lat", &ds, &slices).unwrap();
        assert_eq!(axis.values.to_vec(), vec![0.0]);
        assert_eq!(axis.parent.len(), 3);
    }

    #[test]
    fn test_dimension_without_coordinate() {
        let ds = Dataset::new()
            .with_data_var(
                Variable::new("v", vec!["n".into()], Array::zeros(5).into_dyn()).unwrap(),
            )
            .unwrap();
        let n = slice_dimension("n", &ds, &SliceSpec::new()).unwrap();
        assert_eq!(n.to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
