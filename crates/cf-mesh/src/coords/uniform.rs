//! Uniform spacing detection and cell-center to point-boundary conversion.

use ndarray::{Array1, ArrayView1};
use num_traits::ToPrimitive;

/// Relative tolerance on spacing when checking samples.
const SPACING_TOLERANCE: f64 = 0.01;

/// Origin, spacing and size of an evenly spaced axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformInfo {
    pub origin: f64,
    pub spacing: f64,
    pub size: usize,
}

impl UniformInfo {
    /// Value of sample `i`.
    #[inline]
    pub fn value(&self, i: usize) -> f64 {
        self.origin + i as f64 * self.spacing
    }
}

/// Detect an evenly spaced axis.
///
/// Every sample must match `origin + i * spacing` within `0.01 * |spacing|`.
/// Returns `None` for fewer than two samples, non-numeric values, or any
/// mismatch.
pub fn extract_uniform_info<A>(array: ArrayView1<'_, A>) -> Option<UniformInfo>
where
    A: ToPrimitive + Copy,
{
    let size = array.len();
    if size < 2 {
        return None;
    }

    let origin = array[0].to_f64()?;
    let last = array[size - 1].to_f64()?;
    let spacing = (last - origin) / (size - 1) as f64;
    let tolerance = (SPACING_TOLERANCE * spacing).abs();

    for (i, value) in array.iter().enumerate() {
        let truth = value.to_f64()?;
        let expected = origin + i as f64 * spacing;
        if !((expected - truth).abs() <= tolerance) {
            return None;
        }
    }

    Some(UniformInfo {
        origin,
        spacing,
        size,
    })
}

pub fn is_uniform<A>(array: ArrayView1<'_, A>) -> bool
where
    A: ToPrimitive + Copy,
{
    extract_uniform_info(array).is_some()
}

/// Uniformity as used by classification: a single sample is trivially uniform.
pub fn axis_is_uniform(array: ArrayView1<'_, f64>) -> bool {
    array.len() < 2 || is_uniform(array)
}

/// Convert `N` cell-center values into `N + 1` point boundaries.
///
/// Uniform input places boundaries analytically at
/// `origin - 0.5 * spacing + i * spacing`. Otherwise the inner boundaries are
/// midpoints between consecutive centers and the two outer ones mirror the
/// nearest center across its inner boundary.
///
/// A single center has no spacing to work from; use [`axis_point_bounds`]
/// with the unsliced parent axis for that case. Here it yields a unit cell.
pub fn cell_center_to_point(array: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = array.len();

    if let Some(info) = extract_uniform_info(array) {
        let start = info.origin - 0.5 * info.spacing;
        return (0..=n).map(|i| start + i as f64 * info.spacing).collect();
    }

    match n {
        0 => Array1::zeros(0),
        1 => Array1::from_vec(vec![array[0] - 0.5, array[0] + 0.5]),
        _ => {
            let mut bounds = Array1::zeros(n + 1);
            for i in 1..n {
                bounds[i] = 0.5 * (array[i - 1] + array[i]);
            }
            bounds[0] = bounds[1] - 2.0 * (bounds[1] - array[0]);
            bounds[n] = bounds[n - 1] + 2.0 * (array[n - 1] - bounds[n - 1]);
            bounds
        }
    }
}

/// Spacing a single-sample axis inherits from its unsliced parent: the
/// difference of the parent's first two samples, or `1.0` when the parent
/// itself has a single sample.
pub fn inherited_spacing(parent: ArrayView1<'_, f64>) -> f64 {
    if parent.len() >= 2 {
        parent[1] - parent[0]
    } else {
        1.0
    }
}

/// Origin and spacing of a (possibly sliced) axis whose samples are cell centers.
///
/// The origin sits half a spacing before the first center. A single-sample
/// axis takes its spacing from `parent`.
pub fn axis_origin_spacing(sliced: ArrayView1<'_, f64>, parent: ArrayView1<'_, f64>) -> (f64, f64) {
    let n = sliced.len();
    let spacing = if n < 2 {
        inherited_spacing(parent)
    } else {
        (sliced[n - 1] - sliced[0]) / (n - 1) as f64
    };
    let first = if n == 0 { 0.0 } else { sliced[0] };
    (first - 0.5 * spacing, spacing)
}

/// Point boundaries of a (possibly sliced) axis of cell centers, applying the
/// parent-spacing rule to single-sample axes.
pub fn axis_point_bounds(sliced: ArrayView1<'_, f64>, parent: ArrayView1<'_, f64>) -> Array1<f64> {
    if sliced.len() == 1 {
        let (origin, spacing) = axis_origin_spacing(sliced, parent);
        return Array1::from_vec(vec![origin, origin + spacing]);
    }
    cell_center_to_point(sliced)
}
