//! Array generators with predictable, verifiable values.

use ndarray::{ArrayD, IxDyn};

/// `n` evenly spaced samples from `start` to `stop`, both included.
///
/// # Example
///
/// ```
/// use test_utils::linspace;
///
/// assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
/// assert_eq!(linspace(5.0, 9.0, 1), vec![5.0]);
/// ```
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// `n` samples from `start` whose spacing grows geometrically by `ratio`.
///
/// Used for deliberately non-uniform axes.
pub fn stretched(start: f64, first_step: f64, ratio: f64, n: usize) -> Vec<f64> {
    let mut values = Vec::with_capacity(n);
    let mut value = start;
    let mut step = first_step;
    for _ in 0..n {
        values.push(value);
        value += step;
        step *= ratio;
    }
    values
}

/// Array whose value is its flat (C-order) index.
///
/// This makes it easy to verify that slicing and flattening pick the right
/// samples: element `[a, b]` of a `[_, nb]` array equals `a * nb + b`.
///
/// # Example
///
/// ```
/// use test_utils::index_ramp;
///
/// let ramp = index_ramp(&[2, 3]);
/// assert_eq!(ramp[[1, 2]], 5.0);
/// ```
pub fn index_ramp(shape: &[usize]) -> ArrayD<f64> {
    let len: usize = shape.iter().product();
    let values: Vec<f64> = (0..len).map(|v| v as f64).collect();
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .unwrap_or_else(|_| ArrayD::zeros(IxDyn(shape)))
}

/// 2-D array built from a function of `(row, col)`.
pub fn from_fn_2d<F>(rows: usize, cols: usize, f: F) -> ArrayD<f64>
where
    F: Fn(usize, usize) -> f64,
{
    ndarray::Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c)).into_dyn()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 10.0, 6), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_stretched_is_uneven() {
        let v = stretched(0.0, 1.0, 2.0, 4);
        assert_eq!(v, vec![0.0, 1.0, 3.0, 7.0]);
    }

    #[test]
    fn test_index_ramp() {
        let ramp = index_ramp(&[2, 3, 4]);
        assert_eq!(ramp.shape(), &[2, 3, 4]);
        assert_eq!(ramp[[1, 2, 3]], 23.0);
    }
}
