//! Index mapping between storage order and the canonical `(i, j, k)` order.
//!
//! Mesh generation walks points by `(i, j, k)` where `i` is the innermost
//! active dimension, `j` the next one out and `k` the third from last. An
//! output array such as a curvilinear latitude may be stored over any subset
//! of those dimensions in any order. [`IndexMapper`] resolves the permutation
//! once and then reads the stored array directly with reordered indices.

use std::fmt;

use ndarray::{ArcArray, Ix1, Ix2, Ix3};

use mesh_common::{Dataset, MeshError, MeshResult, Variable};

/// Canonical index letter of an active dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAxis {
    I,
    J,
    K,
}

impl IndexAxis {
    /// Letter of the dimension at `position` in an active list of `count` dimensions.
    fn for_position(position: usize, count: usize) -> Option<Self> {
        match count - 1 - position {
            0 => Some(IndexAxis::I),
            1 => Some(IndexAxis::J),
            2 => Some(IndexAxis::K),
            _ => None,
        }
    }

    fn letter(&self) -> char {
        match self {
            IndexAxis::I => 'i',
            IndexAxis::J => 'j',
            IndexAxis::K => 'k',
        }
    }
}

/// Storage order of a mapped array, outer to inner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permutation {
    I,
    J,
    K,
    Ij,
    Ji,
    Ik,
    Ki,
    Jk,
    Kj,
    Ijk,
    Ikj,
    Jik,
    Jki,
    Kij,
    Kji,
}

impl Permutation {
    pub fn from_axes(axes: &[IndexAxis]) -> Option<Self> {
        use IndexAxis::{I, J, K};
        let permutation = match axes {
            [I] => Permutation::I,
            [J] => Permutation::J,
            [K] => Permutation::K,
            [I, J] => Permutation::Ij,
            [J, I] => Permutation::Ji,
            [I, K] => Permutation::Ik,
            [K, I] => Permutation::Ki,
            [J, K] => Permutation::Jk,
            [K, J] => Permutation::Kj,
            [I, J, K] => Permutation::Ijk,
            [I, K, J] => Permutation::Ikj,
            [J, I, K] => Permutation::Jik,
            [J, K, I] => Permutation::Jki,
            [K, I, J] => Permutation::Kij,
            [K, J, I] => Permutation::Kji,
            _ => return None,
        };
        Some(permutation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permutation::I => "i",
            Permutation::J => "j",
            Permutation::K => "k",
            Permutation::Ij => "ij",
            Permutation::Ji => "ji",
            Permutation::Ik => "ik",
            Permutation::Ki => "ki",
            Permutation::Jk => "jk",
            Permutation::Kj => "kj",
            Permutation::Ijk => "ijk",
            Permutation::Ikj => "ikj",
            Permutation::Jik => "jik",
            Permutation::Jki => "jki",
            Permutation::Kij => "kij",
            Permutation::Kji => "kji",
        }
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The stored array, typed by rank and tagged with its permutation.
#[derive(Debug, Clone)]
enum Accessor {
    I(ArcArray<f64, Ix1>),
    J(ArcArray<f64, Ix1>),
    K(ArcArray<f64, Ix1>),
    Ij(ArcArray<f64, Ix2>),
    Ji(ArcArray<f64, Ix2>),
    Ik(ArcArray<f64, Ix2>),
    Ki(ArcArray<f64, Ix2>),
    Jk(ArcArray<f64, Ix2>),
    Kj(ArcArray<f64, Ix2>),
    Ijk(ArcArray<f64, Ix3>),
    Ikj(ArcArray<f64, Ix3>),
    Jik(ArcArray<f64, Ix3>),
    Jki(ArcArray<f64, Ix3>),
    Kij(ArcArray<f64, Ix3>),
    Kji(ArcArray<f64, Ix3>),
}

/// Reads an output array by canonical `(i, j, k)` indices.
#[derive(Debug, Clone)]
pub struct IndexMapper {
    name: String,
    accessor: Accessor,
}

impl IndexMapper {
    /// Bind the dataset variable `name` against the active dimensions.
    pub fn new(dataset: &Dataset, in_dims: &[String], name: &str) -> MeshResult<Self> {
        Self::from_variable(dataset.variable(name)?, in_dims)
    }

    /// Bind a variable against the active dimensions (outer to inner).
    pub fn from_variable(variable: &Variable, in_dims: &[String]) -> MeshResult<Self> {
        let unsupported = || MeshError::UnsupportedIndexMapping {
            name: variable.name().to_string(),
            dims: variable.dims().to_vec(),
        };

        if variable.ndim() == 0 || variable.ndim() > 3 {
            return Err(unsupported());
        }

        let axes = variable
            .dims()
            .iter()
            .map(|dim| {
                in_dims
                    .iter()
                    .position(|d| d == dim)
                    .and_then(|pos| IndexAxis::for_position(pos, in_dims.len()))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(unsupported)?;
        let permutation = Permutation::from_axes(&axes).ok_or_else(unsupported)?;

        let data = variable.data().clone();
        let accessor = match permutation {
            Permutation::I | Permutation::J | Permutation::K => {
                let a = data.into_dimensionality::<Ix1>()?;
                match permutation {
                    Permutation::I => Accessor::I(a),
                    Permutation::J => Accessor::J(a),
                    _ => Accessor::K(a),
                }
            }
            Permutation::Ij
            | Permutation::Ji
            | Permutation::Ik
            | Permutation::Ki
            | Permutation::Jk
            | Permutation::Kj => {
                let a = data.into_dimensionality::<Ix2>()?;
                match permutation {
                    Permutation::Ij => Accessor::Ij(a),
                    Permutation::Ji => Accessor::Ji(a),
                    Permutation::Ik => Accessor::Ik(a),
                    Permutation::Ki => Accessor::Ki(a),
                    Permutation::Jk => Accessor::Jk(a),
                    _ => Accessor::Kj(a),
                }
            }
            _ => {
                let a = data.into_dimensionality::<Ix3>()?;
                match permutation {
                    Permutation::Ijk => Accessor::Ijk(a),
                    Permutation::Ikj => Accessor::Ikj(a),
                    Permutation::Jik => Accessor::Jik(a),
                    Permutation::Jki => Accessor::Jki(a),
                    Permutation::Kij => Accessor::Kij(a),
                    _ => Accessor::Kji(a),
                }
            }
        };

        tracing::debug!(
            name = %variable.name(),
            permutation = %permutation,
            "Bound index mapping"
        );

        Ok(Self {
            name: variable.name().to_string(),
            accessor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permutation(&self) -> Permutation {
        match &self.accessor {
            Accessor::I(_) => Permutation::I,
            Accessor::J(_) => Permutation::J,
            Accessor::K(_) => Permutation::K,
            Accessor::Ij(_) => Permutation::Ij,
            Accessor::Ji(_) => Permutation::Ji,
            Accessor::Ik(_) => Permutation::Ik,
            Accessor::Ki(_) => Permutation::Ki,
            Accessor::Jk(_) => Permutation::Jk,
            Accessor::Kj(_) => Permutation::Kj,
            Accessor::Ijk(_) => Permutation::Ijk,
            Accessor::Ikj(_) => Permutation::Ikj,
            Accessor::Jik(_) => Permutation::Jik,
            Accessor::Jki(_) => Permutation::Jki,
            Accessor::Kij(_) => Permutation::Kij,
            Accessor::Kji(_) => Permutation::Kji,
        }
    }

    /// Number of canonical indices the array depends on.
    pub fn rank(&self) -> usize {
        self.permutation().as_str().len()
    }

    /// Stored value at canonical `(i, j, k)`. Indices the array does not
    /// depend on are ignored.
    #[inline]
    pub fn value(&self, i: usize, j: usize, k: usize) -> f64 {
        match &self.accessor {
            Accessor::I(a) => a[i],
            Accessor::J(a) => a[j],
            Accessor::K(a) => a[k],
            Accessor::Ij(a) => a[[i, j]],
            Accessor::Ji(a) => a[[j, i]],
            Accessor::Ik(a) => a[[i, k]],
            Accessor::Ki(a) => a[[k, i]],
            Accessor::Jk(a) => a[[j, k]],
            Accessor::Kj(a) => a[[k, j]],
            Accessor::Ijk(a) => a[[i, j, k]],
            Accessor::Ikj(a) => a[[i, k, j]],
            Accessor::Jik(a) => a[[j, i, k]],
            Accessor::Jki(a) => a[[j, k, i]],
            Accessor::Kij(a) => a[[k, i, j]],
            Accessor::Kji(a) => a[[k, j, i]],
        }
    }

    /// Largest valid index per canonical axis `(i, j, k)`, `None` where unused.
    pub fn index_limits(&self) -> [Option<usize>; 3] {
        let shape: &[usize] = match &self.accessor {
            Accessor::I(a) | Accessor::J(a) | Accessor::K(a) => a.shape(),
            Accessor::Ij(a)
            | Accessor::Ji(a)
            | Accessor::Ik(a)
            | Accessor::Ki(a)
            | Accessor::Jk(a)
            | Accessor::Kj(a) => a.shape(),
            Accessor::Ijk(a)
            | Accessor::Ikj(a)
            | Accessor::Jik(a)
            | Accessor::Jki(a)
            | Accessor::Kij(a)
            | Accessor::Kji(a) => a.shape(),
        };

        let mut limits = [None; 3];
        for (letter, size) in self.permutation().as_str().chars().zip(shape) {
            let slot = match letter {
                'i' => 0,
                'j' => 1,
                _ => 2,
            };
            limits[slot] = Some(*size);
        }
        limits
    }
}

impl fmt::Display for IndexMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters: String = self
            .permutation()
            .as_str()
            .chars()
            .flat_map(|c| [c, ','])
            .collect();
        write!(f, "{}[{}]", self.name, letters.trim_end_matches(','))
    }
}

/// Longitude and latitude mappers composed into one `(i, j, k) -> (lon, lat)` lookup.
#[derive(Debug, Clone)]
pub struct CoordMapper {
    longitude: IndexMapper,
    latitude: IndexMapper,
}

impl CoordMapper {
    pub fn new(
        dataset: &Dataset,
        in_dims: &[String],
        longitude: &str,
        latitude: &str,
    ) -> MeshResult<Self> {
        Ok(Self {
            longitude: IndexMapper::new(dataset, in_dims, longitude)?,
            latitude: IndexMapper::new(dataset, in_dims, latitude)?,
        })
    }

    #[inline]
    pub fn lon_lat(&self, i: usize, j: usize, k: usize) -> (f64, f64) {
        (
            self.longitude.value(i, j, k),
            self.latitude.value(i, j, k),
        )
    }

    pub fn longitude(&self) -> &IndexMapper {
        &self.longitude
    }

    pub fn latitude(&self) -> &IndexMapper {
        &self.latitude
    }
}

/// Letters of the active dimensions, outer to inner, e.g. `"kji"`.
pub fn canonical_letters(count: usize) -> String {
    (0..count)
        .filter_map(|pos| IndexAxis::for_position(pos, count))
        .map(|axis| axis.letter())
        .collect()
}
