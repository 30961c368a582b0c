//! Slice specifications applied to dataset dimensions.
//!
//! The JSON form matches the viewer state files: a dimension maps either to
//! a single index (a cut) or to a `[start, stop, step]` triple.
//!
//! ```json
//! { "lon": [1000, 6000, 20], "lat": [500, 3000, 20], "time": 5 }
//! ```

use std::collections::BTreeMap;

use ndarray::Slice;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{MeshError, MeshResult};

/// Half-open strided range `start..stop` by `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[usize; 3]", into = "[usize; 3]")]
pub struct SliceRange {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
}

impl From<[usize; 3]> for SliceRange {
    fn from([start, stop, step]: [usize; 3]) -> Self {
        Self { start, stop, step }
    }
}

impl From<SliceRange> for [usize; 3] {
    fn from(range: SliceRange) -> Self {
        [range.start, range.stop, range.step]
    }
}

/// Selection along one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SliceEntry {
    /// Single index; the dimension collapses to one sample.
    Index(usize),
    /// Strided half-open range.
    Range(SliceRange),
}

impl SliceEntry {
    pub fn range(start: usize, stop: usize, step: usize) -> Self {
        SliceEntry::Range(SliceRange { start, stop, step })
    }

    pub fn is_cut(&self) -> bool {
        matches!(self, SliceEntry::Index(_))
    }

    /// Check the entry against the size of the dimension it applies to.
    pub fn validate(&self, name: &str, size: usize) -> MeshResult<()> {
        match *self {
            SliceEntry::Index(index) if index >= size => Err(MeshError::invalid_slice(
                name,
                format!("index {} out of range for size {}", index, size),
            )),
            SliceEntry::Index(_) => Ok(()),
            SliceEntry::Range(r) => {
                if r.step == 0 {
                    return Err(MeshError::invalid_slice(name, "step must be > 0"));
                }
                if r.stop <= r.start {
                    return Err(MeshError::invalid_slice(
                        name,
                        format!("stop {} must be greater than start {}", r.stop, r.start),
                    ));
                }
                if r.stop > size {
                    return Err(MeshError::invalid_slice(
                        name,
                        format!("stop {} exceeds size {}", r.stop, size),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Number of samples selected. A cut keeps a single sample.
    pub fn len(&self) -> usize {
        match *self {
            SliceEntry::Index(_) => 1,
            SliceEntry::Range(r) => (r.stop - r.start + r.step - 1) / r.step,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First selected index in the unsliced dimension.
    pub fn start(&self) -> usize {
        match *self {
            SliceEntry::Index(index) => index,
            SliceEntry::Range(r) => r.start,
        }
    }

    pub fn step(&self) -> usize {
        match *self {
            SliceEntry::Index(_) => 1,
            SliceEntry::Range(r) => r.step,
        }
    }

    /// The equivalent ndarray slice. A cut keeps its axis with length one.
    pub fn as_slice(&self) -> Slice {
        match *self {
            SliceEntry::Index(index) => Slice::new(index as isize, Some(index as isize + 1), 1),
            SliceEntry::Range(r) => {
                Slice::new(r.start as isize, Some(r.stop as isize), r.step as isize)
            }
        }
    }
}

/// Window of a dimension after slicing: local index `l` maps to
/// `start + l * step` in the unsliced dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisWindow {
    pub start: usize,
    pub step: usize,
    pub len: usize,
}

impl AxisWindow {
    /// The whole dimension.
    pub fn full(size: usize) -> Self {
        Self {
            start: 0,
            step: 1,
            len: size,
        }
    }

    /// Index in the unsliced dimension.
    #[inline]
    pub fn global(&self, local: usize) -> usize {
        self.start + local * self.step
    }
}

/// Per-dimension slicing, keyed by dimension name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SliceSpec(BTreeMap<String, SliceEntry>);

impl SliceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, name: impl Into<String>, entry: SliceEntry) -> Self {
        self.0.insert(name.into(), entry);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: SliceEntry) {
        self.0.insert(name.into(), entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<SliceEntry> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&SliceEntry> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SliceEntry)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Window selected along a dimension of the given size.
    pub fn window(&self, name: &str, size: usize) -> AxisWindow {
        match self.get(name) {
            Some(entry) => AxisWindow {
                start: entry.start(),
                step: entry.step(),
                len: entry.len(),
            },
            None => AxisWindow::full(size),
        }
    }

    /// Validate every entry against the dataset's dimension sizes.
    pub fn validate(&self, dataset: &Dataset) -> MeshResult<()> {
        for (name, entry) in self.iter() {
            let size = dataset.dim_size(name).ok_or_else(|| {
                MeshError::invalid_slice(name.as_str(), "no such dimension in dataset")
            })?;
            entry.validate(name, size)?;
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> MeshResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
