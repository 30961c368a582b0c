//! Labeled multi-dimensional arrays.
//!
//! A [`Dataset`] is a named collection of [`Variable`]s split into
//! coordinates and data variables, mirroring the layout of climate model
//! output. Every variable stores its values in an [`ArcArray`] so slices and
//! generated meshes can share the underlying allocation instead of copying.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use ndarray::{ArcArray, Array, ArrayD, Ix1, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// A single attribute value attached to a variable or a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Numbers(Vec<f64>),
    Text(String),
}

impl AttrValue {
    /// The attribute as text, if it is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The attribute as a scalar number, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Numbers(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Number(v) => write!(f, "{}", v),
            AttrValue::Numbers(v) => write!(f, "{:?}", v),
            AttrValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Attribute mapping, ordered by key.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A named N-dimensional array with named dimensions and attributes.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    dims: Vec<String>,
    data: ArcArray<f64, IxDyn>,
    attrs: Attributes,
}

impl Variable {
    /// Create a variable from owned values.
    pub fn new(name: impl Into<String>, dims: Vec<String>, data: ArrayD<f64>) -> MeshResult<Self> {
        Self::from_shared(name, dims, data.into_shared())
    }

    /// Create a variable around an already shared buffer without copying it.
    pub fn from_shared(
        name: impl Into<String>,
        dims: Vec<String>,
        data: ArcArray<f64, IxDyn>,
    ) -> MeshResult<Self> {
        let name = name.into();
        if dims.len() != data.ndim() {
            return Err(MeshError::invalid_metadata(format!(
                "variable '{}' has {} dimension names for a {}-D array",
                name,
                dims.len(),
                data.ndim()
            )));
        }
        for (idx, dim) in dims.iter().enumerate() {
            if dims[..idx].contains(dim) {
                return Err(MeshError::invalid_metadata(format!(
                    "variable '{}' repeats dimension '{}'",
                    name, dim
                )));
            }
        }

        Ok(Self {
            name,
            dims,
            data,
            attrs: Attributes::new(),
        })
    }

    /// Create a 1-D coordinate variable indexed by its own name.
    pub fn coordinate(name: impl Into<String>, values: Vec<f64>) -> Self {
        let name = name.into();
        let data = Array::from_vec(values).into_dyn().into_shared();
        Self {
            dims: vec![name.clone()],
            name,
            data,
            attrs: Attributes::new(),
        }
    }

    /// Create a 0-D (scalar) variable.
    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            dims: Vec::new(),
            data: ArrayD::from_elem(IxDyn(&[]), value).into_shared(),
            attrs: Attributes::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArcArray<f64, IxDyn> {
        &self.data
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    /// Textual attribute lookup.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(AttrValue::as_str)
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// True when the variable is 1-D and indexed by its own name.
    pub fn is_dimension_coordinate(&self) -> bool {
        self.dims.len() == 1 && self.dims[0] == self.name
    }

    /// Position of a dimension in this variable's storage order.
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    /// The values as a 1-D array sharing this variable's buffer.
    pub fn values_1d(&self) -> MeshResult<ArcArray<f64, Ix1>> {
        self.data.clone().into_dimensionality::<Ix1>().map_err(|_| {
            MeshError::invalid_metadata(format!(
                "variable '{}' is {}-D where a 1-D array is required",
                self.name,
                self.ndim()
            ))
        })
    }

    /// First element, for scalar-like variables.
    pub fn first_value(&self) -> Option<f64> {
        self.data.iter().next().copied()
    }
}

/// A collection of coordinate and data variables sharing named dimensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "DatasetRecord", into = "DatasetRecord")]
pub struct Dataset {
    attrs: Attributes,
    coords: Vec<Variable>,
    data_vars: Vec<Variable>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style global attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Builder-style coordinate insertion.
    pub fn with_coord(mut self, variable: Variable) -> MeshResult<Self> {
        self.add_coord(variable)?;
        Ok(self)
    }

    /// Builder-style data variable insertion.
    pub fn with_data_var(mut self, variable: Variable) -> MeshResult<Self> {
        self.add_data_var(variable)?;
        Ok(self)
    }

    pub fn add_coord(&mut self, variable: Variable) -> MeshResult<()> {
        self.check_insert(&variable)?;
        self.coords.push(variable);
        Ok(())
    }

    pub fn add_data_var(&mut self, variable: Variable) -> MeshResult<()> {
        self.check_insert(&variable)?;
        self.data_vars.push(variable);
        Ok(())
    }

    fn check_insert(&self, variable: &Variable) -> MeshResult<()> {
        if self.get(variable.name()).is_some() {
            return Err(MeshError::invalid_metadata(format!(
                "variable '{}' already exists",
                variable.name()
            )));
        }
        for (dim, size) in variable.dims().iter().zip(variable.shape()) {
            if let Some(existing) = self.dim_size(dim) {
                if existing != *size {
                    return Err(MeshError::invalid_metadata(format!(
                        "dimension '{}' has size {} in '{}' but {} elsewhere",
                        dim,
                        size,
                        variable.name(),
                        existing
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    /// The `Conventions` global attribute.
    pub fn conventions(&self) -> Option<&str> {
        self.attrs.get("Conventions").and_then(AttrValue::as_str)
    }

    pub fn coords(&self) -> impl Iterator<Item = &Variable> {
        self.coords.iter()
    }

    pub fn data_vars(&self) -> impl Iterator<Item = &Variable> {
        self.data_vars.iter()
    }

    /// Every variable, data variables first, in insertion order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.data_vars.iter().chain(self.coords.iter())
    }

    pub fn is_coord(&self, name: &str) -> bool {
        self.coords.iter().any(|v| v.name() == name)
    }

    /// Look up a coordinate or data variable by name.
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.coords
            .iter()
            .chain(self.data_vars.iter())
            .find(|v| v.name() == name)
    }

    /// Look up a variable, failing with [`MeshError::MissingVariable`].
    pub fn variable(&self, name: &str) -> MeshResult<&Variable> {
        self.get(name)
            .ok_or_else(|| MeshError::MissingVariable(name.to_string()))
    }

    /// Size of a named dimension, if any variable uses it.
    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.variables().find_map(|v| v.axis_of(dim).map(|axis| v.shape()[axis]))
    }

    /// All dimensions with their sizes, in order of first appearance.
    pub fn dims(&self) -> Vec<(String, usize)> {
        let mut dims: Vec<(String, usize)> = Vec::new();
        for variable in self.variables() {
            for (dim, size) in variable.dims().iter().zip(variable.shape()) {
                if !dims.iter().any(|(d, _)| d == dim) {
                    dims.push((dim.clone(), *size));
                }
            }
        }
        dims
    }

    /// Values along a dimension: its 1-D coordinate variable when present,
    /// otherwise the index sequence `0..size`.
    pub fn dimension_values(&self, dim: &str) -> MeshResult<ArcArray<f64, Ix1>> {
        if let Some(variable) = self.get(dim) {
            if variable.ndim() == 1 {
                return variable.values_1d();
            }
        }
        let size = self
            .dim_size(dim)
            .ok_or_else(|| MeshError::MissingVariable(dim.to_string()))?;
        Ok(Array::range(0.0, size as f64, 1.0).into_shared())
    }

    /// Parse a dataset from its JSON description.
    pub fn from_json_str(json: &str) -> MeshResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a dataset from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> MeshResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Loading dataset description");
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> MeshResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// JSON representation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VariableRecord {
    name: String,
    #[serde(default)]
    dims: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shape: Option<Vec<usize>>,
    values: Vec<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: Attributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatasetRecord {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: Attributes,
    #[serde(default)]
    coords: Vec<VariableRecord>,
    #[serde(default)]
    data_vars: Vec<VariableRecord>,
}

impl TryFrom<VariableRecord> for Variable {
    type Error = MeshError;

    fn try_from(record: VariableRecord) -> MeshResult<Self> {
        let shape = match (record.shape, record.dims.len()) {
            (Some(shape), _) => shape,
            (None, 0) => Vec::new(),
            (None, 1) => vec![record.values.len()],
            (None, n) => {
                return Err(MeshError::invalid_metadata(format!(
                    "variable '{}' has {} dimensions and needs an explicit shape",
                    record.name, n
                )))
            }
        };
        let data = ArrayD::from_shape_vec(IxDyn(&shape), record.values).map_err(|e| {
            MeshError::invalid_metadata(format!("variable '{}': {}", record.name, e))
        })?;
        let mut variable = Variable::new(record.name, record.dims, data)?;
        variable.attrs = record.attrs;
        Ok(variable)
    }
}

impl From<&Variable> for VariableRecord {
    fn from(variable: &Variable) -> Self {
        Self {
            name: variable.name.clone(),
            dims: variable.dims.clone(),
            shape: (variable.ndim() > 1).then(|| variable.shape().to_vec()),
            values: variable.data.iter().copied().collect(),
            attrs: variable.attrs.clone(),
        }
    }
}

impl TryFrom<DatasetRecord> for Dataset {
    type Error = MeshError;

    fn try_from(record: DatasetRecord) -> MeshResult<Self> {
        let mut dataset = Dataset {
            attrs: record.attrs,
            ..Default::default()
        };
        for coord in record.coords {
            dataset.add_coord(Variable::try_from(coord)?)?;
        }
        for var in record.data_vars {
            dataset.add_data_var(Variable::try_from(var)?)?;
        }
        Ok(dataset)
    }
}

impl From<Dataset> for DatasetRecord {
    fn from(dataset: Dataset) -> Self {
        Self {
            attrs: dataset.attrs.clone(),
            coords: dataset.coords.iter().map(VariableRecord::from).collect(),
            data_vars: dataset.data_vars.iter().map(VariableRecord::from).collect(),
        }
    }
}
