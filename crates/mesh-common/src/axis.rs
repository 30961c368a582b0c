//! Axis roles and the assignment of dataset dimensions to them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MeshError, MeshResult};

/// Semantic role of a dataset dimension in the generated geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisRole {
    X,
    Y,
    Z,
    T,
}

impl AxisRole {
    pub const ALL: [AxisRole; 4] = [AxisRole::X, AxisRole::Y, AxisRole::Z, AxisRole::T];

    /// Parse a role name (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x" => Some(AxisRole::X),
            "y" => Some(AxisRole::Y),
            "z" => Some(AxisRole::Z),
            "t" | "time" => Some(AxisRole::T),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AxisRole::X => "x",
            AxisRole::Y => "y",
            AxisRole::Z => "z",
            AxisRole::T => "t",
        }
    }
}

impl fmt::Display for AxisRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mapping of each axis role to at most one dimension name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisAssignment {
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub z: Option<String>,
    #[serde(default)]
    pub t: Option<String>,
}

impl AxisAssignment {
    /// Dimension assigned to a role.
    pub fn get(&self, role: AxisRole) -> Option<&str> {
        match role {
            AxisRole::X => self.x.as_deref(),
            AxisRole::Y => self.y.as_deref(),
            AxisRole::Z => self.z.as_deref(),
            AxisRole::T => self.t.as_deref(),
        }
    }

    pub fn set(&mut self, role: AxisRole, name: Option<String>) {
        match role {
            AxisRole::X => self.x = name,
            AxisRole::Y => self.y = name,
            AxisRole::Z => self.z = name,
            AxisRole::T => self.t = name,
        }
    }

    /// Role played by a dimension, if any.
    pub fn role_of(&self, name: &str) -> Option<AxisRole> {
        AxisRole::ALL
            .into_iter()
            .find(|role| self.get(*role) == Some(name))
    }

    pub fn is_empty(&self) -> bool {
        AxisRole::ALL.iter().all(|role| self.get(*role).is_none())
    }

    /// Reject assignments that map one dimension to several roles.
    pub fn validate(&self) -> MeshResult<()> {
        let names: Vec<&str> = AxisRole::ALL.iter().filter_map(|r| self.get(*r)).collect();
        for (idx, name) in names.iter().enumerate() {
            if names[..idx].contains(name) {
                return Err(MeshError::invalid_metadata(format!(
                    "dimension '{}' is assigned to more than one axis",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Assign roles from a field's storage-ordered dimensions.
    ///
    /// Four dimensions map to `(t, z, y, x)`, two to `(y, x)`. Three
    /// dimensions map to `(t, y, x)` when the outermost one is time-like and
    /// to `(z, y, x)` otherwise.
    pub fn from_dims(dims: &[String], outer_is_time: bool) -> Self {
        let mut roles = vec![AxisRole::T, AxisRole::Z, AxisRole::Y, AxisRole::X];
        match dims.len() {
            4 => {}
            3 if outer_is_time => roles.retain(|r| *r != AxisRole::Z),
            3 => roles.retain(|r| *r != AxisRole::T),
            2 => roles.retain(|r| matches!(r, AxisRole::X | AxisRole::Y)),
            1 => roles = vec![AxisRole::X],
            _ => return Self::default(),
        }

        let mut assignment = Self::default();
        for (role, dim) in roles.into_iter().zip(dims) {
            assignment.set(role, Some(dim.clone()));
        }
        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_dims_four() {
        let a = AxisAssignment::from_dims(&dims(&["time", "lev", "lat", "lon"]), true);
        assert_eq!(a.t.as_deref(), Some("time"));
        assert_eq!(a.z.as_deref(), Some("lev"));
        assert_eq!(a.y.as_deref(), Some("lat"));
        assert_eq!(a.x.as_deref(), Some("lon"));
    }

    #[test]
    fn test_from_dims_three() {
        let with_time = AxisAssignment::from_dims(&dims(&["time", "lat", "lon"]), true);
        assert_eq!(with_time.t.as_deref(), Some("time"));
        assert_eq!(with_time.z, None);

        let volume = AxisAssignment::from_dims(&dims(&["depth", "lat", "lon"]), false);
        assert_eq!(volume.z.as_deref(), Some("depth"));
        assert_eq!(volume.t, None);
    }

    #[test]
    fn test_role_of_and_validate() {
        let a = AxisAssignment::from_dims(&dims(&["lat", "lon"]), false);
        assert_eq!(a.role_of("lon"), Some(AxisRole::X));
        assert_eq!(a.role_of("depth"), None);
        assert!(a.validate().is_ok());

        let dup = AxisAssignment {
            x: Some("lon".into()),
            y: Some("lon".into()),
            ..Default::default()
        };
        assert!(dup.validate().is_err());
    }
}
