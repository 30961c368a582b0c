//! Coordinate role detection and topology classification.
//!
//! [`CoordinateRoles`] names the longitude, latitude, vertical and time
//! coordinates of a dataset from their CF attributes.
//! [`CoordinateClassification`] summarizes, for one request, the properties
//! the mesh dispatch table keys on. It is recomputed on every call since
//! slicing can change it (a one-sample cut is trivially uniform).

use std::fmt;

use serde::{Deserialize, Serialize};

use mesh_common::{AxisAssignment, AxisRole, Dataset, MeshResult, SliceSpec, Variable};

use crate::coords::slicing::{slice_dimension, slice_variable};
use crate::coords::uniform::axis_is_uniform;

const LONGITUDE_UNITS: &[&str] = &[
    "degrees_east",
    "degree_east",
    "degree_e",
    "degrees_e",
    "degreee",
    "degreese",
];

const LATITUDE_UNITS: &[&str] = &[
    "degrees_north",
    "degree_north",
    "degree_n",
    "degrees_n",
    "degreen",
    "degreesn",
];

const VERTICAL_STANDARD_NAMES: &[&str] = &["depth", "level"];

const PRESSURE_UNITS: &[&str] = &[
    "bar",
    "millibar",
    "decibar",
    "atmosphere",
    "atm",
    "pascal",
    "Pa",
    "hPa",
];

const LENGTH_UNITS: &[&str] = &["meter", "metre", "m", "kilometer", "km"];

const TIME_UNITS: &[&str] = &[
    "since",
    "second",
    "seconds",
    "day",
    "days",
    "hour",
    "hours",
    "minute",
    "minutes",
    "s",
    "sec",
    "secs",
    "shake",
    "shakes",
    "sidereal_day",
    "sidereal_days",
    "sidereal_hour",
    "sidereal_hours",
    "sidereal_minute",
    "sidereal_minutes",
    "sidereal_second",
    "sidereal_seconds",
    "sidereal_year",
    "sidereal_years",
    "tropical_year",
    "tropical_years",
    "lunar_month",
    "lunar_months",
    "common_year",
    "common_years",
    "leap_year",
    "leap_years",
    "Julian_year",
    "Julian_years",
    "Gregorian_year",
    "Gregorian_years",
    "sidereal_month",
    "sidereal_months",
    "tropical_month",
    "tropical_months",
    "d",
    "min",
    "mins",
    "hrs",
    "h",
    "fortnight",
    "fortnights",
    "week",
    "jiffy",
    "jiffies",
    "year",
    "years",
    "yr",
    "yrs",
    "a",
    "eon",
    "eons",
    "month",
    "months",
];

/// Geographic role of a coordinate variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateType {
    Longitude,
    Latitude,
    Vertical,
    Time,
    Unknown,
}

impl CoordinateType {
    /// Detect the role from attributes, in priority order: `axis`, `units`,
    /// `positive`/`calendar`, `standard_name`.
    pub fn from_variable(variable: &Variable) -> Self {
        match variable.attr_str("axis") {
            Some("X") => return CoordinateType::Longitude,
            Some("Y") => return CoordinateType::Latitude,
            Some("Z") => return CoordinateType::Vertical,
            Some("T") => return CoordinateType::Time,
            _ => {}
        }

        if let Some(units) = variable.attr_str("units").filter(|u| !u.is_empty()) {
            let units = units.to_lowercase();
            if LONGITUDE_UNITS.contains(&units.as_str()) {
                return CoordinateType::Longitude;
            }
            if LATITUDE_UNITS.contains(&units.as_str()) {
                return CoordinateType::Latitude;
            }

            let mut tokens: Vec<&str> = units.split(' ').collect();
            tokens.sort_unstable();
            tokens.dedup();
            let time_tokens = tokens.iter().filter(|t| TIME_UNITS.contains(*t)).count();
            if time_tokens == 2 {
                return CoordinateType::Time;
            }
        }

        if variable.attrs().contains_key("positive") {
            return CoordinateType::Vertical;
        }
        if variable.attrs().contains_key("calendar") {
            return CoordinateType::Time;
        }

        match variable.attr_str("standard_name") {
            Some("longitude") => CoordinateType::Longitude,
            Some("latitude") => CoordinateType::Latitude,
            Some("time") => CoordinateType::Time,
            Some(name) if VERTICAL_STANDARD_NAMES.contains(&name) => CoordinateType::Vertical,
            _ => CoordinateType::Unknown,
        }
    }

    /// A dimension coordinate whose units name a pressure or length unit.
    pub fn can_be_vertical(variable: &Variable) -> bool {
        if !variable.is_dimension_coordinate() {
            return false;
        }
        let units = variable.attr_str("units").unwrap_or("").to_lowercase();
        if units.is_empty() {
            return false;
        }
        PRESSURE_UNITS
            .iter()
            .chain(LENGTH_UNITS)
            .any(|unit| units.contains(&unit.to_lowercase()))
    }

    /// A dimension coordinate named like a time unit (`time`, `day`, ...).
    pub fn can_be_time(variable: &Variable) -> bool {
        variable.is_dimension_coordinate() && TIME_UNITS.contains(&variable.name())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinateType::Longitude => "longitude",
            CoordinateType::Latitude => "latitude",
            CoordinateType::Vertical => "vertical",
            CoordinateType::Time => "time",
            CoordinateType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CoordinateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coordinate variables playing each geographic role, plus the data
/// variables grouped by their dimension tuple.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRoles {
    pub conventions: Option<String>,
    /// `Conventions` mentions `CF-1` or `COARDS`.
    pub valid: bool,
    pub longitude: Option<String>,
    pub latitude: Option<String>,
    pub vertical: Option<String>,
    pub time: Option<String>,
    pub data_arrays: Vec<(Vec<String>, Vec<String>)>,
}

impl CoordinateRoles {
    /// Detect roles from the dataset's attributes.
    ///
    /// Dimensions of data variables are inspected first, then the remaining
    /// coordinates fill any role still missing. Bounds variables are never
    /// considered fields.
    pub fn detect(dataset: &Dataset) -> Self {
        let conventions = dataset.conventions().map(str::to_string);
        let valid = conventions
            .as_deref()
            .map(|c| c.contains("CF-1") || c.contains("COARDS"))
            .unwrap_or(false);

        let mut roles = Self {
            conventions,
            valid,
            ..Self::default()
        };

        for variable in dataset.data_vars() {
            let name = variable.name();
            if name.contains("bnd") || name.contains("bound") {
                continue;
            }

            let dims = variable.dims().to_vec();
            if let Some((_, names)) = roles.data_arrays.iter_mut().find(|(d, _)| *d == dims) {
                names.push(name.to_string());
                continue;
            }

            for dim in &dims {
                let Some(coord) = dataset.get(dim) else {
                    continue;
                };
                match CoordinateType::from_variable(coord) {
                    CoordinateType::Unknown => {
                        if roles.vertical.is_none() && CoordinateType::can_be_vertical(coord) {
                            roles.vertical = Some(dim.clone());
                        } else if roles.time.is_none() && CoordinateType::can_be_time(coord) {
                            roles.time = Some(dim.clone());
                        }
                    }
                    detected => roles.set(detected, Some(dim.clone())),
                }
            }
            roles.data_arrays.push((dims, vec![name.to_string()]));
        }

        if roles.longitude.is_none() || roles.latitude.is_none() || roles.vertical.is_none() {
            for coord in dataset.coords() {
                let name = Some(coord.name().to_string());
                match CoordinateType::from_variable(coord) {
                    CoordinateType::Unknown => {
                        if roles.vertical.is_none() && CoordinateType::can_be_vertical(coord) {
                            roles.vertical = name;
                        }
                    }
                    detected if roles.get(detected).is_none() => roles.set(detected, name),
                    _ => {}
                }
            }
        }

        tracing::debug!(
            longitude = ?roles.longitude,
            latitude = ?roles.latitude,
            vertical = ?roles.vertical,
            time = ?roles.time,
            "Detected coordinate roles"
        );

        roles
    }

    /// Override detected roles with an explicit axis assignment
    /// (`x` = longitude, `y` = latitude, `z` = vertical, `t` = time).
    pub fn with_assignment(mut self, assignment: &AxisAssignment) -> Self {
        for role in AxisRole::ALL {
            if let Some(name) = assignment.get(role) {
                let target = match role {
                    AxisRole::X => CoordinateType::Longitude,
                    AxisRole::Y => CoordinateType::Latitude,
                    AxisRole::Z => CoordinateType::Vertical,
                    AxisRole::T => CoordinateType::Time,
                };
                self.set(target, Some(name.to_string()));
            }
        }
        self
    }

    pub fn get(&self, role: CoordinateType) -> Option<&str> {
        match role {
            CoordinateType::Longitude => self.longitude.as_deref(),
            CoordinateType::Latitude => self.latitude.as_deref(),
            CoordinateType::Vertical => self.vertical.as_deref(),
            CoordinateType::Time => self.time.as_deref(),
            CoordinateType::Unknown => None,
        }
    }

    pub fn set(&mut self, role: CoordinateType, name: Option<String>) {
        match role {
            CoordinateType::Longitude => self.longitude = name,
            CoordinateType::Latitude => self.latitude = name,
            CoordinateType::Vertical => self.vertical = name,
            CoordinateType::Time => self.time = name,
            CoordinateType::Unknown => {}
        }
    }

    /// Longitude, latitude and (if any) vertical are all among `dims`.
    pub fn use_coords(&self, dims: &[String]) -> bool {
        let contains = |name: &Option<String>| {
            name.as_ref()
                .map(|n| dims.iter().any(|d| d == n))
                .unwrap_or(false)
        };
        contains(&self.longitude)
            && contains(&self.latitude)
            && (self.vertical.is_none() || contains(&self.vertical))
    }

    /// Data variable names, in detection order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.data_arrays
            .iter()
            .flat_map(|(_, names)| names.iter().map(String::as_str))
    }
}

impl fmt::Display for CoordinateRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |name: &Option<String>| name.clone().unwrap_or_else(|| "None".to_string());
        writeln!(
            f,
            "Conventions: {} {}",
            self.conventions.as_deref().unwrap_or("None"),
            if self.valid { "(valid)" } else { "(unknown)" }
        )?;
        writeln!(f, "Coordinates:")?;
        writeln!(f, "  - longitude : {}", show(&self.longitude))?;
        writeln!(f, "  - latitude  : {}", show(&self.latitude))?;
        writeln!(f, "  - vertical  : {}", show(&self.vertical))?;
        writeln!(f, "  - time      : {}", show(&self.time))?;
        writeln!(f, "Data:")?;
        for (dims, names) in &self.data_arrays {
            writeln!(f, " - ({}):", dims.join(", "))?;
            for name in names {
                writeln!(f, "    - {}", name)?;
            }
        }
        Ok(())
    }
}

/// Properties of the active coordinates that select a mesh generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinateClassification {
    /// Longitude, latitude and vertical are each 1-D and indexed by their own name.
    pub coords_1d: bool,
    /// Longitude and latitude both carry a `bounds` attribute.
    pub coords_has_bounds: bool,
    /// Every active axis is uniformly spaced (after slicing) and the
    /// coordinates are directly usable.
    pub uniform_spacing: bool,
    /// Longitude and latitude are uniformly spaced (after slicing).
    pub uniform_lat_lon: bool,
    /// Longitude, latitude and vertical are active dimensions of the field
    /// and the vertical needs no formula.
    pub direct_coords: bool,
}

impl CoordinateClassification {
    /// Classify the coordinates of a request over the active `dims`.
    pub fn compute(
        dataset: &Dataset,
        roles: &CoordinateRoles,
        dims: &[String],
        slices: &SliceSpec,
    ) -> MeshResult<Self> {
        let lookup = move |name: &Option<String>| name.as_deref().and_then(|n| dataset.get(n));
        let longitude = lookup(&roles.longitude);
        let latitude = lookup(&roles.latitude);
        let vertical = lookup(&roles.vertical);

        let is_dimension = |v: Option<&Variable>| v.map(Variable::is_dimension_coordinate);
        let coords_1d = is_dimension(longitude).unwrap_or(false)
            && is_dimension(latitude).unwrap_or(false)
            && is_dimension(vertical).unwrap_or(true);

        let has_bounds = |v: Option<&Variable>| {
            v.map(|v| v.attrs().contains_key("bounds")).unwrap_or(false)
        };
        let coords_has_bounds = has_bounds(longitude) && has_bounds(latitude);

        let uniform_lat_lon = match (longitude, latitude) {
            (Some(lon), Some(lat)) if coords_1d => {
                let lon = slice_variable(lon, slices);
                let lat = slice_variable(lat, slices);
                axis_is_uniform(lon.view().into_dimensionality()?)
                    && axis_is_uniform(lat.view().into_dimensionality()?)
            }
            _ => false,
        };

        let vertical_is_formula = vertical
            .map(|v| v.attrs().contains_key("formula_terms"))
            .unwrap_or(false);
        let direct_coords = coords_1d && roles.use_coords(dims) && !vertical_is_formula;

        let mut uniform_spacing = uniform_lat_lon && direct_coords;
        if uniform_spacing {
            for dim in dims {
                let values = slice_dimension(dim, dataset, slices)?;
                if !axis_is_uniform(values.view()) {
                    uniform_spacing = false;
                    break;
                }
            }
        }

        Ok(Self {
            coords_1d,
            coords_has_bounds,
            uniform_spacing,
            uniform_lat_lon,
            direct_coords,
        })
    }
}

impl fmt::Display for CoordinateClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Computed:")?;
        writeln!(f, "  - has_bound     : {}", self.coords_has_bounds)?;
        writeln!(f, "  - uniform (2D)  : {}", self.uniform_lat_lon)?;
        writeln!(f, "  - uniform (all) : {}", self.uniform_spacing)?;
        writeln!(f, "  - coords 1d     : {}", self.coords_1d)?;
        writeln!(f, "  - direct coords : {}", self.direct_coords)
    }
}
