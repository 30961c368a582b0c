//! Synthetic CF datasets covering each mesh topology.
//!
//! Every fixture is small enough to check point by point, and every data
//! variable is an [`index_ramp`] so flattened payloads are easy to verify.

use mesh_common::{Dataset, Variable};
use ndarray::ArrayD;

use crate::generators::{from_fn_2d, index_ramp, linspace, stretched};

/// Name of the data variable in the 2-D fixtures.
pub const AIR: &str = "air";

/// Names of the data variables in the 3-D fixtures.
pub const TEMP: &str = "temp";
pub const SALT: &str = "salt";

fn dims(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn var(name: &str, names: &[&str], data: ArrayD<f64>) -> Variable {
    Variable::new(name, dims(names), data).expect("fixture variable")
}

fn longitude(name: &str, values: Vec<f64>) -> Variable {
    Variable::coordinate(name, values)
        .with_attr("units", "degrees_east")
        .with_attr("standard_name", "longitude")
}

fn latitude(name: &str, values: Vec<f64>) -> Variable {
    Variable::coordinate(name, values)
        .with_attr("units", "degrees_north")
        .with_attr("standard_name", "latitude")
}

fn build(coords: Vec<Variable>, data_vars: Vec<Variable>) -> Dataset {
    let mut ds = Dataset::new().with_attr("Conventions", "CF-1.6");
    for coord in coords {
        ds.add_coord(coord).expect("fixture coordinate");
    }
    for variable in data_vars {
        ds.add_data_var(variable).expect("fixture data variable");
    }
    ds
}

/// `air(lat, lon)` on evenly spaced axes: lat from -30 by 20, lon from 0 by 30.
pub fn uniform_lat_lon(nlat: usize, nlon: usize) -> Dataset {
    build(
        vec![
            latitude("lat", linspace(-30.0, -30.0 + 20.0 * (nlat as f64 - 1.0), nlat)),
            longitude("lon", linspace(0.0, 30.0 * (nlon as f64 - 1.0), nlon)),
        ],
        vec![var(AIR, &["lat", "lon"], index_ramp(&[nlat, nlon]))],
    )
}

/// `air(lat, lon)` with a geometrically stretched longitude axis
/// (`[0, 1, 3, 7, 15]` for five samples).
pub fn uneven_lat_lon(nlat: usize, nlon: usize) -> Dataset {
    build(
        vec![
            latitude("lat", linspace(-30.0, -30.0 + 20.0 * (nlat as f64 - 1.0), nlat)),
            longitude("lon", stretched(0.0, 1.0, 2.0, nlon)),
        ],
        vec![var(AIR, &["lat", "lon"], index_ramp(&[nlat, nlon]))],
    )
}

/// Uniform lat/lon whose coordinates declare cell bounds.
pub fn bounded_lat_lon(nlat: usize, nlon: usize) -> Dataset {
    let lat = linspace(-30.0, -30.0 + 20.0 * (nlat as f64 - 1.0), nlat);
    let lon = linspace(0.0, 30.0 * (nlon as f64 - 1.0), nlon);
    let bounds = |centers: &[f64], half: f64| {
        from_fn_2d(centers.len(), 2, |r, c| {
            if c == 0 {
                centers[r] - half
            } else {
                centers[r] + half
            }
        })
    };
    let lat_bnds = bounds(&lat, 10.0);
    let lon_bnds = bounds(&lon, 15.0);

    build(
        vec![
            latitude("lat", lat).with_attr("bounds", "lat_bnds"),
            longitude("lon", lon).with_attr("bounds", "lon_bnds"),
        ],
        vec![
            var(AIR, &["lat", "lon"], index_ramp(&[nlat, nlon])),
            var("lat_bnds", &["lat", "nv"], lat_bnds),
            var("lon_bnds", &["lon", "nv"], lon_bnds),
        ],
    )
}

/// 4-D `temp`/`salt(time, lev, lat, lon)` with 2 times, 3 levels (0, 500,
/// 1000 m), 4 latitudes and 5 longitudes, all evenly spaced. Also carries a
/// 2-D `topo(lat, lon)`.
pub fn uniform_4d() -> Dataset {
    let time = Variable::coordinate("time", vec![0.0, 6.0])
        .with_attr("units", "hours since 2000-01-01")
        .with_attr("calendar", "standard");
    let lev = Variable::coordinate("lev", linspace(0.0, 1000.0, 3))
        .with_attr("units", "m")
        .with_attr("positive", "up");

    build(
        vec![
            time,
            lev,
            latitude("lat", linspace(-30.0, 30.0, 4)),
            longitude("lon", linspace(0.0, 120.0, 5)),
        ],
        vec![
            var(TEMP, &["time", "lev", "lat", "lon"], index_ramp(&[2, 3, 4, 5])),
            var(SALT, &["time", "lev", "lat", "lon"], index_ramp(&[2, 3, 4, 5])),
            var("topo", &["lat", "lon"], index_ramp(&[4, 5])),
        ],
    )
}

/// Curvilinear ocean model output with an `ocean_s_coordinate_g2` vertical.
///
/// Dimensions: `ocean_time` (2), `s_rho` (3), `eta_rho` (4), `xi_rho` (5).
/// `lon_rho = 10 + 0.5 xi + 0.1 eta`, `lat_rho = 40 + 0.5 eta + 0.05 xi`,
/// bathymetry `h = 100 + 10 xi`, free surface `zeta = 0.5 n`, `hc = 20`.
pub fn curvilinear_ocean() -> Dataset {
    let (ns, ny, nx) = (3, 4, 5);

    let time = Variable::coordinate("ocean_time", vec![0.0, 3600.0])
        .with_attr("units", "seconds since 2000-01-01");
    let s_rho = Variable::coordinate("s_rho", vec![-0.75, -0.5, -0.25])
        .with_attr("standard_name", "ocean_s_coordinate_g2")
        .with_attr("positive", "up")
        .with_attr("formula_terms", "s: s_rho C: Cs_r eta: zeta depth: h depth_c: hc");
    let lon_rho = var(
        "lon_rho",
        &["eta_rho", "xi_rho"],
        from_fn_2d(ny, nx, |j, i| 10.0 + 0.5 * i as f64 + 0.1 * j as f64),
    )
    .with_attr("units", "degrees_east");
    let lat_rho = var(
        "lat_rho",
        &["eta_rho", "xi_rho"],
        from_fn_2d(ny, nx, |j, i| 40.0 + 0.5 * j as f64 + 0.05 * i as f64),
    )
    .with_attr("units", "degrees_north");

    let zeta = ndarray::Array3::from_shape_fn((2, ny, nx), |(n, _, _)| 0.5 * n as f64).into_dyn();

    build(
        vec![time, s_rho, lon_rho, lat_rho],
        vec![
            var(TEMP, &["ocean_time", "s_rho", "eta_rho", "xi_rho"], index_ramp(&[2, ns, ny, nx])),
            var("Cs_r", &["s_rho"], ndarray::arr1(&[-0.6, -0.3, -0.1]).into_dyn()),
            var("h", &["eta_rho", "xi_rho"], from_fn_2d(ny, nx, |_, i| 100.0 + 10.0 * i as f64)),
            var("zeta", &["ocean_time", "eta_rho", "xi_rho"], zeta),
            Variable::scalar("hc", 20.0),
        ],
    )
}

/// Planar `height(y, x)` with no geographic attributes at all.
pub fn planar_xy(ny: usize, nx: usize) -> Dataset {
    build(
        vec![
            Variable::coordinate("y", linspace(0.0, ny as f64 - 1.0, ny)),
            Variable::coordinate("x", linspace(0.0, 2.0 * (nx as f64 - 1.0), nx)),
        ],
        vec![var("height", &["y", "x"], index_ramp(&[ny, nx]))],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_shapes() {
        let ds = uniform_4d();
        assert_eq!(ds.dim_size("time"), Some(2));
        assert_eq!(ds.dim_size("lev"), Some(3));
        assert_eq!(ds.get(TEMP).unwrap().shape(), &[2, 3, 4, 5]);

        let ocean = curvilinear_ocean();
        assert_eq!(ocean.get("lon_rho").unwrap().shape(), &[4, 5]);
        assert_eq!(ocean.get("zeta").unwrap().data()[[1, 0, 0]], 0.5);
    }

    #[test]
    fn test_uniform_axes() {
        let ds = uniform_lat_lon(3, 4);
        let lon = ds.get("lon").unwrap().data().iter().copied().collect::<Vec<_>>();
        assert_eq!(lon, vec![0.0, 30.0, 60.0, 90.0]);
    }
}
