//! Longitude/latitude/vertical to Cartesian conversion.

/// Convert a geographic sample to a mesh point.
///
/// Planar mode returns `(longitude, latitude, vertical)` unchanged. Spherical
/// mode treats longitude and latitude as degrees and `vertical` as the radius.
#[inline]
pub fn point_insert(spherical: bool, longitude: f64, latitude: f64, vertical: f64) -> [f64; 3] {
    if !spherical {
        return [longitude, latitude, vertical];
    }

    let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
    let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
    [
        vertical * cos_lon * cos_lat,
        vertical * sin_lon * cos_lat,
        vertical * sin_lat,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_planar_identity() {
        assert_eq!(point_insert(false, 10.0, 20.0, 5.0), [10.0, 20.0, 5.0]);
    }

    #[test]
    fn test_spherical_axes() {
        let r = 6378137.0;
        assert_eq!(point_insert(true, 0.0, 0.0, r), [r, 0.0, 0.0]);

        let p = point_insert(true, 90.0, 0.0, r);
        assert!(p[0].abs() < 1e-6);
        assert!((p[1] - r).abs() < 1e-6);

        let north = point_insert(true, 123.0, 90.0, 2.0);
        assert!(north[0].abs() < EPS && north[1].abs() < EPS);
        assert!((north[2] - 2.0).abs() < EPS);
    }

    #[test]
    fn test_spherical_radius_preserved() {
        let p = point_insert(true, -37.5, 41.2, 3.0);
        let radius = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        assert!((radius - 3.0).abs() < EPS);
    }
}
