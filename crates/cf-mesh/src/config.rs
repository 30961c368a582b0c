//! Configuration for mesh generation.

use serde::{Deserialize, Serialize};

/// Earth radius in meters, the default vertical bias for spherical output.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Configuration shared by every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Project longitude/latitude onto a sphere instead of a plane.
    pub spherical: bool,

    /// Offset added to every vertical position.
    pub vertical_bias: f64,

    /// Factor applied to every vertical position before the bias.
    pub vertical_scale: f64,

    /// Fill structured point buffers on the rayon pool.
    pub parallel: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            spherical: true,
            vertical_bias: EARTH_RADIUS_M,
            vertical_scale: 100.0,
            parallel: true,
        }
    }
}

impl MeshConfig {
    /// Planar output: coordinates pass through unchanged and z is not offset.
    pub fn planar() -> Self {
        Self {
            spherical: false,
            vertical_bias: 0.0,
            vertical_scale: 1.0,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MESH_SPHERICAL") {
            if let Some(spherical) = parse_bool("MESH_SPHERICAL", &val) {
                config.spherical = spherical;
            }
        }

        if let Ok(val) = std::env::var("MESH_VERTICAL_BIAS") {
            if let Some(bias) = parse_number("MESH_VERTICAL_BIAS", &val) {
                config.vertical_bias = bias;
            }
        }

        if let Ok(val) = std::env::var("MESH_VERTICAL_SCALE") {
            if let Some(scale) = parse_number("MESH_VERTICAL_SCALE", &val) {
                config.vertical_scale = scale;
            }
        }

        if let Ok(val) = std::env::var("MESH_PARALLEL") {
            if let Some(parallel) = parse_bool("MESH_PARALLEL", &val) {
                config.parallel = parallel;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.vertical_bias.is_finite() {
            return Err("vertical_bias must be finite".to_string());
        }

        if !self.vertical_scale.is_finite() || self.vertical_scale == 0.0 {
            return Err("vertical_scale must be finite and non-zero".to_string());
        }

        Ok(())
    }

    /// `bias + scale * z`.
    #[inline]
    pub fn adjust_vertical(&self, z: f64) -> f64 {
        self.vertical_bias + self.vertical_scale * z
    }
}

fn parse_bool(key: &str, val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => {
            tracing::warn!(key, value = val, "Ignoring non-boolean environment value");
            None
        }
    }
}

fn parse_number(key: &str, val: &str) -> Option<f64> {
    match val.trim().parse() {
        Ok(number) => Some(number),
        Err(_) => {
            tracing::warn!(key, value = val, "Ignoring non-numeric environment value");
            None
        }
    }
}
