use std::f64::consts::FRAC_PI_2;

use crate::config::WindConfig;
use crate::devices::types::{Generator, SourceKind};

/// A horizontal-axis wind turbine following the cubic power law.
///
/// `watts = (π/2) * r² * v³ * ρ * cp`, with two clamps:
/// - below `cut_in_speed` the rotor does not turn and output is 0
/// - output above `rated_capacity_w` is limited to exactly the rating
#[derive(Debug, Clone)]
pub struct WindTurbine {
    /// Rotor radius in metres.
    pub rotor_radius_m: f64,

    /// Air density in kg/m³.
    pub air_density: f64,

    /// Fraction of the wind's kinetic power that is harvested.
    pub power_coefficient: f64,

    /// Minimum speed for any output.
    pub cut_in_speed: f64,

    /// Nameplate capacity in watts.
    pub rated_capacity_w: f64,
}

impl WindTurbine {
    /// Creates a new turbine.
    ///
    /// # Panics
    ///
    /// Panics if `rated_capacity_w` is not positive.
    pub fn new(
        rotor_radius_m: f64,
        air_density: f64,
        power_coefficient: f64,
        cut_in_speed: f64,
        rated_capacity_w: f64,
    ) -> Self {
        assert!(rated_capacity_w > 0.0, "rated_capacity_w must be > 0");
        Self {
            rotor_radius_m: rotor_radius_m.max(0.0),
            air_density: air_density.max(0.0),
            power_coefficient: power_coefficient.clamp(0.0, 1.0),
            cut_in_speed: cut_in_speed.max(0.0),
            rated_capacity_w,
        }
    }

    pub fn from_config(config: &WindConfig) -> Self {
        Self::new(
            config.rotor_radius_m,
            config.air_density,
            config.power_coefficient,
            config.cut_in_speed,
            config.rated_capacity_w,
        )
    }

    /// Unclamped aerodynamic power at `speed`.
    fn raw_power_w(&self, speed: f64) -> f64 {
        FRAC_PI_2
            * self.rotor_radius_m.powi(2)
            * speed.powi(3)
            * self.air_density
            * self.power_coefficient
    }
}

impl Generator for WindTurbine {
    fn power_w(&self, speed: f64) -> f64 {
        if speed < self.cut_in_speed {
            return 0.0;
        }
        self.raw_power_w(speed).clamp(0.0, self.rated_capacity_w)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Wind
    }
}
