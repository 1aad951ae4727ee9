use crate::config::SolarConfig;
use crate::devices::types::{Generator, SourceKind};

/// A solar panel with a linear response to irradiance.
///
/// `watts = irradiance / 1000 * panel_area_factor * interval_scale`
///
/// Negative readings (sensor noise at night) produce zero output, so the
/// result is never negative.
#[derive(Debug, Clone)]
pub struct SolarPanel {
    /// Effective panel area multiplier.
    pub panel_area_factor: f64,

    /// Converts one interval reading into a rate.
    pub interval_scale: f64,
}

impl SolarPanel {
    /// Creates a new panel. Negative constants are clamped to zero.
    pub fn new(panel_area_factor: f64, interval_scale: f64) -> Self {
        Self {
            panel_area_factor: panel_area_factor.max(0.0),
            interval_scale: interval_scale.max(0.0),
        }
    }

    pub fn from_config(config: &SolarConfig) -> Self {
        Self::new(config.panel_area_factor, config.interval_scale)
    }
}

impl Generator for SolarPanel {
    fn power_w(&self, irradiance: f64) -> f64 {
        let watts = irradiance / 1000.0 * self.panel_area_factor * self.interval_scale;
        watts.max(0.0)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Solar
    }
}
