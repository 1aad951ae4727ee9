//! Optional per-resource consumption figures.

use std::collections::HashMap;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::cluster::ResourceId;
use crate::error::ExogenousQueryError;

/// External source of current resource usage.
pub trait ConsumptionSource {
    /// Current usage per resource as a fraction of capacity.
    ///
    /// Resources missing from the map have no consumption this tick.
    fn query_current_usage(&mut self) -> Result<HashMap<ResourceId, f64>, ExogenousQueryError>;
}

/// Seeded uniform usage fractions for a fixed set of resources.
#[derive(Debug, Clone)]
pub struct SyntheticUsage {
    resources: Vec<ResourceId>,
    rng: StdRng,
}

impl SyntheticUsage {
    pub fn new(resources: Vec<ResourceId>, seed: u64) -> Self {
        Self {
            resources,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ConsumptionSource for SyntheticUsage {
    fn query_current_usage(&mut self) -> Result<HashMap<ResourceId, f64>, ExogenousQueryError> {
        Ok(self
            .resources
            .iter()
            .map(|id| (id.clone(), self.rng.random_range(0.0..=1.0)))
            .collect())
    }
}

impl<S: ConsumptionSource + ?Sized> ConsumptionSource for Box<S> {
    fn query_current_usage(&mut self) -> Result<HashMap<ResourceId, f64>, ExogenousQueryError> {
        (**self).query_current_usage()
    }
}

/// Integer watts drawn at `fraction` of `nominal_power_w`.
///
/// Fractions outside [0, 1] are clamped.
pub fn consumption_watts(fraction: f64, nominal_power_w: f64) -> i64 {
    (fraction.clamp(0.0, 1.0) * nominal_power_w).round() as i64
}
