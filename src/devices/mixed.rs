use crate::config::MixedConfig;
use crate::devices::types::{SourceKind, round_to};

/// Weighted blend of two or more generation sources.
///
/// Each component is scaled by its own weight in (0, 1], the products are
/// summed, and the total is rounded to a fixed number of decimal places.
#[derive(Debug, Clone)]
pub struct MixedSupply {
    components: Vec<(SourceKind, f64)>,
    precision: u32,
}

impl MixedSupply {
    /// Creates a blend from `(source, weight)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two components are given or a weight lies
    /// outside (0, 1].
    pub fn new(components: Vec<(SourceKind, f64)>, precision: u32) -> Self {
        assert!(components.len() >= 2, "a blend needs at least two sources");
        assert!(
            components.iter().all(|(_, w)| *w > 0.0 && *w <= 1.0),
            "weights must be in (0, 1]"
        );
        Self {
            components,
            precision,
        }
    }

    /// Solar + wind blend from configuration.
    pub fn from_config(config: &MixedConfig, precision: u32) -> Self {
        Self::new(
            vec![
                (SourceKind::Solar, config.solar_weight),
                (SourceKind::Wind, config.wind_weight),
            ],
            precision,
        )
    }

    /// Blends one value per component, in the order given to [`MixedSupply::new`].
    pub fn blend(&self, values: &[f64]) -> f64 {
        let total: f64 = self
            .components
            .iter()
            .zip(values)
            .map(|((_, weight), value)| weight * value)
            .sum();
        round_to(total, self.precision)
    }

    /// Blends aligned series element-wise.
    ///
    /// The output is as long as the shortest input series.
    pub fn blend_series(&self, series: &[&[f64]]) -> Vec<f64> {
        let len = series.iter().map(|s| s.len()).min().unwrap_or(0);
        let mut row = vec![0.0; series.len()];
        (0..len)
            .map(|i| {
                for (slot, s) in row.iter_mut().zip(series) {
                    *slot = s[i];
                }
                self.blend(&row)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supply() -> MixedSupply {
        MixedSupply::from_config(&MixedConfig::default(), 1)
    }

    #[test]
    fn blend_is_weighted_sum() {
        assert_eq!(supply().blend(&[10.0, 5.0]), 9.0);
        assert_eq!(supply().blend(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn blend_rounds_to_precision() {
        let s = MixedSupply::new(vec![(SourceKind::Solar, 0.3), (SourceKind::Wind, 0.3)], 2);
        assert_eq!(s.blend(&[1.111, 1.111]), 0.67);
    }

    #[test]
    fn blend_series_uses_shortest_length() {
        let solar = [10.0, 20.0, 30.0];
        let wind = [5.0, 5.0];
        let mixed = supply().blend_series(&[&solar, &wind]);
        assert_eq!(mixed, vec![9.0, 15.0]);
    }

    #[test]
    #[should_panic]
    fn zero_weight_panics() {
        MixedSupply::new(vec![(SourceKind::Solar, 0.0), (SourceKind::Wind, 0.5)], 1);
    }

    #[test]
    #[should_panic]
    fn single_source_panics() {
        MixedSupply::new(vec![(SourceKind::Solar, 0.5)], 1);
    }
}
