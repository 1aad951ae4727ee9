//! Look-ahead forecasts derived from a generated power series.

use std::collections::BTreeMap;

/// Oracle forecaster: the mean of the next `horizon` samples.
///
/// The window for index `i` is `[i, i + horizon)`, so it looks forward from the
/// current sample rather than smoothing the past. Rows too close to the end
/// of the series to fill a whole window get `0.0`.
///
/// # Examples
///
/// ```
/// use renewable_annotator::forecast::LeadingMeanForecast;
///
/// let forecast = LeadingMeanForecast.forecast(&[2.0, 4.0, 6.0, 8.0], 2);
/// assert_eq!(forecast, vec![3.0, 5.0, 7.0, 0.0]);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct LeadingMeanForecast;

impl LeadingMeanForecast {
    /// Produce a forecast for one horizon.
    ///
    /// # Arguments
    ///
    /// * `series` - Instantaneous values, oldest first
    /// * `horizon` - Window length in samples
    ///
    /// # Returns
    ///
    /// A vector the same length as `series`. The last `horizon - 1` entries
    /// are `0.0`. A zero horizon yields all zeros.
    pub fn forecast(&self, series: &[f64], horizon: usize) -> Vec<f64> {
        let mut forecast = vec![0.0; series.len()];
        if horizon == 0 || series.len() < horizon {
            return forecast;
        }

        // Summed per window; a running sum leaves residue on all-zero windows.
        let n = horizon as f64;
        for (slot, window) in forecast.iter_mut().zip(series.windows(horizon)) {
            *slot = window.iter().sum::<f64>() / n;
        }
        forecast
    }

    /// Produce one forecast per horizon, keyed by horizon length.
    ///
    /// Horizons are independent of each other; duplicates collapse.
    pub fn forecast_all(&self, series: &[f64], horizons: &[usize]) -> BTreeMap<usize, Vec<f64>> {
        horizons
            .iter()
            .map(|&h| (h, self.forecast(series, h)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::LeadingMeanForecast;
    use crate::devices::types::round_to;

    #[test]
    fn forecast_matches_series_length() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(LeadingMeanForecast.forecast(&series, 3).len(), 5);
    }

    #[test]
    fn forecast_is_mean_of_leading_window() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let f = LeadingMeanForecast.forecast(&series, 3);
        assert_eq!(&f[..4], &[2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn tail_rows_are_exactly_zero() {
        let series: Vec<f64> = (1..=20).map(f64::from).collect();
        for horizon in 1..=6 {
            let f = LeadingMeanForecast.forecast(&series, horizon);
            let tail = &f[series.len() - (horizon - 1)..];
            assert!(tail.iter().all(|v| *v == 0.0), "horizon {horizon}: {tail:?}");
            assert!(f[series.len() - horizon] > 0.0);
        }
    }

    #[test]
    fn horizon_one_is_identity() {
        let series = vec![0.5, 1.5, 2.5];
        assert_eq!(LeadingMeanForecast.forecast(&series, 1), series);
    }

    #[test]
    fn horizon_longer_than_series_is_all_zero() {
        let f = LeadingMeanForecast.forecast(&[1.0, 2.0], 5);
        assert_eq!(f, vec![0.0, 0.0]);
    }

    #[test]
    fn zero_windows_after_fractional_values_are_exactly_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut series: Vec<f64> = (0..40)
            .map(|_| round_to(rng.random_range(0.0..900.0), 1))
            .collect();
        series.extend([0.0; 60]);

        for horizon in [1, 6, 36] {
            let f = LeadingMeanForecast.forecast(&series, horizon);
            for (i, v) in f.iter().enumerate() {
                assert!(*v >= 0.0 && v.is_sign_positive(), "horizon {horizon} row {i}: {v}");
                if i >= 40 {
                    assert_eq!(*v, 0.0, "horizon {horizon} row {i}");
                }
            }
        }
    }

    #[test]
    fn forecast_all_keys_by_horizon() {
        let series = vec![4.0, 4.0, 4.0, 4.0];
        let all = LeadingMeanForecast.forecast_all(&series, &[1, 2, 2]);
        assert_eq!(all.len(), 2);
        assert_eq!(all[&2], vec![4.0, 4.0, 4.0, 0.0]);
    }
}
