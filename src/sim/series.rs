//! Turns station observations into the composite rows the replay loop walks.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

use crate::config::AnnotatorConfig;
use crate::devices::types::round_to;
use crate::devices::{Generator, MixedSupply, PowerSample, SolarPanel, SourceKind, WindTurbine};
use crate::error::{Error, Result};
use crate::forecast::LeadingMeanForecast;
use crate::io::station::{StationFormat, read_station_file};

/// Current value and look-ahead forecasts of one source at one timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceValues {
    pub watts: f64,
    /// Forecast per horizon length.
    pub forecasts: BTreeMap<usize, f64>,
}

/// Every source's values for one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRow {
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<SourceKind, SourceValues>,
}

impl CompositeRow {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert used by tests and fixtures.
    pub fn with(mut self, kind: SourceKind, watts: f64, forecasts: &[(usize, f64)]) -> Self {
        self.values.insert(
            kind,
            SourceValues {
                watts,
                forecasts: forecasts.iter().copied().collect(),
            },
        );
        self
    }

    pub fn get(&self, kind: SourceKind) -> Option<&SourceValues> {
        self.values.get(&kind)
    }
}

/// Generation and forecast pipeline.
///
/// Ten-minute and hourly runs use the same builder and differ only in window
/// size, rounding, loss range and horizon set.
#[derive(Debug, Clone)]
pub struct SeriesBuilder {
    solar: SolarPanel,
    wind: WindTurbine,
    mixed: MixedSupply,
    window_size: usize,
    precision: u32,
    loss_range: (f64, f64),
    horizons: Vec<usize>,
    seed: u64,
}

impl SeriesBuilder {
    pub fn from_config(config: &AnnotatorConfig) -> Self {
        let p = &config.pipeline;
        Self {
            solar: SolarPanel::from_config(&config.solar),
            wind: WindTurbine::from_config(&config.wind),
            mixed: MixedSupply::from_config(&config.mixed, p.rounding_precision),
            window_size: p.window_size.max(1),
            precision: p.rounding_precision,
            loss_range: (p.loss_factor_min, p.loss_factor_max),
            horizons: p.horizons.clone(),
            seed: p.seed,
        }
    }

    /// Builds composite rows from raw solar and wind observations.
    ///
    /// Only timestamps present in both inputs are kept, so every row carries
    /// every source. Steps:
    /// 1. generation model per source, then the random loss factor
    /// 2. mean over `window_size` consecutive samples (a shorter tail group
    ///    is averaged over what it has)
    /// 3. rounding, mixed blend, forecasts per horizon
    pub fn build(
        &self,
        solar_obs: &BTreeMap<NaiveDateTime, f64>,
        wind_obs: &BTreeMap<NaiveDateTime, f64>,
    ) -> Vec<CompositeRow> {
        let joined: Vec<(NaiveDateTime, f64, f64)> = solar_obs
            .iter()
            .filter_map(|(ts, irradiance)| wind_obs.get(ts).map(|speed| (*ts, *irradiance, *speed)))
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let (lo, hi) = self.loss_range;
        let mut lossy = |watts: f64| {
            if hi > 0.0 {
                watts * (1.0 - rng.random_range(lo..=hi))
            } else {
                watts
            }
        };

        let mut solar = Vec::with_capacity(joined.len());
        let mut wind = Vec::with_capacity(joined.len());
        for (ts, irradiance, speed) in &joined {
            let mut s = self.solar.sample(*ts, *irradiance);
            s.watts = lossy(s.watts);
            solar.push(s);
            let mut w = self.wind.sample(*ts, *speed);
            w.watts = lossy(w.watts);
            wind.push(w);
        }

        let timestamps: Vec<NaiveDateTime> = solar
            .chunks(self.window_size)
            .map(|c| c[0].timestamp)
            .collect();
        let solar_w = self.resample(&solar);
        let wind_w = self.resample(&wind);
        let mixed_w = self.mixed.blend_series(&[&solar_w, &wind_w]);

        let mut series: BTreeMap<SourceKind, Vec<f64>> = BTreeMap::new();
        series.insert(self.solar.kind(), solar_w);
        series.insert(self.wind.kind(), wind_w);
        series.insert(SourceKind::Mixed, mixed_w);

        let forecasts: BTreeMap<SourceKind, BTreeMap<usize, Vec<f64>>> = series
            .iter()
            .map(|(kind, values)| {
                (*kind, LeadingMeanForecast.forecast_all(values, &self.horizons))
            })
            .collect();

        timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| {
                let mut row = CompositeRow::new(*ts);
                for (kind, values) in &series {
                    let per_horizon = forecasts
                        .get(kind)
                        .map(|by_h| {
                            by_h.iter()
                                .map(|(h, f)| (*h, round_to(f[i], self.precision)))
                                .collect()
                        })
                        .unwrap_or_default();
                    row.values.insert(
                        *kind,
                        SourceValues {
                            watts: values[i],
                            forecasts: per_horizon,
                        },
                    );
                }
                row
            })
            .collect()
    }

    fn resample(&self, samples: &[PowerSample]) -> Vec<f64> {
        samples
            .chunks(self.window_size)
            .map(|c| {
                let mean = c.iter().map(|s| s.watts).sum::<f64>() / c.len() as f64;
                round_to(mean, self.precision)
            })
            .collect()
    }
}

/// Loads both station files for the configured window and builds the rows.
///
/// # Errors
///
/// Returns [`Error::Config`] for an unparseable window, [`Error::Io`] when a
/// station file cannot be opened, and [`Error::EmptySeries`] when nothing
/// falls inside the window.
pub fn prepare_series(config: &AnnotatorConfig) -> Result<Vec<CompositeRow>> {
    let (start, end) = config
        .window
        .bounds()
        .map_err(|e| Error::Config(vec![e]))?;
    let prefix = config.window.prefix();
    let d = &config.data;
    let delimiter = u8::try_from(d.delimiter).unwrap_or(b';');

    let solar_format = StationFormat::new(d.solar_column, delimiter, d.missing_value);
    let wind_format = StationFormat::new(d.wind_column, delimiter, d.missing_value);
    let solar = read_station_file(&d.solar_path, &solar_format, &prefix)?;
    let wind = read_station_file(&d.wind_path, &wind_format, &prefix)?;

    let in_window = |obs: BTreeMap<NaiveDateTime, f64>| -> BTreeMap<NaiveDateTime, f64> {
        obs.range(start..=end).map(|(k, v)| (*k, *v)).collect()
    };
    let rows = SeriesBuilder::from_config(config)
        .build(&in_window(solar.observations), &in_window(wind.observations));

    if rows.is_empty() {
        return Err(Error::EmptySeries {
            start: config.window.start.clone(),
            end: config.window.end.clone(),
        });
    }
    info!(
        rows = rows.len(),
        first = %rows[0].timestamp,
        last = %rows[rows.len() - 1].timestamp,
        "series prepared"
    );
    Ok(rows)
}
