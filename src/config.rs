//! TOML-based run configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::io::station::TIMESTAMP_FORMAT;
use crate::sim::equipment::AssignmentRule;
use crate::sim::replay::FeedMode;

/// Top-level configuration parsed from TOML.
///
/// All fields have defaults matching the baseline run. Load from TOML with
/// [`AnnotatorConfig::from_toml_file`] or use [`AnnotatorConfig::baseline`]
/// for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnotatorConfig {
    /// Replay date window.
    #[serde(default)]
    pub window: WindowConfig,
    /// Station data files and column layout.
    #[serde(default)]
    pub data: DataConfig,
    /// Solar panel constants.
    #[serde(default)]
    pub solar: SolarConfig,
    /// Wind turbine constants.
    #[serde(default)]
    pub wind: WindConfig,
    /// Mixed-supply weights.
    #[serde(default)]
    pub mixed: MixedConfig,
    /// Series preparation options shared by all sources.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Replay loop settings.
    #[serde(default)]
    pub replay: ReplayConfig,
    /// Score normalization settings.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Inclusive date window, both ends in `YYYYMMDDHHMM`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: "202107010000".to_string(),
            end: "202107072350".to_string(),
        }
    }
}

impl WindowConfig {
    /// Parses both ends of the window.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the offending end when it does not parse.
    pub fn bounds(&self) -> Result<(NaiveDateTime, NaiveDateTime), ConfigError> {
        let parse = |field: &str, value: &str| {
            NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| ConfigError {
                field: format!("window.{field}"),
                message: format!("\"{value}\" is not YYYYMMDDHHMM: {e}"),
            })
        };
        Ok((parse("start", &self.start)?, parse("end", &self.end)?))
    }

    /// Longest shared leading substring of `start` and `end`.
    ///
    /// Used as the record prefix filter so the reader skips lines that
    /// cannot fall inside the window.
    pub fn prefix(&self) -> String {
        self.start
            .chars()
            .zip(self.end.chars())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a)
            .collect()
    }
}

/// Station file locations and layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// 10-minute solar radiation export.
    pub solar_path: PathBuf,
    /// 10-minute wind export.
    pub wind_path: PathBuf,
    /// Zero-based column of the irradiance value.
    pub solar_column: usize,
    /// Zero-based column of the wind speed value.
    pub wind_column: usize,
    /// Field delimiter.
    pub delimiter: char,
    /// Station sentinel for "not measured".
    pub missing_value: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            solar_path: PathBuf::from("data/produkt_zehn_min_sd.txt"),
            wind_path: PathBuf::from("data/produkt_zehn_min_ff.txt"),
            solar_column: 4,
            wind_column: 3,
            delimiter: ';',
            missing_value: -999.0,
        }
    }
}

/// Solar panel constants for the linear irradiance model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarConfig {
    /// Effective panel area multiplier.
    pub panel_area_factor: f64,
    /// Converts one raw interval reading into a rate.
    pub interval_scale: f64,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            panel_area_factor: 10.0,
            // J/cm² per 10 minutes -> W/m²
            interval_scale: 100.0 / 6.0,
        }
    }
}

/// Wind turbine constants for the cubic power law.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindConfig {
    /// Rotor radius (m).
    pub rotor_radius_m: f64,
    /// Air density (kg/m³).
    pub air_density: f64,
    /// Power coefficient (0.0–1.0).
    pub power_coefficient: f64,
    /// Speed below which output is zero (m/s).
    pub cut_in_speed: f64,
    /// Nameplate capacity (W).
    pub rated_capacity_w: f64,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            rotor_radius_m: 1.5,
            air_density: 1.225,
            power_coefficient: 0.4,
            cut_in_speed: 3.0,
            rated_capacity_w: 3000.0,
        }
    }
}

/// Weights for the mixed supply blend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MixedConfig {
    /// Solar weight in (0.0, 1.0].
    pub solar_weight: f64,
    /// Wind weight in (0.0, 1.0].
    pub wind_weight: f64,
    /// Extra factor applied to mixed values at publish time.
    pub publish_factor: f64,
}

impl Default for MixedConfig {
    fn default() -> Self {
        Self {
            solar_weight: 0.6,
            wind_weight: 0.6,
            publish_factor: 1.0,
        }
    }
}

/// Series preparation options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Raw 10-minute samples averaged into one replay step.
    pub window_size: usize,
    /// Decimal places kept on generated and published values.
    pub rounding_precision: u32,
    /// Lower bound of the random loss fraction.
    pub loss_factor_min: f64,
    /// Upper bound of the random loss fraction.
    pub loss_factor_max: f64,
    /// Forecast horizons in replay steps. The first one is published as `forecast`.
    pub horizons: Vec<usize>,
    /// Seed for loss factors.
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 1,
            rounding_precision: 1,
            loss_factor_min: 0.0,
            loss_factor_max: 0.0,
            horizons: vec![6, 36, 144],
            seed: 42,
        }
    }
}

/// Replay loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    /// Tick length; ticks land on multiples of this in wall-clock time.
    pub interval_secs: u64,
    /// `finite` replays the window once, `live` cycles until stopped.
    pub feed: FeedMode,
    /// Positional rule used to assign equipment.
    pub equipment: AssignmentRule,
    /// Power drawn by a fully loaded resource (W).
    pub nominal_power_w: f64,
    /// Whether to query the consumption source each tick.
    pub consumption: bool,
    /// Explicit resource ids. Empty means list them from the cluster.
    pub resources: Vec<String>,
    /// Optional `key=value` label selector for cluster listing.
    pub resource_filter: Option<String>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            feed: FeedMode::Finite,
            equipment: AssignmentRule::SentinelFirst,
            nominal_power_w: 10_000.0,
            consumption: true,
            resources: Vec::new(),
            resource_filter: None,
        }
    }
}

/// Score normalization settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Upper bound of the rank score.
    pub max_score: u32,
    /// Scoring cycle length.
    pub interval_secs: u64,
    /// Write the score back as a `score` annotation.
    pub publish: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_score: 10,
            interval_secs: 60,
            publish: false,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"replay.interval_secs"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl AnnotatorConfig {
    /// Returns the baseline configuration.
    pub fn baseline() -> Self {
        Self {
            window: WindowConfig::default(),
            data: DataConfig::default(),
            solar: SolarConfig::default(),
            wind: WindConfig::default(),
            mixed: MixedConfig::default(),
            pipeline: PipelineConfig::default(),
            replay: ReplayConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }

    /// Returns the hourly preset: hour-long steps, every-third equipment,
    /// 5–15% conversion loss.
    pub fn hourly() -> Self {
        Self {
            pipeline: PipelineConfig {
                window_size: 6,
                rounding_precision: 2,
                loss_factor_min: 0.05,
                loss_factor_max: 0.15,
                horizons: vec![1, 6, 24],
                ..PipelineConfig::default()
            },
            replay: ReplayConfig {
                equipment: AssignmentRule::EveryThird,
                ..ReplayConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the live preset: baseline data cycled until stopped.
    pub fn live() -> Self {
        Self {
            replay: ReplayConfig {
                feed: FeedMode::Live,
                ..ReplayConfig::default()
            },
            scoring: ScoringConfig {
                publish: true,
                ..ScoringConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "hourly", "live"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "hourly" => Ok(Self::hourly()),
            "live" => Ok(Self::live()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(ConfigError {
                field: field.into(),
                message: message.into(),
            });
        };

        match self.window.bounds() {
            Ok((start, end)) if start > end => push("window.start", "must be <= window.end"),
            Ok(_) => {}
            Err(e) => push(&e.field, &e.message),
        }

        let d = &self.data;
        if d.solar_column < 2 {
            push("data.solar_column", "must be >= 2 (station and timestamp come first)");
        }
        if d.wind_column < 2 {
            push("data.wind_column", "must be >= 2 (station and timestamp come first)");
        }
        if !d.delimiter.is_ascii() || d.delimiter.is_ascii_alphanumeric() {
            push("data.delimiter", "must be a single non-alphanumeric ASCII character");
        }
        if !d.missing_value.is_finite() {
            push("data.missing_value", "must be a finite number");
        }

        let sol = &self.solar;
        if !sol.panel_area_factor.is_finite() || sol.panel_area_factor < 0.0 {
            push("solar.panel_area_factor", "must be >= 0");
        }
        if !sol.interval_scale.is_finite() || sol.interval_scale < 0.0 {
            push("solar.interval_scale", "must be >= 0");
        }

        let w = &self.wind;
        if !w.rotor_radius_m.is_finite() || w.rotor_radius_m <= 0.0 {
            push("wind.rotor_radius_m", "must be > 0");
        }
        if !w.air_density.is_finite() || w.air_density <= 0.0 {
            push("wind.air_density", "must be > 0");
        }
        if !(w.power_coefficient > 0.0 && w.power_coefficient <= 1.0) {
            push("wind.power_coefficient", "must be in (0.0, 1.0]");
        }
        if !w.cut_in_speed.is_finite() || w.cut_in_speed < 0.0 {
            push("wind.cut_in_speed", "must be >= 0");
        }
        if !w.rated_capacity_w.is_finite() || w.rated_capacity_w <= 0.0 {
            push("wind.rated_capacity_w", "must be > 0");
        }

        let m = &self.mixed;
        if !(m.solar_weight > 0.0 && m.solar_weight <= 1.0) {
            push("mixed.solar_weight", "must be in (0.0, 1.0]");
        }
        if !(m.wind_weight > 0.0 && m.wind_weight <= 1.0) {
            push("mixed.wind_weight", "must be in (0.0, 1.0]");
        }
        if !m.publish_factor.is_finite() || m.publish_factor < 0.0 {
            push("mixed.publish_factor", "must be >= 0");
        }

        let p = &self.pipeline;
        if p.window_size == 0 {
            push("pipeline.window_size", "must be > 0");
        }
        if p.rounding_precision > 6 {
            push("pipeline.rounding_precision", "must be <= 6");
        }
        if !(0.0..1.0).contains(&p.loss_factor_min) {
            push("pipeline.loss_factor_min", "must be in [0.0, 1.0)");
        }
        if !(0.0..1.0).contains(&p.loss_factor_max) {
            push("pipeline.loss_factor_max", "must be in [0.0, 1.0)");
        }
        if p.loss_factor_min > p.loss_factor_max {
            push("pipeline.loss_factor_min", "must be <= pipeline.loss_factor_max");
        }
        if p.horizons.is_empty() {
            push("pipeline.horizons", "must name at least one horizon");
        }
        if p.horizons.contains(&0) {
            push("pipeline.horizons", "horizons must be > 0");
        }

        let r = &self.replay;
        if r.interval_secs == 0 {
            push("replay.interval_secs", "must be > 0");
        }
        if !r.nominal_power_w.is_finite() || r.nominal_power_w < 0.0 {
            push("replay.nominal_power_w", "must be >= 0");
        }
        if r.resource_filter.as_deref().is_some_and(|f| !f.contains('=')) {
            push("replay.resource_filter", "must be a key=value selector");
        }

        let s = &self.scoring;
        if s.max_score == 0 {
            push("scoring.max_score", "must be > 0");
        }
        if s.interval_secs == 0 {
            push("scoring.interval_secs", "must be > 0");
        }

        errors
    }
}
