//! Common types and traits for generation models.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Deserialize;

/// Generation-source category a resource can be equipped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Solar,
    Wind,
    Mixed,
}

impl SourceKind {
    /// All kinds, in the column order used by composite rows.
    pub const ALL: [SourceKind; 3] = [SourceKind::Solar, SourceKind::Wind, SourceKind::Mixed];

    /// Lowercase label used in annotations and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Solar => "solar",
            SourceKind::Wind => "wind",
            SourceKind::Mixed => "mixed",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solar" => Ok(SourceKind::Solar),
            "wind" => Ok(SourceKind::Wind),
            "mixed" => Ok(SourceKind::Mixed),
            other => Err(format!("unknown source kind \"{other}\"")),
        }
    }
}

/// One generated power value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSample {
    pub timestamp: NaiveDateTime,
    /// Output in watts, never negative.
    pub watts: f64,
    pub kind: SourceKind,
}

/// A device that converts one raw physical measurement into power output.
///
/// Implementations are pure: the same measurement always yields the same
/// watts, so a whole series can be mapped without carrying state.
pub trait Generator {
    /// Returns instantaneous output in watts for a raw measurement.
    ///
    /// # Arguments
    ///
    /// * `measurement` - Raw station value (irradiance or wind speed)
    ///
    /// # Returns
    ///
    /// Power in watts, clamped to the device's floor and ceiling.
    fn power_w(&self, measurement: f64) -> f64;

    /// Returns the source category this device produces.
    fn kind(&self) -> SourceKind;

    /// Maps an observation into a [`PowerSample`].
    fn sample(&self, timestamp: NaiveDateTime, measurement: f64) -> PowerSample {
        PowerSample {
            timestamp,
            watts: self.power_w(measurement),
            kind: self.kind(),
        }
    }
}

/// Rounds `value` to `precision` decimal places.
///
/// Anything that rounds to zero comes back as `0.0`, never `-0.0`.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10_f64.powi(precision as i32);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_keeps_requested_places() {
        assert_eq!(round_to(9.000000000000002, 1), 9.0);
        assert_eq!(round_to(1.2345, 2), 1.23);
        assert_eq!(round_to(1.5, 0), 2.0);
    }

    #[test]
    fn round_to_never_yields_negative_zero() {
        for value in [-1.7e-13, -0.04, -0.0] {
            let r = round_to(value, 1);
            assert_eq!(r, 0.0);
            assert!(r.is_sign_positive(), "{value} rounded to {r}");
        }
    }

    #[test]
    fn source_kind_labels_round_trip() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.as_str().parse::<SourceKind>(), Ok(kind));
        }
        assert!("hydro".parse::<SourceKind>().is_err());
    }
}
