/// Coordinate conversion between spectrum axes
///
/// Every conversion goes through fraction space: 0 is the left edge of the
/// displayed spectrum (`plot_end`), 1 the right edge (`plot_begin`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::spectrum::SpectrumInfo;
use crate::error::{NmrError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Ppm,
    Fraction,
    Hz,
    /// Index into the spectrum array; output only
    DataPoint,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Ppm => write!(f, "ppm"),
            Unit::Fraction => write!(f, "fraction"),
            Unit::Hz => write!(f, "Hz"),
            Unit::DataPoint => write!(f, "data_point"),
        }
    }
}

impl FromStr for Unit {
    type Err = NmrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ppm" => Ok(Unit::Ppm),
            "fraction" | "frac" => Ok(Unit::Fraction),
            "hz" => Ok(Unit::Hz),
            "data_point" | "point" | "pt" => Ok(Unit::DataPoint),
            other => Err(NmrError::InvalidConversion(format!("unknown unit {:?}", other))),
        }
    }
}

/// Maps coordinates for one spectrum (metadata plus array length)
#[derive(Debug, Clone, Copy)]
pub struct Axis<'a> {
    info: &'a SpectrumInfo,
    len: usize,
}

impl<'a> Axis<'a> {
    pub fn new(info: &'a SpectrumInfo, len: usize) -> Self {
        Self { info, len }
    }

    pub fn to_fraction(&self, x: f64, unit: Unit) -> Result<f64> {
        match unit {
            Unit::Fraction => Ok(x),
            Unit::Ppm => {
                let (left, right) = self.info.ppm_bounds();
                from_reversed(x, left, right)
            }
            Unit::Hz => {
                let (left, right) = self.info.hz_bounds();
                from_reversed(x, left, right)
            }
            Unit::DataPoint => Err(NmrError::InvalidConversion(
                "data_point is only valid as an output unit".into(),
            )),
        }
    }

    pub fn fraction_to(&self, f: f64, unit: Unit) -> f64 {
        match unit {
            Unit::Fraction => f,
            Unit::Ppm => {
                let (left, right) = self.info.ppm_bounds();
                left - f * (left - right)
            }
            Unit::Hz => {
                let (left, right) = self.info.hz_bounds();
                left - f * (left - right)
            }
            Unit::DataPoint => {
                let last = self.len.saturating_sub(1) as f64;
                (f * last).round()
            }
        }
    }

    pub fn convert(&self, x: f64, from: Unit, to: Unit) -> Result<f64> {
        let f = self.to_fraction(x, from)?;
        Ok(self.fraction_to(f, to))
    }
}

fn from_reversed(x: f64, left: f64, right: f64) -> Result<f64> {
    let span = left - right;
    if span == 0.0 || !span.is_finite() {
        return Err(NmrError::InvalidConversion(format!(
            "degenerate axis bounds {} .. {}",
            left, right
        )));
    }
    Ok((left - x) / span)
}

/// Convert `x` between units for a spectrum of `len` points.
pub fn convert(x: f64, from: Unit, to: Unit, info: &SpectrumInfo, len: usize) -> Result<f64> {
    Axis::new(info, len).convert(x, from, to)
}
