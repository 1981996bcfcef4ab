/// Peak integration with anchor normalization
///
/// Bins below half the mean amplitude are zeroed before trapezoidal
/// integration. The first integral of a session is the anchor; every
/// relative value is expressed against it.

use serde::{Deserialize, Serialize};

use crate::error::{NmrError, Result};
use crate::measure::units::{Axis, Unit};

/// One integrated region, bounds in fraction space (begin <= end)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegralRecord {
    pub begin: f64,
    pub end: f64,
    pub value: f64,
    pub relative_value: f64,
}

/// Half the mean amplitude of the spectrum
pub fn signal_threshold(spectrum: &[f64]) -> f64 {
    if spectrum.is_empty() {
        return 0.0;
    }
    spectrum.iter().sum::<f64>() / spectrum.len() as f64 / 2.0
}

/// Ascending, clamped fraction bounds for a region given in any input unit.
pub fn fraction_bounds(axis: &Axis<'_>, begin: f64, end: f64, unit: Unit) -> Result<(f64, f64)> {
    let a = axis.to_fraction(begin, unit)?;
    let b = axis.to_fraction(end, unit)?;
    Ok((a.min(b).clamp(0.0, 1.0), a.max(b).clamp(0.0, 1.0)))
}

/// Trapezoidal area of the thresholded spectrum between two fractions.
pub fn integrate_region(spectrum: &[f64], threshold: f64, dx: f64, begin: f64, end: f64) -> f64 {
    let len = spectrum.len();
    let start = ((begin * len as f64).floor() as usize).min(len);
    let stop = ((end * len as f64).ceil() as usize).min(len);
    if stop <= start + 1 {
        return 0.0;
    }

    let gate = |v: f64| if v < threshold { 0.0 } else { v };
    spectrum[start..stop]
        .windows(2)
        .map(|w| (gate(w[0]) + gate(w[1])) * 0.5 * dx)
        .sum()
}

/// Ordered integral set of one spectrum
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Integrator {
    records: Vec<IntegralRecord>,
    anchor: Option<f64>,
    threshold: f64,
}

impl Integrator {
    pub fn new(spectrum: &[f64]) -> Self {
        Self {
            records: Vec::new(),
            anchor: None,
            threshold: signal_threshold(spectrum),
        }
    }

    pub fn records(&self) -> &[IntegralRecord] {
        &self.records
    }

    pub fn anchor(&self) -> Option<f64> {
        self.anchor
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Value relative to the anchor integral
    pub fn relative(&self, value: f64) -> Result<f64> {
        let anchor = self.anchor.ok_or(NmrError::MissingAnchor)?;
        Ok(value / anchor)
    }

    /// Integrate `[begin, end]` (fractions) and append the record. The first
    /// integral becomes the anchor.
    pub fn integrate(&mut self, spectrum: &[f64], dx: f64, begin: f64, end: f64) -> Result<IntegralRecord> {
        let (begin, end) = (begin.min(end), begin.max(end));
        let value = integrate_region(spectrum, self.threshold, dx, begin, end);

        let relative_value = match self.anchor {
            None => {
                warn_if_empty_anchor(value, begin, end);
                self.anchor = Some(value);
                1.0
            }
            Some(_) => self.relative(value)?,
        };

        let record = IntegralRecord {
            begin,
            end,
            value,
            relative_value,
        };
        log::info!(
            "Integral [{:.4}, {:.4}] = {:.6e} (relative {:.4})",
            begin,
            end,
            value,
            relative_value
        );
        self.records.push(record.clone());
        Ok(record)
    }

    /// Drop every integral overlapping `[begin, end]`. Returns how many went.
    ///
    /// When the anchor itself is removed, the next remaining integral takes
    /// its place.
    pub fn remove(&mut self, begin: f64, end: f64) -> usize {
        let (begin, end) = (begin.min(end), begin.max(end));
        let before = self.records.len();
        self.records.retain(|rec| rec.begin > end || rec.end < begin);
        let removed = before - self.records.len();
        if removed > 0 {
            self.rebase();
        }
        removed
    }

    /// Re-evaluate all integrals against a regenerated spectrum.
    pub fn refresh(&mut self, spectrum: &[f64], dx: f64) {
        self.threshold = signal_threshold(spectrum);
        for rec in self.records.iter_mut() {
            rec.value = integrate_region(spectrum, self.threshold, dx, rec.begin, rec.end);
        }
        self.rebase();
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.anchor = None;
    }

    fn rebase(&mut self) {
        self.anchor = self.records.first().map(|rec| rec.value);
        if let Some(first) = self.records.first() {
            warn_if_empty_anchor(first.value, first.begin, first.end);
        }
        if let Some(anchor) = self.anchor {
            for (i, rec) in self.records.iter_mut().enumerate() {
                rec.relative_value = if i == 0 { 1.0 } else { rec.value / anchor };
            }
        }
    }
}

fn warn_if_empty_anchor(value: f64, begin: f64, end: f64) {
    if value == 0.0 {
        log::warn!(
            "Anchor integral [{:.4}, {:.4}] is zero (no signal above threshold); relative values will not be finite",
            begin,
            end
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::tests::proton_info;
    use proptest::prelude::*;

    fn two_peaks() -> Vec<f64> {
        let mut s = vec![0.0; 100];
        for v in &mut s[10..20] {
            *v = 10.0;
        }
        for v in &mut s[60..80] {
            *v = 10.0;
        }
        s
    }

    #[test]
    fn test_threshold() {
        assert_eq!(signal_threshold(&[]), 0.0);
        assert_eq!(signal_threshold(&[1.0, 3.0]), 1.0);
        assert_eq!(signal_threshold(&two_peaks()), 1.5);
    }

    #[test]
    fn test_thresholded_trapezoid() {
        let mut s = vec![1.0; 10];
        s[5] = 20.0;
        // threshold = (9 + 20) / 10 / 2 = 1.45, so the ones vanish
        let area = integrate_region(&s, signal_threshold(&s), 1.0, 0.0, 1.0);
        assert!((area - 20.0).abs() < 1e-12);
        assert_eq!(integrate_region(&s, 0.0, 1.0, 0.5, 0.5), 0.0);
    }

    #[test]
    fn test_anchor_and_relative() {
        let s = two_peaks();
        let mut integrals = Integrator::new(&s);
        assert!(matches!(integrals.relative(1.0), Err(NmrError::MissingAnchor)));

        let first = integrals.integrate(&s, 1.0, 0.05, 0.25).unwrap();
        assert_eq!(first.relative_value, 1.0);
        let second = integrals.integrate(&s, 1.0, 0.85, 0.55).unwrap();
        assert_eq!(second.begin, 0.55);
        assert!((second.relative_value - second.value / first.value).abs() < 1e-12);
        assert!(second.relative_value > 1.5);
    }

    #[test]
    fn test_zero_anchor_on_baseline() {
        let s = two_peaks();
        let mut integrals = Integrator::new(&s);
        // nothing in 0.3..0.5 clears the threshold
        let empty = integrals.integrate(&s, 1.0, 0.3, 0.5).unwrap();
        assert_eq!(empty.value, 0.0);
        assert_eq!(empty.relative_value, 1.0);
        assert_eq!(integrals.anchor(), Some(0.0));

        let peak = integrals.integrate(&s, 1.0, 0.55, 0.85).unwrap();
        assert!(peak.relative_value.is_infinite());
        assert!(integrals.integrate(&s, 1.0, 0.3, 0.4).unwrap().relative_value.is_nan());

        // dropping the empty anchor hands over to the peak
        assert_eq!(integrals.remove(0.25, 0.5), 2);
        assert_eq!(integrals.anchor(), Some(peak.value));
        assert_eq!(integrals.records()[0].relative_value, 1.0);
    }

    #[test]
    fn test_remove_overlapping() {
        let s = two_peaks();
        let mut integrals = Integrator::new(&s);
        integrals.integrate(&s, 1.0, 0.05, 0.25).unwrap();
        integrals.integrate(&s, 1.0, 0.55, 0.85).unwrap();
        integrals.integrate(&s, 1.0, 0.30, 0.40).unwrap();

        assert_eq!(integrals.remove(0.9, 0.95), 0);
        assert_eq!(integrals.remove(0.2, 0.35), 2);
        assert_eq!(integrals.records().len(), 1);
        // the survivor becomes the anchor
        assert_eq!(integrals.records()[0].relative_value, 1.0);
        assert_eq!(integrals.anchor(), Some(integrals.records()[0].value));

        assert_eq!(integrals.remove(0.0, 1.0), 1);
        assert_eq!(integrals.anchor(), None);
    }

    #[test]
    fn test_refresh_rescales() {
        let s = two_peaks();
        let mut integrals = Integrator::new(&s);
        integrals.integrate(&s, 1.0, 0.05, 0.25).unwrap();
        integrals.integrate(&s, 1.0, 0.55, 0.85).unwrap();
        let ratio = integrals.records()[1].relative_value;

        let doubled: Vec<f64> = s.iter().map(|v| v * 2.0).collect();
        integrals.refresh(&doubled, 1.0);
        assert_eq!(integrals.threshold(), 3.0);
        assert!((integrals.records()[1].relative_value - ratio).abs() < 1e-12);
        assert_eq!(integrals.anchor(), Some(integrals.records()[0].value));
        assert!((integrals.records()[0].value - 200.0).abs() < 1e-12);
    }

    #[test]
    fn test_fraction_bounds_from_ppm() {
        let info = proton_info();
        let axis = Axis::new(&info, 1024);
        let (a, b) = fraction_bounds(&axis, 2.0, 6.0, Unit::Ppm).unwrap();
        assert!(a < b);
        let (c, d) = fraction_bounds(&axis, 6.0, 2.0, Unit::Ppm).unwrap();
        assert_eq!((a, b), (c, d));
        let (lo, hi) = fraction_bounds(&axis, -0.5, 2.0, Unit::Fraction).unwrap();
        assert_eq!((lo, hi), (0.0, 1.0));
    }

    proptest! {
        #[test]
        fn prop_anchor_law(
            regions in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0), 1..10),
        ) {
            let s = two_peaks();
            let mut integrals = Integrator::new(&s);
            // anchor on a region that holds signal
            let anchor = integrals.integrate(&s, 1.0, 0.05, 0.25).unwrap();
            prop_assert_eq!(anchor.relative_value, 1.0);
            for (a, b) in regions {
                let rec = integrals.integrate(&s, 1.0, a, b).unwrap();
                prop_assert!((rec.relative_value - rec.value / anchor.value).abs() < 1e-12);
            }
        }
    }
}
