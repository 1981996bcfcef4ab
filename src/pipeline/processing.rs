/// Spectral transform engine and FID editing
///
/// Turns a complex FID into the absorption-mode spectrum, searches the
/// zero-order phase that maximizes the spectrum score, and provides the
/// length and window edits applied to the FID before the transform.
/// Phase angles are expressed in units of π radians throughout.

use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::data::spectrum::Vendor;

pub const DEFAULT_FIRST_STEP: f64 = 1.0;
pub const DEFAULT_PRECISION: f64 = 0.0001;

/// Guard against a pathological score surface; real searches need < 100 steps.
const MAX_SEARCH_STEPS: usize = 10_000;

/// Processing operation descriptor, recorded in the processing history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessingOp {
    Load { vendor: Vendor, points: usize },
    Apodization { lb_hz: f64 },
    ZeroFill { from: usize, to: usize },
    Truncate { from: usize, to: usize },
    RestoreFid,
    AutoPhase { ph0: f64 },
    ManualPhase(Phase),
    ResetPhase,
    Integration { begin: f64, end: f64, value: f64 },
    RemoveIntegrals { begin: f64, end: f64, removed: usize },
}

impl std::fmt::Display for ProcessingOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingOp::Load { vendor, points } => write!(f, "Load {} FID ({} points)", vendor, points),
            ProcessingOp::Apodization { lb_hz } => write!(f, "Apodization: EM (LB={:.2} Hz)", lb_hz),
            ProcessingOp::ZeroFill { from, to } => write!(f, "Zero Fill {} → {} points", from, to),
            ProcessingOp::Truncate { from, to } => write!(f, "Truncate {} → {} points", from, to),
            ProcessingOp::RestoreFid => write!(f, "Restore FID"),
            ProcessingOp::AutoPhase { ph0 } => write!(f, "Automatic Phase Correction (PH0={:.4}π)", ph0),
            ProcessingOp::ManualPhase(p) => write!(f, "Phase Correction ({})", p),
            ProcessingOp::ResetPhase => write!(f, "Reset Phase"),
            ProcessingOp::Integration { begin, end, value } => {
                write!(f, "Integration [{:.4}, {:.4}] = {:.6e}", begin, end, value)
            }
            ProcessingOp::RemoveIntegrals { begin, end, removed } => {
                write!(f, "Remove {} integrals in [{:.4}, {:.4}]", removed, begin, end)
            }
        }
    }
}

/// Zero- and first-order phase, angles in units of π rad.
///
/// The first-order term is zero at `pivot`, a fraction of the displayed
/// spectrum (0 = left edge).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub ph0: f64,
    pub ph1: f64,
    pub pivot: f64,
}

impl Default for Phase {
    fn default() -> Self {
        Self {
            ph0: 0.0,
            ph1: 0.0,
            pivot: 0.5,
        }
    }
}

impl Phase {
    pub fn zero_order(ph0: f64) -> Self {
        Self {
            ph0,
            ..Self::default()
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PH0={:.4}π, PH1={:.4}π, pivot={:.3}",
            self.ph0, self.ph1, self.pivot
        )
    }
}

// =========================================================================
//  Fourier Transform / absorption assembly
// =========================================================================

/// Pre-planned forward transform for FIDs of one length
pub struct SpectralTransform {
    len: usize,
    fft: Arc<dyn Fft<f64>>,
}

impl SpectralTransform {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        Self { len, fft }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Complex spectrum in display order, highest frequency first.
    ///
    /// With Z the transform of the FID and h = n/2, bin i of the left half
    /// is Z[h-1-i] and bin k of the right half is Z[(n-k) mod n]. Their real
    /// parts are re(FFT(re)) ∓ im(FFT(im)) of the two-transform formulation.
    pub fn assemble(&self, fid: &[Complex64]) -> Vec<Complex64> {
        let n = self.len;
        if n == 0 || fid.len() != n {
            log::warn!(
                "FID of {} points given to a {}-point transform",
                fid.len(),
                n
            );
            return Vec::new();
        }

        let mut buffer = fid.to_vec();
        self.fft.process(&mut buffer);

        let half = n / 2;
        let mut out = Vec::with_capacity(2 * half);
        out.extend((0..half).map(|i| buffer[half - 1 - i]));
        out.extend((0..half).map(|k| buffer[(n - k) % n]));
        out
    }

    /// Absorption-mode (real) spectrum of the FID.
    pub fn absorption(&self, fid: &[Complex64]) -> Vec<f64> {
        self.assemble(fid).iter().map(|c| c.re).collect()
    }
}

/// Absorption spectrum in display orientation for the given vendor.
pub fn absorption_spectrum(fid: &[Complex64], vendor: Vendor) -> Vec<f64> {
    let mut spectrum = SpectralTransform::new(fid.len()).absorption(fid);
    if vendor.reverses_spectrum() {
        spectrum.reverse();
    }
    spectrum
}

/// Phased absorption spectrum: zero order on the FID, first order per bin.
pub fn phased_spectrum(fid: &[Complex64], vendor: Vendor, phase: &Phase) -> Vec<f64> {
    let mut rotated = fid.to_vec();
    rotate_phase(&mut rotated, phase.ph0);

    let mut spectrum = SpectralTransform::new(rotated.len()).assemble(&rotated);
    if vendor.reverses_spectrum() {
        spectrum.reverse();
    }
    apply_first_order(&mut spectrum, phase.ph1, phase.pivot);
    spectrum.iter().map(|c| c.re).collect()
}

// =========================================================================
//  Phase Correction
// =========================================================================

/// Multiply every sample by exp(iπ·angle).
pub fn rotate_phase(fid: &mut [Complex64], angle: f64) {
    if angle == 0.0 {
        return;
    }
    let factor = Complex64::from_polar(1.0, PI * angle);
    for v in fid.iter_mut() {
        *v *= factor;
    }
}

/// First-order correction on a display-ordered complex spectrum.
pub fn apply_first_order(spectrum: &mut [Complex64], ph1: f64, pivot: f64) {
    let n = spectrum.len();
    if n == 0 || ph1 == 0.0 {
        return;
    }
    for (j, v) in spectrum.iter_mut().enumerate() {
        let frac = j as f64 / n as f64;
        *v *= Complex64::from_polar(1.0, PI * ph1 * (frac - pivot));
    }
}

/// Phase score: positive bins add their value, negative bins subtract
/// their square.
pub fn phase_score(spectrum: &[f64]) -> f64 {
    spectrum
        .iter()
        .map(|&v| if v > 0.0 { v } else { -v * v })
        .sum()
}

/// Wrap an angle into (-1, 1].
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0);
    if wrapped > 1.0 {
        wrapped - 2.0
    } else {
        wrapped
    }
}

/// Line search for the zero-order phase angle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseSearch {
    /// Initial step, π rad
    pub first_step: f64,
    /// Search stops once the step falls below this, π rad
    pub precision: f64,
}

impl Default for PhaseSearch {
    fn default() -> Self {
        Self {
            first_step: DEFAULT_FIRST_STEP,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl PhaseSearch {
    /// Score of the FID rotated by `angle`
    fn score_at(&self, transform: &SpectralTransform, fid: &[Complex64], angle: f64) -> f64 {
        let mut trial = fid.to_vec();
        rotate_phase(&mut trial, angle);
        phase_score(&transform.absorption(&trial))
    }

    /// Find the angle (π rad, wrapped into (-1, 1]) maximizing the score.
    ///
    /// Starting at 0, a step is kept while it improves the score. When it
    /// does not, the opposite direction is tried with the same step and
    /// adopted if it improves; otherwise the step is divided by 10. The
    /// search ends when the step drops below `precision`.
    pub fn run(&self, fid: &[Complex64]) -> f64 {
        if fid.len() < 2 || !(self.precision > 0.0) || self.first_step == 0.0 {
            return 0.0;
        }
        let transform = SpectralTransform::new(fid.len());

        let mut angle = 0.0;
        let mut best = self.score_at(&transform, fid, angle);
        let mut step = self.first_step;
        let mut steps = 0;

        while step.abs() >= self.precision && steps < MAX_SEARCH_STEPS {
            steps += 1;
            let forward = self.score_at(&transform, fid, angle + step);
            if forward > best {
                angle += step;
                best = forward;
                continue;
            }
            let backward = self.score_at(&transform, fid, angle - step);
            if backward > best {
                angle -= step;
                best = backward;
                step = -step;
                continue;
            }
            step /= 10.0;
        }

        if steps == MAX_SEARCH_STEPS {
            log::warn!("Phase search stopped after {} steps", steps);
        }
        log::debug!("Phase search: angle={:.5}π score={:.6e} ({} steps)", angle, best, steps);
        wrap_angle(angle)
    }
}

// =========================================================================
//  Zero Filling / Truncation
// =========================================================================

/// Next power of two >= n
pub fn next_power_of_two(n: usize) -> usize {
    let mut p = 1;
    while p < n {
        p <<= 1;
    }
    p
}

/// Append zeros up to `target` points. Returns false if nothing changed.
pub fn zero_fill(fid: &mut Vec<Complex64>, target: usize) -> bool {
    if target <= fid.len() {
        return false;
    }
    fid.resize(target, Complex64::new(0.0, 0.0));
    true
}

/// Keep the first `target` points. Returns false if nothing changed.
pub fn truncate(fid: &mut Vec<Complex64>, target: usize) -> bool {
    if target >= fid.len() || target == 0 {
        return false;
    }
    fid.truncate(target);
    true
}

// =========================================================================
//  Apodization
// =========================================================================

/// Exponential multiplication: point i is scaled by exp(-π·lb·i·dwell).
pub fn exponential_window(fid: &mut [Complex64], dwell_time: f64, lb_hz: f64) {
    for (i, v) in fid.iter_mut().enumerate() {
        let t = i as f64 * dwell_time;
        *v *= (-PI * lb_hz * t).exp();
    }
}
