use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Decoded time-domain signal, one complex sample per point
pub type ComplexFid = Vec<Complex64>;

/// Spectrometer vendors with a native reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    Agilent,
    Bruker,
    Jeol,
}

impl Vendor {
    /// Bruker spectra come out of the transform mirrored and are reversed
    /// once more after absorption assembly.
    pub fn reverses_spectrum(self) -> bool {
        self == Vendor::Bruker
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vendor::Agilent => write!(f, "agilent"),
            Vendor::Bruker => write!(f, "bruker"),
            Vendor::Jeol => write!(f, "jeol"),
        }
    }
}

/// Vendor-independent acquisition metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumInfo {
    /// [Hz] beginning of plot
    pub plot_begin: f64,
    /// [Hz] end of plot
    pub plot_end: f64,
    /// [ppm] beginning of plot
    pub plot_begin_ppm: f64,
    /// [ppm] end of plot
    pub plot_end_ppm: f64,
    /// [Hz] width of spectrum
    pub spectral_width: f64,
    /// [s] acquisition time of a single scan
    pub acquisition_time: f64,
    /// [MHz] Larmor frequency of observed nucleus
    pub obs_nucl_freq: f64,
    /// [s] time between FID points
    pub dwell_time: f64,
    /// [Hz] distance between spectrum points
    pub frequency_increment: f64,
    /// [points] digital filter delay
    pub group_delay: f64,
    /// Complex points in the FID
    pub number_of_data_points: usize,
    pub vendor: Vendor,
    pub solvent: String,
    pub samplename: String,
    /// Observed nucleus, e.g. "H1", "13C"
    pub nucleus: String,
}

impl SpectrumInfo {
    /// Plot bounds as `(left, right)` in Hz: fraction 0 maps to `plot_end`.
    ///
    /// For Agilent and Bruker the left edge is the highest frequency. JEOL
    /// stores `plot_begin > plot_end`, so there left is the lowest.
    pub fn hz_bounds(&self) -> (f64, f64) {
        (self.plot_end, self.plot_begin)
    }

    /// Same orientation as [`SpectrumInfo::hz_bounds`], in ppm
    pub fn ppm_bounds(&self) -> (f64, f64) {
        (self.plot_end_ppm, self.plot_begin_ppm)
    }

    pub fn with_samplename(&self, samplename: &str) -> Self {
        Self {
            samplename: samplename.to_string(),
            ..self.clone()
        }
    }

    pub fn with_solvent(&self, solvent: &str) -> Self {
        Self {
            solvent: solvent.to_string(),
            ..self.clone()
        }
    }

    /// Short one-line description for logs and CLI output
    pub fn summary(&self) -> String {
        format!(
            "{} {} in {} | {} pts | SW={:.1} Hz | obs={:.4} MHz | {:.3}..{:.3} ppm",
            self.vendor,
            self.nucleus,
            if self.solvent.is_empty() { "?" } else { &self.solvent },
            self.number_of_data_points,
            self.spectral_width,
            self.obs_nucl_freq,
            self.plot_end_ppm,
            self.plot_begin_ppm,
        )
    }
}
