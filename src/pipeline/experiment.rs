/// Experiment session
///
/// Holds one decoded 1D acquisition together with its processed spectrum
/// and integrals. The decoded FID is never modified: every edit produces
/// the spectrum again from it, so phase angles are absolute rather than
/// cumulative.

use crate::config::ProcessingConfig;
use crate::data::spectrum::{ComplexFid, SpectrumInfo};
use crate::error::Result;
use crate::history::ProcessingLog;
use crate::measure::integration::{fraction_bounds, IntegralRecord, Integrator};
use crate::measure::units::{Axis, Unit};
use crate::pipeline::processing::{
    self, exponential_window, next_power_of_two, phased_spectrum, rotate_phase, Phase,
    PhaseSearch, ProcessingOp,
};

#[derive(Debug)]
pub struct Experiment {
    info: SpectrumInfo,
    /// As decoded, group delay already removed
    original_fid: ComplexFid,
    /// After length edits and apodization, before phasing
    working_fid: ComplexFid,
    /// Working FID with the zero-order phase applied
    fid: ComplexFid,
    phase: Phase,
    spectrum: Vec<f64>,
    integrals: Integrator,
    search: PhaseSearch,
    history: ProcessingLog,
}

impl Experiment {
    pub fn new(fid: ComplexFid, info: SpectrumInfo, config: &ProcessingConfig) -> Self {
        let mut history = ProcessingLog::new();
        history.add_entry(
            ProcessingOp::Load {
                vendor: info.vendor,
                points: fid.len(),
            },
            &info.summary(),
        );

        let mut working_fid = fid.clone();
        if let Some(lb_hz) = config.line_broadening_hz {
            exponential_window(&mut working_fid, info.dwell_time, lb_hz);
            history.add_entry(ProcessingOp::Apodization { lb_hz }, "");
        }
        if let Some(target) = config.zero_fill_target() {
            let from = working_fid.len();
            if processing::zero_fill(&mut working_fid, target) {
                history.add_entry(ProcessingOp::ZeroFill { from, to: target }, "");
            }
        }

        let mut phase = Phase::default();
        if config.auto_phase {
            phase.ph0 = config.phase.run(&working_fid);
            history.add_entry(ProcessingOp::AutoPhase { ph0: phase.ph0 }, "");
        }

        let mut experiment = Self {
            info,
            original_fid: fid,
            working_fid,
            fid: Vec::new(),
            phase,
            spectrum: Vec::new(),
            integrals: Integrator::default(),
            search: config.phase,
            history,
        };
        experiment.regenerate();
        experiment.integrals = Integrator::new(&experiment.spectrum);
        log::info!(
            "Opened {} experiment: {} points, PH0={:.4}π",
            experiment.info.vendor,
            experiment.spectrum.len(),
            experiment.phase.ph0
        );
        experiment
    }

    /// Record the file this experiment was read from.
    pub fn with_source(mut self, source: &str) -> Self {
        self.history.set_source(source);
        self
    }

    // =====================================================================
    //  Accessors
    // =====================================================================

    pub fn info(&self) -> &SpectrumInfo {
        &self.info
    }

    pub fn spectrum(&self) -> &[f64] {
        &self.spectrum
    }

    /// Working FID with the current zero-order phase applied
    pub fn fid(&self) -> &[num_complex::Complex64] {
        &self.fid
    }

    pub fn original_fid(&self) -> &[num_complex::Complex64] {
        &self.original_fid
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn history(&self) -> &ProcessingLog {
        &self.history
    }

    pub fn integrals(&self) -> &[IntegralRecord] {
        self.integrals.records()
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrals
    }

    /// [Hz] spacing used for integration
    pub fn point_spacing(&self) -> f64 {
        if self.spectrum.is_empty() {
            0.0
        } else {
            self.info.spectral_width / self.spectrum.len() as f64
        }
    }

    pub fn axis(&self) -> Axis<'_> {
        Axis::new(&self.info, self.spectrum.len())
    }

    // =====================================================================
    //  Phase
    // =====================================================================

    /// Search the zero-order phase again from the unphased FID.
    pub fn auto_phase(&mut self) -> f64 {
        let ph0 = self.search.run(&self.working_fid);
        self.phase = Phase {
            ph0,
            ph1: 0.0,
            pivot: self.phase.pivot,
        };
        self.history.add_entry(ProcessingOp::AutoPhase { ph0 }, "");
        self.regenerate();
        ph0
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.history.add_entry(ProcessingOp::ManualPhase(phase), "");
        self.regenerate();
    }

    pub fn reset_phase(&mut self) {
        self.phase = Phase {
            pivot: self.phase.pivot,
            ..Phase::default()
        };
        self.history.add_entry(ProcessingOp::ResetPhase, "");
        self.regenerate();
    }

    // =====================================================================
    //  FID editing
    // =====================================================================

    /// Zero-fill to `target` complex points. Returns false if the FID is
    /// already at least that long.
    pub fn zero_fill_to(&mut self, target: usize) -> bool {
        let from = self.working_fid.len();
        if !processing::zero_fill(&mut self.working_fid, target) {
            return false;
        }
        self.history.add_entry(ProcessingOp::ZeroFill { from, to: target }, "");
        self.regenerate();
        true
    }

    pub fn zero_fill_to_power_of_two(&mut self) -> bool {
        let target = next_power_of_two(self.working_fid.len());
        self.zero_fill_to(target)
    }

    pub fn truncate_to(&mut self, target: usize) -> bool {
        let from = self.working_fid.len();
        if !processing::truncate(&mut self.working_fid, target) {
            return false;
        }
        self.history.add_entry(ProcessingOp::Truncate { from, to: target }, "");
        self.regenerate();
        true
    }

    /// Undo all length edits and apodization.
    pub fn restore_fid(&mut self) {
        self.working_fid = self.original_fid.clone();
        self.history.add_entry(ProcessingOp::RestoreFid, "");
        self.regenerate();
    }

    pub fn apodize_exponential(&mut self, lb_hz: f64) {
        exponential_window(&mut self.working_fid, self.info.dwell_time, lb_hz);
        self.history.add_entry(ProcessingOp::Apodization { lb_hz }, "");
        self.regenerate();
    }

    // =====================================================================
    //  Measurement
    // =====================================================================

    pub fn convert(&self, x: f64, from: Unit, to: Unit) -> Result<f64> {
        self.axis().convert(x, from, to)
    }

    pub fn integrate(&mut self, begin: f64, end: f64, unit: Unit) -> Result<IntegralRecord> {
        let (begin, end) = fraction_bounds(&self.axis(), begin, end, unit)?;
        let dx = self.point_spacing();
        let record = self.integrals.integrate(&self.spectrum, dx, begin, end)?;
        self.history.add_entry(
            ProcessingOp::Integration {
                begin,
                end,
                value: record.value,
            },
            &format!("relative {:.4}", record.relative_value),
        );
        Ok(record)
    }

    /// Remove every integral overlapping the region. Returns the count.
    pub fn remove_integrals(&mut self, begin: f64, end: f64, unit: Unit) -> Result<usize> {
        let (begin, end) = fraction_bounds(&self.axis(), begin, end, unit)?;
        let removed = self.integrals.remove(begin, end);
        if removed > 0 {
            self.history
                .add_entry(ProcessingOp::RemoveIntegrals { begin, end, removed }, "");
        }
        Ok(removed)
    }

    /// Rebuild the phased FID and spectrum from the working FID.
    fn regenerate(&mut self) {
        let mut fid = self.working_fid.clone();
        rotate_phase(&mut fid, self.phase.ph0);
        let first_order = Phase {
            ph0: 0.0,
            ..self.phase
        };
        self.spectrum = phased_spectrum(&fid, self.info.vendor, &first_order);
        self.fid = fid;

        let dx = self.point_spacing();
        self.integrals.refresh(&self.spectrum, dx);
        log::debug!("Spectrum regenerated: {} points, {}", self.spectrum.len(), self.phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::tests::proton_info;
    use crate::data::spectrum::Vendor;
    use crate::error::NmrError;
    use crate::pipeline::processing::tests::lorentzian_fid;
    use crate::pipeline::processing::SpectralTransform;

    fn experiment(config: &ProcessingConfig) -> Experiment {
        let info = proton_info();
        let fid = lorentzian_fid(info.number_of_data_points, 100.0, 60.0);
        Experiment::new(fid, info, config)
    }

    #[test]
    fn test_new_phases_and_transforms() {
        let exp = experiment(&ProcessingConfig::default());
        assert_eq!(exp.spectrum().len(), 1024);
        assert_eq!(exp.fid().len(), 1024);
        assert_eq!(exp.history().len(), 2);
        assert!(exp.phase().ph0.abs() < 0.05);
        assert_eq!(exp.integrator().threshold(), crate::measure::integration::signal_threshold(exp.spectrum()));
    }

    #[test]
    fn test_phase_is_absolute() {
        let mut exp = experiment(&ProcessingConfig::default());
        let auto = exp.phase().ph0;
        let reference = exp.spectrum().to_vec();

        exp.set_phase(Phase::zero_order(0.7));
        exp.set_phase(Phase::zero_order(0.7));
        let mut expected = exp.original_fid().to_vec();
        rotate_phase(&mut expected, 0.7);
        for (a, b) in exp.fid().iter().zip(&expected) {
            assert!((a - b).norm() < 1e-12);
        }

        let again = exp.auto_phase();
        assert!((again - auto).abs() < 1e-12);
        for (a, b) in exp.spectrum().iter().zip(&reference) {
            assert!((a - b).abs() < 1e-9);
        }

        exp.reset_phase();
        assert_eq!(exp.phase().ph0, 0.0);
        let raw = SpectralTransform::new(1024).absorption(exp.original_fid());
        assert_eq!(exp.spectrum(), raw.as_slice());
    }

    #[test]
    fn test_zero_fill_truncate_restore() {
        let mut exp = experiment(&ProcessingConfig::default());
        assert!(!exp.zero_fill_to_power_of_two());
        assert!(exp.zero_fill_to(1500));
        assert!(exp.zero_fill_to_power_of_two());
        assert_eq!(exp.spectrum().len(), 2048);
        assert!(exp.truncate_to(512));
        assert_eq!(exp.fid().len(), 512);
        exp.restore_fid();
        assert_eq!(exp.fid().len(), 1024);
        assert_eq!(exp.info().number_of_data_points, 1024);
    }

    #[test]
    fn test_configured_edits() {
        let config = ProcessingConfig {
            zero_fill: Some(2000),
            line_broadening_hz: Some(1.0),
            auto_phase: false,
            ..Default::default()
        };
        let exp = experiment(&config);
        assert_eq!(exp.fid().len(), 2000);
        assert_eq!(exp.phase(), Phase::default());
        assert!(exp.fid()[10].norm() < exp.original_fid()[10].norm());
        assert_eq!(exp.history().len(), 3);
    }

    #[test]
    fn test_bruker_spectrum_reversed() {
        let mut info = proton_info();
        info.vendor = Vendor::Bruker;
        let config = ProcessingConfig {
            auto_phase: false,
            ..Default::default()
        };
        let fid = lorentzian_fid(1024, 100.0, 60.0);
        let mut expected = SpectralTransform::new(1024).absorption(&fid);
        expected.reverse();
        let exp = Experiment::new(fid, info, &config);
        assert_eq!(exp.spectrum(), expected.as_slice());
    }

    #[test]
    fn test_integrals_follow_regeneration() {
        let mut exp = experiment(&ProcessingConfig::default());
        // peak at bin 511 - 100 = 411 of 1024
        let peak = exp.integrate(0.35, 0.45, Unit::Fraction).unwrap();
        assert_eq!(peak.relative_value, 1.0);
        assert!(peak.value > 0.0);
        let baseline = exp.integrate(0.7, 0.8, Unit::Fraction).unwrap();
        assert!(baseline.relative_value < 0.01);

        exp.apodize_exponential(5.0);
        let records = exp.integrals();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].relative_value, 1.0);
        assert_eq!(exp.integrator().anchor(), Some(records[0].value));

        assert_eq!(exp.remove_integrals(0.4, 0.5, Unit::Fraction).unwrap(), 1);
        assert_eq!(exp.integrals().len(), 1);
    }

    #[test]
    fn test_ppm_integration_and_conversion() {
        let mut exp = experiment(&ProcessingConfig::default());
        let ppm = exp.convert(0.4, Unit::Fraction, Unit::Ppm).unwrap();
        let rec = exp.integrate(ppm + 0.5, ppm - 0.5, Unit::Ppm).unwrap();
        assert!(rec.begin < rec.end);
        assert!(matches!(
            exp.integrate(1.0, 2.0, Unit::DataPoint),
            Err(NmrError::InvalidConversion(_))
        ));
        assert_eq!(exp.convert(1.0, Unit::Fraction, Unit::DataPoint).unwrap(), 1023.0);
    }
}
