/// Processing configuration, loadable from a JSON file

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{NmrError, Result};
use crate::pipeline::processing::PhaseSearch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub phase: PhaseSearch,
    /// Run the zero-order phase search when an experiment is opened
    pub auto_phase: bool,
    /// Zero-fill target in complex points; 0 means none
    pub zero_fill: Option<usize>,
    /// Exponential line broadening in Hz
    pub line_broadening_hz: Option<f64>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            phase: PhaseSearch::default(),
            auto_phase: true,
            zero_fill: None,
            line_broadening_hz: None,
        }
    }
}

impl ProcessingConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| NmrError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.phase.precision > 0.0) {
            return Err(NmrError::Config(format!(
                "phase.precision must be positive, got {}",
                self.phase.precision
            )));
        }
        if self.phase.first_step == 0.0 || !self.phase.first_step.is_finite() {
            return Err(NmrError::Config(format!(
                "phase.first_step must be non-zero, got {}",
                self.phase.first_step
            )));
        }
        if let Some(lb) = self.line_broadening_hz {
            if !lb.is_finite() {
                return Err(NmrError::Config(format!("line_broadening_hz is {}", lb)));
            }
        }
        Ok(())
    }

    /// Zero-fill target, with 0 treated as unset
    pub fn zero_fill_target(&self) -> Option<usize> {
        self.zero_fill.filter(|&n| n > 0)
    }
}
