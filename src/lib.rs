//! Native decoding and 1D processing of Agilent, Bruker and JEOL NMR data.
//!
//! Vendor files are decoded into a complex FID plus [`SpectrumInfo`], turned
//! into a phased absorption spectrum and measured (unit conversion,
//! anchored integrals).
//!
//! [`SpectrumInfo`]: data::spectrum::SpectrumInfo

pub mod config;
pub mod data;
pub mod error;
pub mod history;
pub mod measure;
pub mod pipeline;

pub use config::ProcessingConfig;
pub use error::{NmrError, Result};
pub use pipeline::conversion::load_experiment;
pub use pipeline::experiment::Experiment;
