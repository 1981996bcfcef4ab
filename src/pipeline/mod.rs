pub mod conversion;
pub mod experiment;
pub mod processing;
