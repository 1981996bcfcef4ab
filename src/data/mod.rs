pub mod agilent;
pub mod binary;
pub mod bruker;
pub mod jdf;
pub mod params;
pub mod spectrum;
pub mod vendor;
