pub mod integration;
pub mod units;
