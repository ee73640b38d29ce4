//! Telemetry module: per-probe results and connection reuse accounting.

mod aggregator;
mod models;

pub use aggregator::*;
pub use models::*;
