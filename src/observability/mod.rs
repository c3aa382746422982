//! Observability module
//!
//! Logging and metrics for the fight and presence subsystems.

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
