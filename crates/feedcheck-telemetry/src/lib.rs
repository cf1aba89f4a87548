//! feedcheck Telemetry
//!
//! Counters for the analysis pipeline.
//!
//! Provides:
//! - In-process atomic counters with point-in-time snapshots
//! - Mirroring of every counter to the `metrics` facade for exporters

pub mod metrics;

pub use crate::metrics::{MetricsCollector, MetricsSnapshot};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metrics::{MetricsCollector, MetricsSnapshot};
}
