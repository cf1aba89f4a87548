//! feedcheck Analyzer
//!
//! The single entry point for feedback analysis.
//!
//! [`Analyzer::analyze`] validates input, then serves the result from the
//! [`ResultCache`] or joins an identical in-flight computation. Only a fresh
//! computation passes the [`RateGate`] and runs the model chain, so every
//! admitted request ends in a result and the only errors a caller sees are
//! input rejections and rate-limit rejections.

pub mod analyzer;
pub mod cache;
pub mod rate_gate;

pub use analyzer::Analyzer;
pub use cache::{Lookup, ResultCache};
pub use rate_gate::{Permit, RateGate};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::analyzer::Analyzer;
    pub use crate::cache::ResultCache;
    pub use crate::rate_gate::RateGate;
}
