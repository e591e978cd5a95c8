//! Orchestration: one-shot snapshot assembly and the refresh lifecycle.

pub mod assembler;
pub mod refresh;

pub use assembler::{Aggregator, AggregatorOptions};
pub use refresh::{RefreshController, RefreshOutcome, RefreshPhase};
