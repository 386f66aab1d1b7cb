//! Analytics over the reconciled pipeline: dashboard stats, per-job
//! rollups, the executive brief, the intelligence report, and drilldowns.

pub mod engine;
pub mod views;

pub use engine::{CandidateQuery, QueryFilters, Timeframe};
