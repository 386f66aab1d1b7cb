//! Core engine for the talent pipeline service: ingestion of weekly ATS
//! exports, identity reconciliation, status classification, derived
//! analytics, and the PII masking layer.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;
