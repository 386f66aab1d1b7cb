//! The ingestion-and-analytics pipeline: raw export file in, reconciled
//! relational model and derived analytics out.

pub mod classify;
pub mod ingest;
pub mod metrics;
pub mod privacy;
pub mod router;
pub mod service;
pub mod store;

pub use ingest::{IngestError, IngestReceipt, ValidationError};
pub use router::pipeline_router;
pub use service::{PipelineService, ScrubOutcome};
pub use store::{PipelineRow, SqliteStore, StoreError};
