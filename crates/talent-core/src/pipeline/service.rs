//! Orchestration layer tying ingestion, privacy, persistence, and the
//! audit trail together. Handlers and the CLI both go through this type.

use crate::pipeline::ingest::{self, IngestError, IngestReceipt};
use crate::pipeline::privacy::{self, ScrubReport};
use crate::pipeline::store::{
    AuditEntry, BatchRecord, DataHealth, NewBatch, PipelineRow, RevertReceipt, SqliteStore,
    StoreError,
};
use chrono::NaiveDateTime;
use uuid::Uuid;

const AUDIT_ACTOR: &str = "system";

/// Result of a scrub request: either the kill switch blocked it, or the
/// text came back redacted.
#[derive(Debug)]
pub enum ScrubOutcome {
    Disabled,
    Scrubbed(ScrubReport),
}

pub struct PipelineService {
    store: SqliteStore,
    scrubber_default: bool,
}

impl PipelineService {
    pub fn new(store: SqliteStore, scrubber_default: bool) -> Self {
        Self {
            store,
            scrubber_default,
        }
    }

    /// Run a CSV export through the full pipeline: parse, mask sensitive
    /// columns, normalize, resolve identities, and commit as one batch.
    pub fn ingest_csv(
        &self,
        filename: &str,
        csv_text: &str,
        now: NaiveDateTime,
    ) -> Result<IngestReceipt, IngestError> {
        let mut table = ingest::parser::parse_table(csv_text.as_bytes())?;

        let masked = privacy::mask_sensitive_columns(&mut table);
        if !masked.is_empty() {
            self.store.append_audit(
                now,
                "column_mask",
                "success",
                &format!("masked columns during ingestion: {}", masked.join(", ")),
                AUDIT_ACTOR,
            )?;
            tracing::info!(file = filename, columns = ?masked, "masked sensitive columns");
        }

        let normalized = ingest::columns::normalize_table(&table, now)?;
        let resolved = ingest::resolve_rows(normalized, now.date());

        let batch_id = short_batch_id();
        let rows_processed = self.store.apply_batch(&NewBatch {
            batch_id: &batch_id,
            filename,
            uploaded_at: now,
            rows: &resolved,
        })?;

        tracing::info!(file = filename, batch = %batch_id, rows = rows_processed, "batch committed");
        Ok(IngestReceipt {
            batch_id,
            rows_processed,
        })
    }

    /// Remove every application a batch introduced or last touched.
    pub fn revert_batch(
        &self,
        batch_id: &str,
        now: NaiveDateTime,
    ) -> Result<RevertReceipt, StoreError> {
        let receipt = self.store.revert_batch(batch_id)?;
        self.store.append_audit(
            now,
            "batch_revert",
            "success",
            &format!(
                "batch {} reverted, {} applications removed",
                receipt.batch_id, receipt.applications_removed
            ),
            AUDIT_ACTOR,
        )?;
        tracing::info!(batch = batch_id, removed = receipt.applications_removed, "batch reverted");
        Ok(receipt)
    }

    pub fn rows(&self) -> Result<Vec<PipelineRow>, StoreError> {
        self.store.pipeline_rows()
    }

    /// Redact PII from free text, unless the kill switch is off. Every
    /// scrub that actually removed something is audited with counts only,
    /// never the text itself.
    pub fn scrub(&self, text: &str, now: NaiveDateTime) -> Result<ScrubOutcome, StoreError> {
        if !self.scrubber_status()? {
            self.store.append_audit(
                now,
                "text_scrub",
                "blocked",
                "scrub request refused while scrubber is disabled",
                AUDIT_ACTOR,
            )?;
            return Ok(ScrubOutcome::Disabled);
        }

        let report = privacy::scrub_text(text);
        if report.counts.total() > 0 {
            self.store.append_audit(
                now,
                "text_scrub",
                "success",
                &format!(
                    "redacted {} emails, {} phones, {} id numbers",
                    report.counts.emails, report.counts.phones, report.counts.id_numbers
                ),
                AUDIT_ACTOR,
            )?;
        }
        Ok(ScrubOutcome::Scrubbed(report))
    }

    /// Effective kill-switch value: the persisted setting when present,
    /// the configured default otherwise.
    pub fn scrubber_status(&self) -> Result<bool, StoreError> {
        Ok(self
            .store
            .scrubber_enabled()?
            .unwrap_or(self.scrubber_default))
    }

    pub fn set_scrubber(&self, enable: bool, now: NaiveDateTime) -> Result<bool, StoreError> {
        self.store.set_scrubber_enabled(enable)?;
        self.store.append_audit(
            now,
            "scrubber_toggle",
            "success",
            if enable {
                "scrubber enabled"
            } else {
                "scrubber disabled"
            },
            AUDIT_ACTOR,
        )?;
        tracing::info!(enabled = enable, "scrubber toggled");
        Ok(enable)
    }

    pub fn audit_trail(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        self.store.recent_audit(limit)
    }

    pub fn data_health(&self) -> Result<DataHealth, StoreError> {
        self.store.data_health()
    }

    pub fn batch_history(&self, limit: usize) -> Result<Vec<BatchRecord>, StoreError> {
        self.store.batch_history(limit)
    }
}

/// Short random batch stamp, unique enough for a weekly upload log and
/// easy to read back over the phone.
fn short_batch_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_ids_are_short_and_distinct() {
        let a = short_batch_id();
        let b = short_batch_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }
}
