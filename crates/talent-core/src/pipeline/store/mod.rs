//! SQLite persistence for the reconciled relational model.
//!
//! Connections are request-scoped: every operation opens its own connection
//! and releases it on return, error paths included. Ingestion and revert
//! each run inside a single transaction so a batch is committed whole or
//! not at all.

use crate::pipeline::ingest::ResolvedRow;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::PathBuf;

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("upload batch '{0}' not found")]
    BatchNotFound(String),
}

/// One row of the unified candidate+job+application join the metrics
/// engine consumes. Days-in-process is recomputed per query from the
/// start date, so it is not carried here.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRow {
    pub candidate_name: String,
    pub email: String,
    pub source: String,
    pub job_title: String,
    pub department: String,
    pub status: String,
    pub recruiter: String,
    pub start_date: NaiveDate,
    pub batch_id: String,
}

/// Audit record for an upload batch; doubles as the changeset marker for
/// batch-scoped rollback.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRecord {
    pub batch_id: String,
    pub filename: String,
    pub uploaded_at: String,
    pub rows_processed: u64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub logged_at: String,
    pub action: String,
    pub status: String,
    pub details: String,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingField {
    pub field: String,
    pub count: u64,
}

/// Weighted data-health snapshot for the admin screen.
#[derive(Debug, Clone, Serialize)]
pub struct DataHealth {
    pub health_score: u8,
    pub total_records: u64,
    pub missing_data: Vec<MissingField>,
    pub logs: Vec<BatchRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevertReceipt {
    pub batch_id: String,
    pub applications_removed: u64,
}

/// A fully resolved batch ready to be committed.
#[derive(Debug)]
pub struct NewBatch<'a> {
    pub batch_id: &'a str,
    pub filename: &'a str,
    pub uploaded_at: NaiveDateTime,
    pub rows: &'a [ResolvedRow],
}

pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let conn = store.connect()?;
        init_schema(&conn)?;
        Ok(store)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Commit a whole batch: candidate/job upserts, application
    /// reconciliation, and the batch log row, in one transaction.
    pub fn apply_batch(&self, batch: &NewBatch<'_>) -> Result<u64, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let mut rows_processed: u64 = 0;
        for resolved in batch.rows {
            let row = &resolved.row;
            tx.execute(
                "INSERT INTO candidates (id, name, email, source) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, source = excluded.source",
                params![resolved.candidate_id, row.name, row.email, row.source],
            )?;

            tx.execute(
                "INSERT INTO jobs (id, job_title, department) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET department = excluded.department",
                params![resolved.job_id, row.job_title, row.department],
            )?;

            let app_id = format!("{}_{}", resolved.candidate_id, resolved.job_id);
            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM applications WHERE app_id = ?1",
                    [&app_id],
                    |_| Ok(true),
                )
                .map(|_| true)
                .or_else(|err| match err {
                    rusqlite::Error::QueryReturnedNoRows => Ok(false),
                    other => Err(other),
                })?;

            if exists {
                // Status, recruiter, elapsed time and batch stamp follow the
                // latest upload; start date stays as first observed.
                tx.execute(
                    "UPDATE applications
                     SET status = ?1, recruiter = ?2, days_in_process = ?3, batch_id = ?4
                     WHERE app_id = ?5",
                    params![
                        row.status,
                        row.recruiter,
                        resolved.days_in_process,
                        batch.batch_id,
                        app_id
                    ],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO applications
                     (app_id, candidate_id, job_id, status, recruiter, start_date, days_in_process, batch_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        app_id,
                        resolved.candidate_id,
                        resolved.job_id,
                        row.status,
                        row.recruiter,
                        row.start_date.format(DATE_FMT).to_string(),
                        resolved.days_in_process,
                        batch.batch_id
                    ],
                )?;
            }

            rows_processed += 1;
        }

        tx.execute(
            "INSERT INTO upload_batches (batch_id, filename, uploaded_at, rows_processed, status)
             VALUES (?1, ?2, ?3, ?4, 'Success')",
            params![
                batch.batch_id,
                batch.filename,
                batch.uploaded_at.format(DATETIME_FMT).to_string(),
                rows_processed
            ],
        )?;

        tx.commit()?;
        Ok(rows_processed)
    }

    /// Delete every application row stamped with the batch and mark the
    /// batch reverted. Safe to call twice; the second call removes nothing.
    pub fn revert_batch(&self, batch_id: &str) -> Result<RevertReceipt, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let known: u64 = tx.query_row(
            "SELECT COUNT(*) FROM upload_batches WHERE batch_id = ?1",
            [batch_id],
            |row| row.get(0),
        )?;
        if known == 0 {
            return Err(StoreError::BatchNotFound(batch_id.to_string()));
        }

        let removed = tx.execute(
            "DELETE FROM applications WHERE batch_id = ?1",
            [batch_id],
        )? as u64;
        tx.execute(
            "UPDATE upload_batches SET status = 'Reverted' WHERE batch_id = ?1",
            [batch_id],
        )?;

        tx.commit()?;
        Ok(RevertReceipt {
            batch_id: batch_id.to_string(),
            applications_removed: removed,
        })
    }

    /// The unified flattened join the dashboard and analytics read from.
    pub fn pipeline_rows(&self) -> Result<Vec<PipelineRow>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT c.name, c.email, c.source, j.job_title, j.department,
                    a.status, a.recruiter, a.start_date, a.batch_id
             FROM applications a
             JOIN candidates c ON a.candidate_id = c.id
             JOIN jobs j ON a.job_id = j.id",
        )?;

        let rows = stmt.query_map([], |row| {
            let raw_date: String = row.get(7)?;
            let start_date = NaiveDate::parse_from_str(&raw_date, DATE_FMT).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    Box::new(err),
                )
            })?;
            Ok(PipelineRow {
                candidate_name: row.get(0)?,
                email: row.get(1)?,
                source: row.get(2)?,
                job_title: row.get(3)?,
                department: row.get(4)?,
                status: row.get(5)?,
                recruiter: row.get(6)?,
                start_date,
                batch_id: row.get(8)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn batch_history(&self, limit: usize) -> Result<Vec<BatchRecord>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT batch_id, filename, uploaded_at, rows_processed, status
             FROM upload_batches ORDER BY uploaded_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], row_to_batch)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn batch_status(&self, batch_id: &str) -> Result<Option<String>, StoreError> {
        let conn = self.connect()?;
        let result = conn.query_row(
            "SELECT status FROM upload_batches WHERE batch_id = ?1",
            [batch_id],
            |row| row.get(0),
        );
        match result {
            Ok(status) => Ok(Some(status)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Weighted completeness score over the reconciled store, with the ten
    /// most recent batch log rows for context.
    pub fn data_health(&self) -> Result<DataHealth, StoreError> {
        let conn = self.connect()?;

        let total_candidates: u64 =
            conn.query_row("SELECT COUNT(*) FROM candidates", [], |row| row.get(0))?;
        let total_apps: u64 =
            conn.query_row("SELECT COUNT(*) FROM applications", [], |row| row.get(0))?;
        let missing_recruiter: u64 = conn.query_row(
            "SELECT COUNT(*) FROM applications WHERE recruiter = 'לא שויך' OR recruiter IS NULL",
            [],
            |row| row.get(0),
        )?;
        let missing_department: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE department = 'General' OR department IS NULL",
            [],
            |row| row.get(0),
        )?;
        drop(conn);

        let health_score = if total_apps > 0 {
            let penalty = ((missing_recruiter + missing_department) * 100)
                / (total_apps + total_candidates);
            100_u64.saturating_sub(penalty).min(100) as u8
        } else {
            100
        };

        let mut missing_data = Vec::new();
        if missing_recruiter > 0 {
            missing_data.push(MissingField {
                field: "תהליכים ללא מגייס".to_string(),
                count: missing_recruiter,
            });
        }
        if missing_department > 0 {
            missing_data.push(MissingField {
                field: "משרות ללא שיוך מחלקתי".to_string(),
                count: missing_department,
            });
        }

        Ok(DataHealth {
            health_score,
            total_records: total_apps,
            missing_data,
            logs: self.batch_history(10)?,
        })
    }

    pub fn append_audit(
        &self,
        now: NaiveDateTime,
        action: &str,
        status: &str,
        details: &str,
        actor: &str,
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO audit_log (logged_at, action, status, details, actor)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![now.format(DATETIME_FMT).to_string(), action, status, details, actor],
        )?;
        Ok(())
    }

    pub fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, logged_at, action, status, details, actor
             FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                logged_at: row.get(1)?,
                action: row.get(2)?,
                status: row.get(3)?,
                details: row.get(4)?,
                actor: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Current kill-switch value, if anyone has ever set it.
    pub fn scrubber_enabled(&self) -> Result<Option<bool>, StoreError> {
        let conn = self.connect()?;
        let result = conn.query_row(
            "SELECT value FROM settings WHERE key = 'ai_enabled'",
            [],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value == "true")),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn set_scrubber_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES ('ai_enabled', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [if enabled { "true" } else { "false" }],
        )?;
        Ok(())
    }
}

fn row_to_batch(row: &rusqlite::Row) -> rusqlite::Result<BatchRecord> {
    Ok(BatchRecord {
        batch_id: row.get(0)?,
        filename: row.get(1)?,
        uploaded_at: row.get(2)?,
        rows_processed: row.get(3)?,
        status: row.get(4)?,
    })
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            source TEXT
        );

        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            job_title TEXT NOT NULL,
            department TEXT
        );

        CREATE TABLE IF NOT EXISTS applications (
            app_id TEXT PRIMARY KEY,
            candidate_id TEXT NOT NULL REFERENCES candidates(id),
            job_id TEXT NOT NULL REFERENCES jobs(id),
            status TEXT NOT NULL,
            recruiter TEXT,
            start_date TEXT NOT NULL,
            days_in_process INTEGER NOT NULL DEFAULT 0,
            batch_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS upload_batches (
            batch_id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            uploaded_at TEXT NOT NULL,
            rows_processed INTEGER NOT NULL,
            status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            logged_at TEXT NOT NULL,
            action TEXT NOT NULL,
            status TEXT NOT NULL,
            details TEXT,
            actor TEXT
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_applications_batch ON applications(batch_id);
        CREATE INDEX IF NOT EXISTS idx_applications_candidate ON applications(candidate_id);
        CREATE INDEX IF NOT EXISTS idx_applications_job ON applications(job_id);
        "#,
    )?;
    Ok(())
}
